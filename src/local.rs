//! Local file transport for testing without network.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use http::HeaderMap;
use http::header::RANGE;

use crate::error::StreamResult;
use crate::transport::{RangeTransport, TransportResponse, parse_range};

/// Local file transport that answers `GET`s the way a range-capable server would.
///
/// Every request ignores the URL and serves the file given to
/// [`LocalTransport::open`]: `200` with the whole file when no `Range` header
/// is present, `206` with the requested slice otherwise, `416` for a range
/// that cannot be satisfied. The file is reopened per request, so concurrent
/// requests do not share a cursor.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    path: PathBuf,
}

impl LocalTransport {
    /// Opens a local file as a transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> StreamResult<Self> {
        let path = path.as_ref().to_path_buf();
        File::open(&path)?;
        Ok(Self { path })
    }

    /// Returns the path to the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RangeTransport for LocalTransport {
    fn get(&self, _url: &str, headers: &HeaderMap) -> StreamResult<TransportResponse> {
        let mut file = File::open(&self.path)?;
        let size = file.metadata()?.len();

        let Some(value) = headers.get(RANGE) else {
            return Ok(TransportResponse {
                status: 200,
                content_length: Some(size),
                body: Box::new(file),
            });
        };

        let range = value.to_str().ok().and_then(|v| parse_range(v, size));
        let Some(range) = range else {
            return Ok(TransportResponse {
                status: 416,
                content_length: Some(0),
                body: Box::new(io::empty()),
            });
        };

        file.seek(SeekFrom::Start(range.start))?;
        let len = range.end - range.start;
        Ok(TransportResponse {
            status: 206,
            content_length: Some(len),
            body: Box::new(file.take(len)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::range_header;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn read_all(response: TransportResponse) -> Vec<u8> {
        let mut out = Vec::new();
        let mut body = response.body;
        body.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_local_transport_full_get() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"Hello, World!").unwrap();
        temp.flush().unwrap();

        let transport = LocalTransport::open(temp.path()).unwrap();
        let response = transport.get("ignored", &HeaderMap::new()).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_length, Some(13));
        assert_eq!(read_all(response), b"Hello, World!");
    }

    #[test]
    fn test_local_transport_range_get() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"Hello, World!").unwrap();
        temp.flush().unwrap();

        let transport = LocalTransport::open(temp.path()).unwrap();
        let response = transport.get("ignored", &range_header(7..12)).unwrap();
        assert_eq!(response.status, 206);
        assert_eq!(read_all(response), b"World");
    }

    #[test]
    fn test_local_transport_unsatisfiable_range() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"short").unwrap();
        temp.flush().unwrap();

        let transport = LocalTransport::open(temp.path()).unwrap();
        let response = transport.get("ignored", &range_header(10..20)).unwrap();
        assert_eq!(response.status, 416);
        assert!(read_all(response).is_empty());
    }

    #[test]
    fn test_local_transport_missing_file() {
        assert!(LocalTransport::open("/definitely/not/here.bin").is_err());
    }
}
