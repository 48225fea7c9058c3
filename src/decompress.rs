//! Optional inflating layer over the assembled byte stream.

use std::fmt;
use std::io::Read;
use std::str::FromStr;

use crate::error::{StreamError, StreamResult};

/// Compression applied to the remote resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Bytes are passed through unchanged.
    #[default]
    None,
    /// gzip framing, possibly several concatenated members.
    Gzip,
    /// zstd framing.
    Zstd,
}

impl Compression {
    /// Lower-case name of the compression kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compression {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "identity" => Ok(Self::None),
            "gzip" | "gz" => Ok(Self::Gzip),
            "zstd" | "zst" => Ok(Self::Zstd),
            other => Err(StreamError::InvalidConfig {
                reason: format!("unknown compression '{other}'").into(),
            }),
        }
    }
}

/// Wraps `reader` in a decoder for `compression`.
///
/// The decoder only sees a sequential byte stream; chunk boundaries of the
/// underlying [`Reader`](crate::Reader) are invisible to it.
///
/// # Errors
///
/// Returns [`StreamError::FeatureNotEnabled`] if the decoder was compiled out,
/// or an I/O error if the decoder cannot be initialized.
pub fn decompress<R>(reader: R, compression: Compression) -> StreamResult<Box<dyn Read + Send>>
where
    R: Read + Send + 'static,
{
    match compression {
        Compression::None => Ok(Box::new(reader)),
        Compression::Gzip => gzip_decoder(reader),
        Compression::Zstd => zstd_decoder(reader),
    }
}

/// Opens `url` over HTTP and wraps it in a decoder for `compression`.
///
/// # Errors
///
/// Returns an error if the streamer cannot be created or the decoder is
/// unavailable.
#[cfg(feature = "http-client")]
pub fn open_reader(
    url: impl Into<String>,
    config: crate::config::StreamerConfig,
    compression: Compression,
) -> StreamResult<Box<dyn Read + Send>> {
    decompress(crate::reader::Reader::open(url, config)?, compression)
}

#[cfg(feature = "gzip")]
fn gzip_decoder<R: Read + Send + 'static>(reader: R) -> StreamResult<Box<dyn Read + Send>> {
    Ok(Box::new(flate2::read::MultiGzDecoder::new(reader)))
}

#[cfg(not(feature = "gzip"))]
fn gzip_decoder<R: Read + Send + 'static>(_reader: R) -> StreamResult<Box<dyn Read + Send>> {
    Err(StreamError::FeatureNotEnabled { feature: "gzip" })
}

#[cfg(feature = "zstd")]
fn zstd_decoder<R: Read + Send + 'static>(reader: R) -> StreamResult<Box<dyn Read + Send>> {
    Ok(Box::new(zstd::stream::read::Decoder::new(reader)?))
}

#[cfg(not(feature = "zstd"))]
fn zstd_decoder<R: Read + Send + 'static>(_reader: R) -> StreamResult<Box<dyn Read + Send>> {
    Err(StreamError::FeatureNotEnabled { feature: "zstd" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_compression() {
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert_eq!("GZ".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!(" zstd ".parse::<Compression>().unwrap(), Compression::Zstd);
        assert!("brotli".parse::<Compression>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for kind in [Compression::None, Compression::Gzip, Compression::Zstd] {
            assert_eq!(kind.to_string().parse::<Compression>().unwrap(), kind);
        }
    }

    #[test]
    fn test_none_passes_through() {
        let mut reader = decompress(Cursor::new(b"plain".to_vec()), Compression::None).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "plain");
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn test_gzip_multi_member() {
        use flate2::write::GzEncoder;
        use std::io::Write;

        let mut compressed = Vec::new();
        for part in [&b"hello, "[..], &b"world"[..]] {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(part).unwrap();
            compressed.extend(encoder.finish().unwrap());
        }

        let mut reader = decompress(Cursor::new(compressed), Compression::Gzip).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello, world");
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn test_zstd() {
        let compressed = zstd::encode_all(&b"zstd payload"[..], 3).unwrap();
        let mut reader = decompress(Cursor::new(compressed), Compression::Zstd).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"zstd payload");
    }
}
