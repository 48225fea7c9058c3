//! Sequential `Read` adapter over a chunk stream.

use std::fmt;
use std::io::{self, BufRead, Read};

use crate::streamer::ChunkStream;

/// Exposes a [`ChunkStream`] as an ordinary [`Read`] + [`BufRead`].
///
/// Each chunk is copied once into an internal tail buffer and its pooled
/// buffer is handed back immediately. Reads are then served from the tail
/// until it runs dry.
pub struct Reader<S: ChunkStream> {
    stream: S,
    tail: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<S: ChunkStream> Reader<S> {
    /// Wraps a chunk stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            tail: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Gets a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Unwraps the reader, discarding any buffered bytes.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Stops the underlying stream. Further reads fail.
    pub fn close(&mut self) {
        self.stream.close();
    }

    /// Returns `true` once the final chunk has been pulled.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    fn remaining(&self) -> &[u8] {
        &self.tail[self.pos..]
    }

    /// Pulls the next chunk into the tail buffer.
    fn fill(&mut self) -> io::Result<()> {
        match self.stream.next_chunk()? {
            Some(chunk) => {
                self.tail.clear();
                self.tail.extend_from_slice(chunk.bytes());
                self.pos = 0;
                if chunk.is_last() {
                    self.eof = true;
                }
                self.stream.return_buffer(chunk.into_buffer());
            }
            None => self.eof = true,
        }
        Ok(())
    }
}

impl<S: ChunkStream + fmt::Debug> fmt::Debug for Reader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("stream", &self.stream)
            .field("buffered", &(self.tail.len() - self.pos))
            .field("eof", &self.eof)
            .finish()
    }
}

#[cfg(feature = "http-client")]
impl Reader<crate::streamer::Streamer<crate::http_client::HttpTransport>> {
    /// Opens `url` for sequential reading over a default HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the streamer cannot be created.
    pub fn open(
        url: impl Into<String>,
        config: crate::config::StreamerConfig,
    ) -> crate::error::StreamResult<Self> {
        Ok(Self::new(crate::streamer::Streamer::from_url(url, config)?))
    }
}

impl<S: ChunkStream> Read for Reader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let available = self.fill_buf()?;
        let n = buf.len().min(available.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<S: ChunkStream> BufRead for Reader<S> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while self.pos == self.tail.len() && !self.eof {
            self.fill()?;
        }
        Ok(self.remaining())
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.tail.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StreamError, StreamResult};
    use crate::pool::{Buffer, BufferPool};
    use crate::streamer::Chunk;
    use std::collections::VecDeque;

    /// Chunk stream replaying a fixed script.
    struct Scripted {
        pool: BufferPool,
        script: VecDeque<StreamResult<Option<Chunk>>>,
        pulls: usize,
        closed: bool,
    }

    impl Scripted {
        fn new(script: Vec<StreamResult<Option<Chunk>>>) -> Self {
            Self {
                pool: BufferPool::new(8),
                script: script.into(),
                pulls: 0,
                closed: false,
            }
        }
    }

    impl ChunkStream for Scripted {
        fn next_chunk(&mut self) -> StreamResult<Option<Chunk>> {
            self.pulls += 1;
            self.script.pop_front().unwrap_or(Ok(None))
        }

        fn return_buffer(&self, buffer: Buffer) {
            self.pool.release(buffer);
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn chunks(data: &[u8], size: usize) -> Vec<StreamResult<Option<Chunk>>> {
        let transport = crate::memory::MemoryTransport::new(data.to_vec());
        let mut streamer = crate::streamer::Streamer::new(
            "mem://script",
            crate::config::StreamerConfig::new(size, 2),
            transport,
        )
        .unwrap();
        let mut out = Vec::new();
        while let Some(chunk) = streamer.next_chunk().unwrap() {
            out.push(Ok(Some(chunk)));
        }
        out
    }

    #[test]
    fn test_reads_across_chunk_boundaries() {
        let data: Vec<u8> = (0..20).collect();
        let mut reader = Reader::new(Scripted::new(chunks(&data, 8)));

        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, data);
        assert!(reader.is_eof());
    }

    #[test]
    fn test_final_bytes_not_dropped() {
        let data = b"abcdefghij".to_vec();
        let mut reader = Reader::new(Scripted::new(chunks(&data, 4)));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);

        // The last chunk carried EOF, so no extra pull happened.
        assert_eq!(reader.get_ref().pulls, 3);
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
        assert_eq!(reader.get_ref().pulls, 3);
    }

    #[test]
    fn test_buffers_returned_after_copy() {
        let data: Vec<u8> = (0..32).collect();
        let mut reader = Reader::new(Scripted::new(chunks(&data, 8)));
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(reader.get_ref().pool.available(), 1);
    }

    #[test]
    fn test_error_propagates() {
        let mut script = chunks(b"abcd", 4);
        script.insert(0, Err(StreamError::Terminated));
        let mut reader = Reader::new(Scripted::new(script));

        let err = reader.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert!(!reader.is_eof());
    }

    #[test]
    fn test_empty_stream_reads_zero() {
        let mut reader = Reader::new(Scripted::new(Vec::new()));
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
        assert!(reader.is_eof());
    }

    #[test]
    fn test_zero_length_read_does_not_pull() {
        let mut reader = Reader::new(Scripted::new(chunks(b"abcd", 4)));
        assert_eq!(reader.read(&mut []).unwrap(), 0);
        assert_eq!(reader.get_ref().pulls, 0);
    }

    #[test]
    fn test_close_delegates() {
        let mut reader = Reader::new(Scripted::new(Vec::new()));
        reader.close();
        assert!(reader.into_inner().closed);
    }

    #[test]
    fn test_buf_read_lines() {
        let data = b"first line\nsecond line\nthird".to_vec();
        let reader = Reader::new(Scripted::new(chunks(&data, 5)));
        let lines: Vec<String> = reader.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["first line", "second line", "third"]);
    }
}
