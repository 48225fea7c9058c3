//! Streamer configuration and size units.

use crate::error::{StreamError, StreamResult};

/// One byte.
pub const B: usize = 1;
/// One kibibyte.
pub const KB: usize = 1024 * B;
/// One mebibyte.
pub const MB: usize = 1024 * KB;
/// One gibibyte.
pub const GB: usize = 1024 * MB;

/// Configuration for a [`Streamer`](crate::Streamer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamerConfig {
    /// Chunk size in bytes; every range request asks for at most this much (default: 8 MB).
    pub buffer_size: usize,
    /// Number of concurrent range requests, one worker thread each (default: 8).
    pub parallelism: usize,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            buffer_size: 8 * MB,
            parallelism: 8,
        }
    }
}

impl StreamerConfig {
    /// Creates a configuration with the given chunk size and worker count.
    #[must_use]
    pub fn new(buffer_size: usize, parallelism: usize) -> Self {
        Self {
            buffer_size,
            parallelism,
        }
    }

    /// Sets the chunk size in bytes.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Sets the number of workers.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Checks that the configuration can drive a streamer.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] if the buffer size is zero or
    /// there are no workers.
    pub fn validate(&self) -> StreamResult<()> {
        if self.buffer_size == 0 {
            return Err(StreamError::InvalidConfig {
                reason: "buffer_size must be > 0".into(),
            });
        }
        if self.parallelism == 0 {
            return Err(StreamError::InvalidConfig {
                reason: "parallelism must be >= 1".into(),
            });
        }
        Ok(())
    }
}
