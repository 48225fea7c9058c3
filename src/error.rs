//! Error types for range streaming.

use std::borrow::Cow;
use std::io;

use thiserror::Error;

/// Result type for streaming operations.
pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// Errors that can occur while streaming a remote resource.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The initial size-discovery request failed.
    #[error("Failed to discover size of {url}: {source}")]
    SizeDiscovery {
        /// URL of the resource
        url: String,
        /// Underlying failure
        #[source]
        source: Box<StreamError>,
    },

    /// A ranged GET failed or was not answered with 206 Partial Content.
    #[error("Range request for bytes {start}-{end} failed: {source}")]
    RangeFetch {
        /// First byte of the chunk
        start: u64,
        /// One past the last byte of the chunk
        end: u64,
        /// Underlying failure
        #[source]
        source: Box<StreamError>,
    },

    /// The body of a ranged response could not be read in full.
    #[error("Failed to read chunk at offset {start}: expected {expected} bytes, got {actual}")]
    ReadBody {
        /// First byte of the chunk
        start: u64,
        /// Number of bytes the chunk should contain
        expected: u64,
        /// Number of bytes read before the failure
        actual: u64,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// HTTP response with an unexpected status code.
    #[error("HTTP error: status {status}, expected {expected}")]
    Http {
        /// Status code received
        status: u16,
        /// Status code required by the protocol
        expected: u16,
    },

    /// The size-discovery response carried no content length.
    #[error("Missing Content-Length in response")]
    MissingContentLength,

    /// A chunk fetch observed cancellation while reading its body.
    #[error("Chunk fetch cancelled")]
    Cancelled,

    /// The stream was closed by its consumer.
    #[error("Stream is closed")]
    Closed,

    /// An earlier chunk failed; the stream cannot continue.
    #[error("Stream terminated by an earlier error")]
    Terminated,

    /// A worker thread exited without delivering its next chunk.
    #[error("Worker for slot {slot} exited unexpectedly")]
    WorkerLost {
        /// Slot index of the lost worker
        slot: usize,
    },

    /// Invalid streamer or transport configuration.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration
        reason: Cow<'static, str>,
    },

    /// Feature not enabled at compile time.
    #[error("Feature '{feature}' is not enabled")]
    FeatureNotEnabled {
        /// Name of the disabled feature
        feature: &'static str,
    },

    /// Network error during an HTTP request.
    #[error("Network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StreamError {
    /// Returns `true` if this error only reports cooperative cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled | Self::Closed => true,
            Self::RangeFetch { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

#[cfg(feature = "http-client")]
impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(Box::new(err))
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Io(inner) => inner,
            other => io::Error::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_fetch_display_names_range() {
        let err = StreamError::RangeFetch {
            start: 4,
            end: 8,
            source: Box::new(StreamError::Http {
                status: 200,
                expected: 206,
            }),
        };
        let message = err.to_string();
        assert!(message.contains("bytes 4-8"));
        assert!(message.contains("status 200"));
    }

    #[test]
    fn test_cancellation_detection() {
        assert!(StreamError::Cancelled.is_cancelled());
        assert!(
            StreamError::RangeFetch {
                start: 0,
                end: 1,
                source: Box::new(StreamError::Cancelled),
            }
            .is_cancelled()
        );
        assert!(!StreamError::Terminated.is_cancelled());
    }

    #[test]
    fn test_into_io_error_keeps_io_kind() {
        let err: io::Error = StreamError::Io(io::Error::from(io::ErrorKind::BrokenPipe)).into();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        let err: io::Error = StreamError::Terminated.into();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert!(err.get_ref().is_some());
    }
}
