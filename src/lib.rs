//! Parallel range-request streaming for remote objects.
//!
//! `rangestream` reads a remote, range-addressable resource (for example an S3
//! presigned URL) as an ordinary sequential [`std::io::Read`], while fetching
//! several byte ranges of it concurrently under the hood.
//!
//! # How it works
//!
//! - The resource size is discovered with a single plain `GET`.
//! - The resource is cut into `buffer_size` chunks. Worker `i` of `P` fetches
//!   chunks `i, i + P, i + 2P, ...` with `Range` requests.
//! - Every worker hands its chunks over a dedicated rendezvous slot. The
//!   consumer drains slots round-robin, which yields chunks in file order
//!   without sequence numbers.
//! - Chunk buffers come from a [`BufferPool`] and are returned after the bytes
//!   are copied out, so memory stays bounded near `parallelism + 1` buffers.
//!
//! # Example
//!
//! ```ignore
//! use std::io::Read;
//! use rangestream::{Reader, StreamerConfig, MB};
//!
//! let config = StreamerConfig::default()
//!     .with_buffer_size(8 * MB)
//!     .with_parallelism(16);
//! let mut reader = Reader::open("https://bucket.s3.amazonaws.com/big.bin?X-Amz-...", config)?;
//!
//! let mut contents = Vec::new();
//! reader.read_to_end(&mut contents)?;
//! ```

mod config;
mod decompress;
mod error;
#[cfg(feature = "http-client")]
mod http_client;
mod local;
mod memory;
mod pool;
mod reader;
mod streamer;
mod transport;

pub use config::{B, GB, KB, MB, StreamerConfig};
pub use decompress::{Compression, decompress};
#[cfg(feature = "http-client")]
pub use decompress::open_reader;
pub use error::{StreamError, StreamResult};
#[cfg(feature = "http-client")]
pub use http_client::{HttpConfig, HttpTransport};
pub use local::LocalTransport;
pub use memory::MemoryTransport;
pub use pool::{Buffer, BufferPool};
pub use reader::Reader;
pub use streamer::{Chunk, ChunkStream, Streamer, worker_ranges};
pub use transport::{RangeTransport, TransportResponse, range_header};
