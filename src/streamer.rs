//! Parallel range fetching with in-order delivery.
//!
//! A [`Streamer`] splits a remote resource into `buffer_size` chunks and
//! assigns them round-robin to `parallelism` worker threads: worker `i`
//! fetches chunks `i, i + P, i + 2P, ...`. Each worker owns one rendezvous
//! slot. The consumer reads slots in the order `0, 1, ..., P - 1, 0, ...`,
//! which is exactly file order, so no reordering buffer or sequence numbers
//! are needed.
//!
//! A worker cannot start its next fetch before the consumer has taken the
//! previous chunk off its slot. A slow consumer therefore stalls workers
//! instead of piling up buffers.
//!
//! ```text
//! worker 0: [0,B)      [PB,PB+B)    ...  --slot 0--\
//! worker 1: [B,2B)     [PB+B,PB+2B) ...  --slot 1---+--> next_chunk() in file order
//! worker P-1: ...                        --slot P-1/
//! ```

use std::fmt;
use std::io::{self, Read};
use std::ops::Range;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, select};
use http::HeaderMap;
use tracing::{debug, trace, warn};

use crate::config::StreamerConfig;
use crate::error::{StreamError, StreamResult};
use crate::pool::{Buffer, BufferPool};
use crate::transport::{RangeTransport, range_header};

/// Returns the byte ranges fetched by `worker` out of `parallelism` workers.
///
/// Worker `i` starts at `i * buffer_size` and advances by
/// `buffer_size * parallelism`. The last range is clipped to `file_size`.
/// Taken over all workers and ordered by start, the ranges tile
/// `[0, file_size)` without gaps or overlaps.
pub fn worker_ranges(
    worker: usize,
    file_size: u64,
    buffer_size: usize,
    parallelism: usize,
) -> impl Iterator<Item = Range<u64>> + Send + 'static {
    let buffer_size = buffer_size as u64;
    let stride = buffer_size.saturating_mul(parallelism as u64);
    let first = (worker as u64).saturating_mul(buffer_size);
    let valid = buffer_size > 0 && worker < parallelism;

    std::iter::successors(Some(first), move |start| start.checked_add(stride))
        .take_while(move |&start| valid && start < file_size)
        .map(move |start| start..start.saturating_add(buffer_size).min(file_size))
}

/// A chunk of the resource handed to the consumer.
///
/// The chunk owns its [`Buffer`]; give it back with
/// [`ChunkStream::return_buffer`] once the bytes are copied out.
#[derive(Debug)]
pub struct Chunk {
    buffer: Buffer,
    len: usize,
    offset: u64,
    last: bool,
}

impl Chunk {
    /// The chunk's bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.buffer.as_slice()[..self.len]
    }

    /// Number of valid bytes in the chunk.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the chunk holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of the first byte within the resource.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The byte range of the resource this chunk covers.
    #[must_use]
    pub fn range(&self) -> Range<u64> {
        self.offset..self.offset + self.len as u64
    }

    /// Returns `true` for the final chunk of the resource.
    ///
    /// The end of the stream is signalled together with the last bytes, not
    /// by a separate empty chunk.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.last
    }

    /// Releases the underlying buffer.
    #[must_use]
    pub fn into_buffer(self) -> Buffer {
        self.buffer
    }
}

/// Pull interface over an ordered sequence of chunks.
pub trait ChunkStream {
    /// Returns the next chunk in file order.
    ///
    /// Returns `Ok(None)` once every chunk was delivered; the final chunk
    /// itself reports [`Chunk::is_last`].
    ///
    /// # Errors
    ///
    /// Returns the error captured for the chunk due next. After an error the
    /// stream is unusable.
    fn next_chunk(&mut self) -> StreamResult<Option<Chunk>>;

    /// Hands a chunk's buffer back for reuse.
    fn return_buffer(&self, buffer: Buffer);

    /// Stops all fetching. Returns without waiting for in-flight requests.
    fn close(&mut self);
}

type Slot = StreamResult<Chunk>;

/// Shared cancellation flag.
///
/// Nothing is ever sent on the channel; dropping the sender disconnects every
/// receiver at once, which both `try_recv` and `select!` observe.
#[derive(Clone)]
struct CancelSignal {
    rx: Receiver<()>,
}

impl CancelSignal {
    fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/// State private to one worker thread.
struct Worker<T> {
    index: usize,
    url: Arc<str>,
    transport: Arc<T>,
    pool: Arc<BufferPool>,
    slot: Sender<Slot>,
    cancel: CancelSignal,
}

impl<T: RangeTransport> Worker<T> {
    fn download_chunks(self, ranges: impl Iterator<Item = Range<u64>>) {
        debug!(target: "rangestream::worker", worker = self.index, "Range worker started");

        let mut delivered = 0u64;
        for range in ranges {
            if self.cancel.is_cancelled() {
                break;
            }

            let mut buffer = self.pool.acquire();
            trace!(
                target: "rangestream::worker",
                worker = self.index,
                start = range.start,
                end = range.end,
                "Fetching chunk"
            );

            let item = match self.fetch_into(range.clone(), &mut buffer) {
                Ok(()) => Ok(Chunk {
                    buffer,
                    len: (range.end - range.start) as usize,
                    offset: range.start,
                    last: false,
                }),
                Err(err) => {
                    self.pool.release(buffer);
                    if !err.is_cancelled() {
                        warn!(
                            target: "rangestream::worker",
                            worker = self.index,
                            start = range.start,
                            end = range.end,
                            %err,
                            "Chunk fetch failed"
                        );
                    }
                    Err(err)
                }
            };

            let failed = item.is_err();
            if !self.deliver(item) {
                break;
            }
            delivered += 1;
            if failed {
                break;
            }
        }

        debug!(
            target: "rangestream::worker",
            worker = self.index,
            delivered,
            "Range worker shutting down"
        );
    }

    /// Blocks until the consumer takes `item` or the stream is cancelled.
    fn deliver(&self, item: Slot) -> bool {
        select! {
            send(self.slot, item) -> res => res.is_ok(),
            recv(self.cancel.rx) -> _ => false,
        }
    }

    fn fetch_into(&self, range: Range<u64>, buffer: &mut Buffer) -> StreamResult<()> {
        let (start, end) = (range.start, range.end);
        let fetch_error = |source: StreamError| StreamError::RangeFetch {
            start,
            end,
            source: Box::new(source),
        };

        let response = self
            .transport
            .get(&self.url, &range_header(range))
            .map_err(fetch_error)?;
        if response.status != 206 {
            return Err(fetch_error(StreamError::Http {
                status: response.status,
                expected: 206,
            }));
        }

        let expected = (end - start) as usize;
        let dest = &mut buffer.as_mut_slice()[..expected];
        let mut body = response.body;
        let mut filled = 0;

        while filled < expected {
            if self.cancel.is_cancelled() {
                return Err(StreamError::Cancelled);
            }
            match body.read(&mut dest[filled..]) {
                Ok(0) => {
                    return Err(StreamError::ReadBody {
                        start,
                        expected: expected as u64,
                        actual: filled as u64,
                        source: io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "body ended before the requested range was complete",
                        ),
                    });
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    return Err(StreamError::ReadBody {
                        start,
                        expected: expected as u64,
                        actual: filled as u64,
                        source: err,
                    });
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Streaming,
    Finished,
    Failed,
    Closed,
}

/// Streams a remote resource through parallel range requests.
///
/// The streamer discovers the resource size on construction and immediately
/// starts `parallelism` worker threads. Chunks come out of
/// [`next_chunk`](ChunkStream::next_chunk) strictly in file order.
///
/// [`close`](ChunkStream::close) and dropping both cancel the workers without
/// waiting for them. A worker blocked inside a transport call exits once that
/// call returns. [`join`](Streamer::join) waits for that explicitly.
pub struct Streamer<T: RangeTransport> {
    url: Arc<str>,
    config: StreamerConfig,
    file_size: u64,
    transport: Arc<T>,
    pool: Arc<BufferPool>,
    slots: Vec<Receiver<Slot>>,
    workers: Vec<JoinHandle<()>>,
    cancel: Option<Sender<()>>,
    cur_slot: usize,
    total_read: u64,
    state: State,
}

impl<T: RangeTransport> Streamer<T> {
    /// Discovers the size of `url` and starts the workers.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The size-discovery `GET` fails, is not answered with 200, or has no
    ///   content length
    /// - A worker thread cannot be spawned
    pub fn new(url: impl Into<String>, config: StreamerConfig, transport: T) -> StreamResult<Self> {
        config.validate()?;

        let url: Arc<str> = Arc::from(url.into());
        let transport = Arc::new(transport);
        let file_size = discover_size(&*transport, &url)?;

        debug!(
            target: "rangestream::streamer",
            url = %url,
            file_size,
            buffer_size = config.buffer_size,
            parallelism = config.parallelism,
            "Starting range workers"
        );

        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let pool = Arc::new(BufferPool::new(config.buffer_size));
        let parallelism = config.parallelism;

        let mut streamer = Self {
            url: Arc::clone(&url),
            config,
            file_size,
            transport: Arc::clone(&transport),
            pool: Arc::clone(&pool),
            slots: Vec::with_capacity(parallelism),
            workers: Vec::with_capacity(parallelism),
            cancel: Some(cancel_tx),
            cur_slot: 0,
            total_read: 0,
            state: if file_size == 0 {
                State::Finished
            } else {
                State::Streaming
            },
        };

        for index in 0..parallelism {
            let (slot_tx, slot_rx) = bounded(0);
            let worker = Worker {
                index,
                url: Arc::clone(&url),
                transport: Arc::clone(&transport),
                pool: Arc::clone(&pool),
                slot: slot_tx,
                cancel: CancelSignal {
                    rx: cancel_rx.clone(),
                },
            };
            let ranges = worker_ranges(index, file_size, streamer.config.buffer_size, parallelism);

            let spawned = thread::Builder::new()
                .name(format!("rangestream-worker-{index}"))
                .spawn(move || worker.download_chunks(ranges));
            let handle = match spawned {
                Ok(handle) => handle,
                Err(err) => {
                    warn!(
                        target: "rangestream::streamer",
                        worker = index,
                        %err,
                        "Failed to spawn range worker"
                    );
                    streamer.close();
                    return Err(err.into());
                }
            };

            streamer.slots.push(slot_rx);
            streamer.workers.push(handle);
        }

        Ok(streamer)
    }

    /// Size of the resource in bytes.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of bytes delivered to the consumer so far.
    #[must_use]
    pub fn total_read(&self) -> u64 {
        self.total_read
    }

    /// URL of the resource.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The configuration the streamer was built with.
    #[must_use]
    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    /// Number of worker threads.
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.config.parallelism
    }

    /// Size of each chunk, and of the pooled buffers.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.config.buffer_size
    }

    /// The transport used by the workers.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The buffer pool shared with the workers.
    #[must_use]
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Signals cancellation and disconnects the slots without waiting.
    fn shutdown(&mut self) {
        self.cancel.take();
        self.slots.clear();
    }

    /// Closes the stream and waits for every worker thread to exit.
    ///
    /// Each worker first finishes its in-flight transport call, so this blocks
    /// for as long as the transport does. Use [`close`](ChunkStream::close)
    /// when the transport has no deadline.
    pub fn join(&mut self) {
        self.close();
        for (worker, handle) in self.workers.drain(..).enumerate() {
            if handle.join().is_err() {
                warn!(target: "rangestream::streamer", worker, "Range worker panicked");
            }
        }
    }

    fn fail(&mut self) {
        self.state = State::Failed;
        self.shutdown();
    }
}

#[cfg(feature = "http-client")]
impl Streamer<crate::http_client::HttpTransport> {
    /// Streams `url` over a default [`HttpTransport`](crate::HttpTransport).
    ///
    /// # Errors
    ///
    /// Same as [`Streamer::new`], plus failures building the HTTP client.
    pub fn from_url(url: impl Into<String>, config: StreamerConfig) -> StreamResult<Self> {
        Self::new(url, config, crate::http_client::HttpTransport::new()?)
    }
}

impl<T: RangeTransport> ChunkStream for Streamer<T> {
    fn next_chunk(&mut self) -> StreamResult<Option<Chunk>> {
        match self.state {
            State::Streaming => {}
            State::Finished => return Ok(None),
            State::Failed => return Err(StreamError::Terminated),
            State::Closed => return Err(StreamError::Closed),
        }

        let slot = self.cur_slot;
        let mut chunk = match self.slots[slot].recv() {
            Ok(Ok(chunk)) => chunk,
            Ok(Err(err)) => {
                warn!(
                    target: "rangestream::streamer",
                    slot,
                    total_read = self.total_read,
                    %err,
                    "Stream failed"
                );
                self.fail();
                return Err(err);
            }
            Err(_) => {
                self.fail();
                return Err(StreamError::WorkerLost { slot });
            }
        };

        debug_assert_eq!(chunk.offset, self.total_read, "chunk out of order");
        self.total_read += chunk.len as u64;
        trace!(
            target: "rangestream::streamer",
            slot,
            offset = chunk.offset,
            len = chunk.len,
            total_read = self.total_read,
            "Delivering chunk"
        );

        if self.total_read == self.file_size {
            chunk.last = true;
            self.state = State::Finished;
            debug!(
                target: "rangestream::streamer",
                file_size = self.file_size,
                buffers = self.pool.allocated(),
                "All chunks delivered"
            );
        } else {
            self.cur_slot = (slot + 1) % self.config.parallelism;
        }

        Ok(Some(chunk))
    }

    fn return_buffer(&self, buffer: Buffer) {
        self.pool.release(buffer);
    }

    fn close(&mut self) {
        if self.state == State::Closed {
            return;
        }
        self.shutdown();
        self.state = State::Closed;
        debug!(
            target: "rangestream::streamer",
            total_read = self.total_read,
            file_size = self.file_size,
            "Streamer closed"
        );
    }
}

impl<T: RangeTransport> Drop for Streamer<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: RangeTransport> fmt::Debug for Streamer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Streamer")
            .field("url", &self.url)
            .field("config", &self.config)
            .field("file_size", &self.file_size)
            .field("cur_slot", &self.cur_slot)
            .field("total_read", &self.total_read)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Learns the resource size from the content length of a plain `GET`.
fn discover_size<T: RangeTransport>(transport: &T, url: &str) -> StreamResult<u64> {
    let discovery_error = |source: StreamError| StreamError::SizeDiscovery {
        url: url.to_owned(),
        source: Box::new(source),
    };

    let response = transport
        .get(url, &HeaderMap::new())
        .map_err(discovery_error)?;
    if response.status != 200 {
        return Err(discovery_error(StreamError::Http {
            status: response.status,
            expected: 200,
        }));
    }

    response
        .content_length
        .ok_or_else(|| discovery_error(StreamError::MissingContentLength))
}
