//! In-memory transport with injectable latency and faults.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use http::HeaderMap;
use http::header::RANGE;

use crate::error::{StreamError, StreamResult};
use crate::transport::{RangeTransport, TransportResponse, parse_range};

type LatencyFn = dyn Fn(u64) -> Duration + Send + Sync;

/// Fault injected for the range starting at a given offset.
#[derive(Debug, Clone, Copy)]
enum Fault {
    Status(u16),
    Truncate(usize),
    Refuse,
}

/// Transport serving a byte slice held in memory.
///
/// Range semantics match [`LocalTransport`](crate::LocalTransport). On top of
/// that, tests can delay responses per range, override statuses, cut bodies
/// short, refuse requests outright, and slow down body reads. Faults are keyed
/// by the first byte of the requested range.
pub struct MemoryTransport {
    data: Arc<[u8]>,
    latency: Option<Arc<LatencyFn>>,
    faults: HashMap<u64, Fault>,
    trickle: Option<(usize, Duration)>,
    requests: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryTransport {
    /// Creates a transport serving `data`.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        Self {
            data: Arc::from(data),
            latency: None,
            faults: HashMap::new(),
            trickle: None,
            requests: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delays every request by `latency(range_start)` before answering.
    ///
    /// Requests without a `Range` header use `0` as their start.
    #[must_use]
    pub fn with_latency<F>(mut self, latency: F) -> Self
    where
        F: Fn(u64) -> Duration + Send + Sync + 'static,
    {
        self.latency = Some(Arc::new(latency));
        self
    }

    /// Answers the range starting at `start` with `status` and an empty body.
    #[must_use]
    pub fn with_status(mut self, start: u64, status: u16) -> Self {
        self.faults.insert(start, Fault::Status(status));
        self
    }

    /// Answers the range starting at `start` with only its first `len` bytes.
    #[must_use]
    pub fn with_truncated_body(mut self, start: u64, len: usize) -> Self {
        self.faults.insert(start, Fault::Truncate(len));
        self
    }

    /// Fails the request for the range starting at `start` without a response.
    #[must_use]
    pub fn with_refused(mut self, start: u64) -> Self {
        self.faults.insert(start, Fault::Refuse);
        self
    }

    /// Makes bodies yield at most `step` bytes per read, sleeping `delay` before each.
    #[must_use]
    pub fn with_trickle(mut self, step: usize, delay: Duration) -> Self {
        self.trickle = Some((step.max(1), delay));
        self
    }

    /// The bytes served by this transport.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Highest number of requests that were being answered at the same time.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn body(&self, bytes: Vec<u8>) -> Box<dyn Read + Send> {
        match self.trickle {
            Some((step, delay)) => Box::new(Trickle {
                inner: Cursor::new(bytes),
                step,
                delay,
            }),
            None => Box::new(Cursor::new(bytes)),
        }
    }

    fn respond(&self, headers: &HeaderMap) -> StreamResult<TransportResponse> {
        let size = self.data.len() as u64;

        let Some(value) = headers.get(RANGE) else {
            if let Some(latency) = &self.latency {
                std::thread::sleep(latency(0));
            }
            return Ok(TransportResponse {
                status: 200,
                content_length: Some(size),
                body: self.body(self.data.to_vec()),
            });
        };

        let Some(range) = value.to_str().ok().and_then(|v| parse_range(v, size)) else {
            return Ok(TransportResponse {
                status: 416,
                content_length: Some(0),
                body: Box::new(io::empty()),
            });
        };

        if let Some(latency) = &self.latency {
            std::thread::sleep(latency(range.start));
        }

        let mut bytes = self.data[range.start as usize..range.end as usize].to_vec();
        match self.faults.get(&range.start) {
            Some(Fault::Status(status)) => {
                return Ok(TransportResponse {
                    status: *status,
                    content_length: Some(0),
                    body: Box::new(io::empty()),
                });
            }
            Some(Fault::Refuse) => {
                return Err(StreamError::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "refused by memory transport",
                )));
            }
            Some(Fault::Truncate(len)) => bytes.truncate(*len),
            None => {}
        }

        Ok(TransportResponse {
            status: 206,
            content_length: Some(range.end - range.start),
            body: self.body(bytes),
        })
    }
}

impl RangeTransport for MemoryTransport {
    fn get(&self, _url: &str, headers: &HeaderMap) -> StreamResult<TransportResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let response = self.respond(headers);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("len", &self.data.len())
            .field("faults", &self.faults)
            .field("requests", &self.requests())
            .finish_non_exhaustive()
    }
}

/// Body that hands out its bytes slowly.
struct Trickle {
    inner: Cursor<Vec<u8>>,
    step: usize,
    delay: Duration,
}

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        std::thread::sleep(self.delay);
        let len = buf.len().min(self.step);
        self.inner.read(&mut buf[..len])
    }
}
