//! Trait defining the HTTP capability the streamer depends on.

use std::fmt;
use std::io::Read;
use std::ops::Range;
use std::sync::Arc;

use http::HeaderMap;
use http::header::{HeaderValue, RANGE};

use crate::error::StreamResult;

/// A response to a `GET` request.
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Declared length of the body, if the server sent one.
    pub content_length: Option<u64>,
    /// The response body.
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Trait for clients able to issue `GET` requests with custom headers.
///
/// Every call is an independent request. The streamer calls `get` from several
/// worker threads at once, so implementations must tolerate concurrent use.
pub trait RangeTransport: Send + Sync + 'static {
    /// Performs a `GET` on `url` with the given headers.
    ///
    /// Non-2xx statuses are not errors at this layer; the caller inspects
    /// [`TransportResponse::status`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be performed at all.
    fn get(&self, url: &str, headers: &HeaderMap) -> StreamResult<TransportResponse>;
}

impl<T: RangeTransport> RangeTransport for Arc<T> {
    fn get(&self, url: &str, headers: &HeaderMap) -> StreamResult<TransportResponse> {
        (**self).get(url, headers)
    }
}

/// Builds the header map requesting the half-open byte range `range`.
///
/// `range` must be non-empty.
#[must_use]
pub fn range_header(range: Range<u64>) -> HeaderMap {
    debug_assert!(range.start < range.end);
    let mut headers = HeaderMap::with_capacity(1);
    let value = format!("bytes={}-{}", range.start, range.end - 1);
    // Digits, '-' and '=' are always valid header bytes.
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(RANGE, value);
    }
    headers
}

/// Parses a single `bytes=first-last` range against a resource of `size` bytes.
///
/// Returns the satisfiable half-open range, or `None` for anything malformed
/// or out of bounds. Open-ended (`bytes=10-`) and suffix (`bytes=-10`) forms
/// are accepted; multi-range requests are not.
pub(crate) fn parse_range(value: &str, size: u64) -> Option<Range<u64>> {
    let ranges = value.trim().strip_prefix("bytes=")?;
    if ranges.contains(',') {
        return None;
    }
    let (first, last) = ranges.split_once('-')?;
    let (first, last) = (first.trim(), last.trim());

    let range = if first.is_empty() {
        let suffix: u64 = last.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        size.saturating_sub(suffix)..size
    } else {
        let start: u64 = first.parse().ok()?;
        let end = if last.is_empty() {
            size
        } else {
            let last: u64 = last.parse().ok()?;
            if last < start {
                return None;
            }
            last.saturating_add(1).min(size)
        };
        start..end
    };

    (range.start < range.end).then_some(range)
}
