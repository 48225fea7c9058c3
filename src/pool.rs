//! Fixed-size buffer pool shared by the workers and the consumer.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_queue::SegQueue;

/// An owned, fixed-capacity byte buffer.
///
/// A buffer has exactly one owner at a time. It moves from the pool to a
/// worker, through a slot to the consumer, and back to the pool.
pub struct Buffer {
    data: Box<[u8]>,
}

impl Buffer {
    /// Allocates a zeroed buffer of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    /// Returns the buffer capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the whole buffer.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Returns the whole buffer for writing.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("capacity", &self.data.len())
            .finish()
    }
}

/// A pool of equally sized [`Buffer`]s.
///
/// `acquire` pops a free buffer or allocates a new one; `release` pushes a
/// buffer back. Both are safe to call from any thread.
#[derive(Debug)]
pub struct BufferPool {
    buffer_size: usize,
    free: SegQueue<Buffer>,
    allocated: AtomicUsize,
}

impl BufferPool {
    /// Creates an empty pool handing out buffers of `buffer_size` bytes.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            free: SegQueue::new(),
            allocated: AtomicUsize::new(0),
        }
    }

    /// Takes a buffer from the pool, allocating one if the pool is empty.
    pub fn acquire(&self) -> Buffer {
        if let Some(buffer) = self.free.pop() {
            return buffer;
        }
        self.allocated.fetch_add(1, Ordering::Relaxed);
        Buffer::new(self.buffer_size)
    }

    /// Returns a buffer to the pool.
    ///
    /// Buffers of a different size are dropped instead of pooled.
    pub fn release(&self, buffer: Buffer) {
        if buffer.capacity() == self.buffer_size {
            self.free.push(buffer);
        } else {
            tracing::trace!(
                target: "rangestream::pool",
                capacity = buffer.capacity(),
                expected = self.buffer_size,
                "Dropping foreign buffer"
            );
        }
    }

    /// Size of the buffers in this pool.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Total number of buffers this pool has ever allocated.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Number of buffers currently idle in the pool.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }
}
