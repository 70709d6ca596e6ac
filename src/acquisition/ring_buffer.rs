// src/acquisition/ring_buffer.rs
//! Lock-free SPSC ring buffer handing samples out of interrupt context
//!
//! Capacity is a power of two so wraparound is a mask, never a division.
//! One slot is kept vacant, so a buffer of capacity `C` holds at most `C - 1`
//! elements. When the producer catches the consumer it advances `tail` and
//! the oldest element is silently discarded: the interrupt-context producer
//! must never block, so data loss is the chosen backpressure policy and
//! callers size the capacity to exceed their drain latency.
//!
//! Access is strictly single-producer/single-consumer: `push` only from the
//! sample-ready callback, `pop`/`pop_many` only from application context.
//! Indices use acquire/release atomics so the consumer observes producer
//! progress without fences elsewhere.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

/// Ring buffer error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingBufferError {
    /// Capacity was zero or not a power of two
    #[error("invalid buffer capacity (must be a non-zero power of two)")]
    InvalidCapacity,
    /// Read attempted while no element was stored
    #[error("get on empty buffer")]
    Empty,
}

/// Fixed-capacity SPSC ring buffer with overwrite-on-full semantics
pub struct RingBuffer<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    capacity: usize,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T: Copy> RingBuffer<T> {
    /// Create a buffer for `capacity` elements
    ///
    /// Fails with [`RingBufferError::InvalidCapacity`] unless `capacity` is a
    /// non-zero power of two, checked with the `value & (value - 1)` parity
    /// trick.
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        if capacity == 0 || capacity & (capacity - 1) != 0 {
            return Err(RingBufferError::InvalidCapacity);
        }

        let buffer = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            buffer,
            capacity,
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        })
    }

    /// Store one element, evicting the oldest when full (producer side)
    ///
    /// Never blocks and never allocates; safe to call from interrupt context.
    pub fn push(&self, item: T) {
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) & self.mask;

        unsafe { (*self.buffer[head].get()).write(item) };

        let tail = self.tail.load(Ordering::Acquire);
        if next == tail {
            // Consumer has fallen behind: drop the oldest element.
            self.tail.store((tail + 1) & self.mask, Ordering::Release);
        }
        self.head.store(next, Ordering::Release);
    }

    /// Remove and return the oldest element (consumer side)
    pub fn pop(&self) -> Result<T, RingBufferError> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return Err(RingBufferError::Empty);
        }

        let item = unsafe { (*self.buffer[tail].get()).assume_init_read() };
        self.tail.store((tail + 1) & self.mask, Ordering::Release);
        Ok(item)
    }

    /// Drain up to `out.len()` elements into `out` (consumer side)
    ///
    /// Copies at most `min(out.len(), capacity, stored)` elements; a run
    /// crossing the end of storage becomes two contiguous copies. Returns the
    /// number of elements actually drained; an empty `out` returns 0 without
    /// touching buffer state.
    pub fn pop_many(&self, out: &mut [T]) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        let stored = head.wrapping_sub(tail) & self.mask;
        let total = out.len().min(self.capacity).min(stored);
        if total == 0 {
            return 0;
        }

        let tail_to_end = self.capacity - tail;
        let out_ptr = out.as_mut_ptr();
        unsafe {
            let base = self.buffer.as_ptr() as *const T;
            if total <= tail_to_end {
                ptr::copy_nonoverlapping(base.add(tail), out_ptr, total);
            } else {
                ptr::copy_nonoverlapping(base.add(tail), out_ptr, tail_to_end);
                ptr::copy_nonoverlapping(base, out_ptr.add(tail_to_end), total - tail_to_end);
            }
        }

        self.tail.store((tail + total) & self.mask, Ordering::Release);
        total
    }

    /// Discard everything currently stored (consumer side)
    pub fn clear(&self) {
        let head = self.head.load(Ordering::Acquire);
        self.tail.store(head, Ordering::Release);
    }

    /// Number of stored elements
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail) & self.mask
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Whether the next push will evict the oldest element
    pub fn is_full(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (head + 1) & self.mask == tail
    }

    /// Configured capacity (usable slots are `capacity - 1`)
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
