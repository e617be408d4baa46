//! Console Ring Buffers
//!
//! Fixed-capacity byte FIFO shared between exactly one producer and one
//! consumer, where the two sides may run in different execution contexts
//! (thread mode and the radio event handler). One slot is always left unused
//! so `head == tail` means empty and `tail + 1 == head` means full without a
//! separate counter.
//!
//! The producer only ever stores `tail` and the consumer only ever stores
//! `head`. Each side publishes its index with `Release` after touching the
//! slot and observes the other side's index with `Acquire`.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Single-producer / single-consumer byte ring of `N` slots (`N - 1` usable).
pub struct RingBuffer<const N: usize> {
    buffer: UnsafeCell<[u8; N]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: a slot is written only by the producer while it lies outside
// `head..tail`, and read only by the consumer while it lies inside. The
// index handoff is ordered by Release/Acquire.
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

impl<const N: usize> RingBuffer<N> {
    /// Create an empty buffer. Usable in `static` initializers.
    pub const fn new() -> Self {
        assert!(N >= 2, "ring buffer needs at least one usable slot");
        Self {
            buffer: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    #[inline]
    const fn next(index: usize) -> usize {
        if index + 1 == N {
            0
        } else {
            index + 1
        }
    }

    /// Number of bytes the buffer can hold at once.
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        Self::next(self.tail.load(Ordering::Acquire)) == self.head.load(Ordering::Acquire)
    }

    /// Bytes currently queued.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if tail >= head {
            tail - head
        } else {
            N - head + tail
        }
    }

    /// Append a byte at `tail`. Producer side only.
    ///
    /// Callers are expected to check [`is_full`](Self::is_full) first. A push
    /// into a full buffer hands the byte back and leaves both indices alone.
    #[inline]
    pub fn push(&self, byte: u8) -> Result<(), u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        let next = Self::next(tail);
        if next == self.head.load(Ordering::Acquire) {
            return Err(byte);
        }

        // SAFETY: `tail` is outside the consumer's readable range until the
        // store below publishes it.
        unsafe {
            (*self.buffer.get())[tail] = byte;
        }
        self.tail.store(next, Ordering::Release);
        Ok(())
    }

    /// Remove the byte at `head`. Consumer side only.
    #[inline]
    pub fn pop(&self) -> Option<u8> {
        let head = self.head.load(Ordering::Relaxed);
        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: `head` was published by the producer and will not be
        // rewritten until the store below releases it.
        let byte = unsafe { (*self.buffer.get())[head] };
        self.head.store(Self::next(head), Ordering::Release);
        Some(byte)
    }

    /// Push as much of `data` as fits and return how many bytes were taken.
    pub fn push_slice(&self, data: &[u8]) -> usize {
        let mut taken = 0;
        for &byte in data {
            if self.push(byte).is_err() {
                break;
            }
            taken += 1;
        }
        taken
    }

    /// Raw `(head, tail)` pair, for inspecting the index invariants.
    pub fn indices(&self) -> (usize, usize) {
        (self.head.load(Ordering::Acquire), self.tail.load(Ordering::Acquire))
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
