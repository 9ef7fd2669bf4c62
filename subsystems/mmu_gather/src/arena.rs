//! # Overflow Buffer Arenas
//!
//! Sources for the collector's overflow buffer. Allocation happens on the
//! reclamation path, so every arena must be non-blocking and must never
//! reclaim memory itself: failure only costs flush frequency.

use alloc::vec::Vec;

use spin::Mutex;

use crate::collector::GatherBuffer;

/// Best-effort source of overflow buffers
pub trait GatherArena {
    /// Try to obtain a buffer of `capacity` handles without blocking
    fn try_alloc(&self, capacity: usize) -> Option<GatherBuffer>;

    /// Give a buffer back
    fn free(&self, buffer: GatherBuffer);
}

impl<A: GatherArena + ?Sized> GatherArena for &A {
    fn try_alloc(&self, capacity: usize) -> Option<GatherBuffer> {
        (**self).try_alloc(capacity)
    }

    fn free(&self, buffer: GatherBuffer) {
        (**self).free(buffer);
    }
}

// =============================================================================
// Heap Arena
// =============================================================================

/// Allocates overflow buffers from the kernel heap
///
/// Uses fallible reservation, so heap exhaustion yields `None` instead of
/// invoking the allocation error handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapArena;

impl GatherArena for HeapArena {
    fn try_alloc(&self, capacity: usize) -> Option<GatherBuffer> {
        GatherBuffer::try_new(capacity)
    }

    fn free(&self, buffer: GatherBuffer) {
        drop(buffer);
    }
}

// =============================================================================
// Inline Only
// =============================================================================

/// Never hands out a buffer; sessions stay on their inline slots
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOverflow;

impl GatherArena for NoOverflow {
    fn try_alloc(&self, _capacity: usize) -> Option<GatherBuffer> {
        None
    }

    fn free(&self, buffer: GatherBuffer) {
        drop(buffer);
    }
}

// =============================================================================
// Buffer Pool
// =============================================================================

/// Pre-filled pool of overflow buffers shared by concurrent sessions
///
/// Buffers are allocated up front so teardown never touches the heap.
/// A contended lock is treated like an empty pool on allocation, and a
/// buffer freed into a contended or already full pool is dropped.
#[derive(Debug)]
pub struct GatherBufferPool {
    buffers: Mutex<Vec<GatherBuffer>>,
    capacity: usize,
}

impl GatherBufferPool {
    /// Create a pool of up to `count` buffers of `capacity` handles each
    ///
    /// Stops early if the heap runs out; check [`available`](Self::available).
    pub fn new(count: usize, capacity: usize) -> Self {
        let mut buffers = Vec::new();
        if buffers.try_reserve_exact(count).is_ok() {
            for _ in 0..count {
                match GatherBuffer::try_new(capacity) {
                    Some(buf) => buffers.push(buf),
                    None => break,
                }
            }
        }

        if buffers.len() < count {
            log::warn!("GatherBufferPool: only {}/{} buffers allocated", buffers.len(), count);
        }

        Self {
            buffers: Mutex::new(buffers),
            capacity,
        }
    }

    /// Capacity of each pooled buffer
    pub fn buffer_capacity(&self) -> usize {
        self.capacity
    }

    /// Buffers currently in the pool
    pub fn available(&self) -> usize {
        self.buffers.lock().len()
    }
}

impl GatherArena for GatherBufferPool {
    fn try_alloc(&self, capacity: usize) -> Option<GatherBuffer> {
        if capacity > self.capacity {
            return None;
        }
        self.buffers.try_lock()?.pop()
    }

    fn free(&self, buffer: GatherBuffer) {
        if buffer.capacity() != self.capacity {
            return;
        }
        if let Some(mut buffers) = self.buffers.try_lock() {
            // Never grow past the reservation made in `new`
            if buffers.len() < buffers.capacity() {
                buffers.push(buffer);
            }
        }
    }
}
