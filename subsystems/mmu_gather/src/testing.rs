//! Recording collaborators for unit tests.

use alloc::vec::Vec;
use core::cell::Cell;

use spin::Mutex;

use crate::arena::GatherArena;
use crate::collector::GatherBuffer;
use crate::ops::{AddressSpace, FrameAllocator, TlbMaintenance, VmRegion};
use crate::types::{Asid, PhysFrame};

/// One call into a collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    InvalidateRange { asid: Asid, start: u64, end: u64 },
    InvalidateAll { asid: Asid },
    FlushCache { start: u64, end: u64 },
    Release(PhysFrame),
    TrimTableCache,
}

/// TLB, cache and allocator mock that logs every call in order
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    pub fn released(&self) -> Vec<PhysFrame> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Release(frame) => Some(*frame),
                _ => None,
            })
            .collect()
    }

    pub fn full_invalidates(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, Event::InvalidateAll { .. }))
            .count()
    }

    pub fn range_invalidates(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, Event::InvalidateRange { .. }))
            .count()
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }
}

impl TlbMaintenance for Recorder {
    fn invalidate_range(&self, space: &dyn AddressSpace, start: u64, end: u64) {
        self.push(Event::InvalidateRange {
            asid: space.asid(),
            start,
            end,
        });
    }

    fn invalidate_all(&self, space: &dyn AddressSpace) {
        self.push(Event::InvalidateAll { asid: space.asid() });
    }

    fn flush_cache_range(&self, _region: &dyn VmRegion, start: u64, end: u64) {
        self.push(Event::FlushCache { start, end });
    }
}

impl FrameAllocator for Recorder {
    fn release(&self, frame: PhysFrame) {
        self.push(Event::Release(frame));
    }

    fn trim_table_cache(&self) {
        self.push(Event::TrimTableCache);
    }
}

pub struct TestSpace(pub Asid);

impl AddressSpace for TestSpace {
    fn asid(&self) -> Asid {
        self.0
    }
}

pub struct TestRegion {
    pub start: u64,
    pub end: u64,
}

impl TestRegion {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }
}

impl VmRegion for TestRegion {
    fn start(&self) -> u64 {
        self.start
    }

    fn end(&self) -> u64 {
        self.end
    }
}

/// Heap arena that refuses its first request
#[derive(Debug, Default)]
pub struct DenyFirst {
    requests: Cell<usize>,
    freed: Cell<usize>,
}

impl DenyFirst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn freed(&self) -> usize {
        self.freed.get()
    }
}

impl GatherArena for DenyFirst {
    fn try_alloc(&self, capacity: usize) -> Option<GatherBuffer> {
        let n = self.requests.get();
        self.requests.set(n + 1);
        if n == 0 {
            None
        } else {
            GatherBuffer::try_new(capacity)
        }
    }

    fn free(&self, buffer: GatherBuffer) {
        self.freed.set(self.freed.get() + 1);
        drop(buffer);
    }
}
