//! Fixed-capacity slot pools
//!
//! All rendering state lives in arrays sized at construction: polygon
//! records, work units and extra-data blocks. Slots are handed out by
//! bumping a cursor; nothing is freed individually and the whole pool is
//! reclaimed at once when the engine drains. A slot is written by the
//! submitting thread strictly before its owning unit is published to the
//! worker pool and stays frozen from then until the next drain, which is
//! what makes the shared references handed to workers sound.

use std::cell::UnsafeCell;

use crate::handoff::HandoffState;
use crate::unit::WorkUnit;
use crate::SCANLINES_PER_BUCKET;

/// Work units a polygon may claim before it forces a drain
const UNITS_PER_POLY: usize = 100 / SCANLINES_PER_BUCKET;

/// Interior-mutable pool slot
///
/// The contract: `get_mut` is called only by the submitting thread on a
/// slot not yet published this generation, `get` only on published slots.
/// Publication happens through the worker pool hand-off, which orders the
/// write before any worker read.
pub struct Slot<T>(UnsafeCell<T>);

unsafe impl<T: Send + Sync> Sync for Slot<T> {}

impl<T> Slot<T> {
    pub fn new(value: T) -> Self {
        Slot(UnsafeCell::new(value))
    }

    /// Submitting-thread write access
    ///
    /// Safety: the slot must not be published to any in-flight unit and
    /// no other reference to it may exist.
    pub unsafe fn get_mut(&self) -> &mut T {
        &mut *self.0.get()
    }

    /// Shared read access
    ///
    /// Safety: the slot must be published and therefore frozen until the
    /// next drain.
    pub unsafe fn get(&self) -> &T {
        &*self.0.get()
    }
}

/// A work unit and its hand-off word, padded to a cache line so state
/// words of adjacent units do not false-share
#[repr(align(64))]
pub struct UnitSlot {
    pub data: Slot<WorkUnit>,
    pub state: HandoffState,
}

impl UnitSlot {
    pub fn new() -> Self {
        UnitSlot {
            data: Slot::new(WorkUnit::default()),
            state: HandoffState::new(),
        }
    }
}

/// Upper bound on the units a polygon spanning `miny..maxy` can claim:
/// one per bucket row touched, plus slack for unaligned first and last
/// batches
pub fn units_for_span(miny: i32, maxy: i32) -> usize {
    (maxy - miny) as usize / SCANLINES_PER_BUCKET + 2
}

/// Unit pool size for a polygon pool of `max_polys`, capped so unit
/// indices stay below the 16-bit sentinel
pub fn unit_pool_size(max_polys: usize) -> usize {
    (max_polys * UNITS_PER_POLY).min(0xffff)
}
