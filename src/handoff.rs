//! Lock-free work unit hand-off
//!
//! Every work unit owns one atomic state word shared between the worker
//! delivering the unit and the at most one later unit that keys on it. The
//! low 16 bits count scanlines not yet delivered; the high 16 bits hold
//! the index of a successor unit that parked itself behind this one, with
//! 0 meaning none. Unit 0 never parks (it is created into freshly reset
//! buckets), so index 0 is free to act as the sentinel. All transitions go
//! through this type.

use std::sync::atomic::{AtomicU32, Ordering};

/// Outcome of gating one unit on its predecessor
#[derive(Debug,Copy,Clone,PartialEq)]
pub enum Gate {
    /// Predecessor already delivered; run now
    Ready,
    /// Parked behind the predecessor; its finisher re-dispatches us
    Deferred,
}

/// Scanlines still undelivered, or'd with a successor index in the
/// high half
#[derive(Debug)]
pub struct HandoffState(AtomicU32);

impl HandoffState {
    pub fn new() -> Self {
        HandoffState(AtomicU32::new(0))
    }

    /// Arm a fresh unit with `count` scanlines to deliver
    ///
    /// Called by the submitting thread only, before the unit is published
    /// to the worker pool.
    pub fn arm(&self, count: u32) {
        debug_assert!(count > 0 && count <= 0xffff);
        self.0.store(count, Ordering::Release);
    }

    /// Scanlines not yet delivered; 0 once the unit has been run
    pub fn remaining(&self) -> u32 {
        self.0.load(Ordering::Acquire) & 0xffff
    }

    /// Gate `unit` on this (predecessor) state word
    ///
    /// Returns `Ready` if the predecessor has already delivered, otherwise
    /// publishes `unit` in the high bits and returns `Deferred`. At most
    /// one unit ever gates on a given predecessor, so a successor already
    /// present cannot be overwritten.
    pub fn gate_or_defer(&self, unit: u16) -> Gate {
        debug_assert!(unit != 0);
        let mut old = self.0.load(Ordering::Acquire);
        loop {
            if old == 0 {
                return Gate::Ready;
            }
            debug_assert_eq!(old >> 16, 0);
            match self.0.compare_exchange_weak(
                old,
                old | (u32::from(unit) << 16),
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return Gate::Deferred,
                Err(now) => old = now,
            }
        }
    }

    /// Mark the unit delivered, returning the successor that parked on it
    /// while it ran, if any
    ///
    /// The single swap both zeroes the scanline count and claims the
    /// successor, so a successor either lands before the swap (and is
    /// returned here) or observes the zeroed word and runs itself.
    pub fn finish(&self) -> Option<u16> {
        let old = self.0.swap(0, Ordering::AcqRel);
        let next = (old >> 16) as u16;
        if next != 0 { Some(next) } else { None }
    }
}

impl Default for HandoffState {
    fn default() -> Self {
        HandoffState::new()
    }
}
