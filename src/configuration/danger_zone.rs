//! Reader/writer gate guarding the configuration trees.
//!
//! Readers enter the zone concurrently and never block each other. A writer
//! closes the gate: readers arriving afterwards wait, readers already inside
//! finish at their own pace, and the writer proceeds once the zone is empty.
//!
//! The gate is a `parking_lot::RwLock`, whose fair policy parks new readers as
//! soon as a writer is queued. Entering the zone twice from the same thread
//! while a writer is waiting deadlocks, so zone guards must never nest.

use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Instant;

use parking_lot::RwLock;
use parking_lot::RwLockReadGuard;
use parking_lot::RwLockWriteGuard;
use tracing::debug;
use tracing::trace;

pub struct DangerZone<T> {
    gate: RwLock<T>,
    inside: AtomicUsize,
}

/// Proof of presence inside the danger zone. Leaving drops the guard.
pub struct ZoneGuard<'a, T> {
    guard: RwLockReadGuard<'a, T>,
    inside: &'a AtomicUsize,
}

/// Exclusive access obtained by [`DangerZone::lock`]. Dropping it reopens the gate.
pub struct ZoneLock<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
}

impl<T> DangerZone<T> {
    pub fn new(value: T) -> Self {
        Self {
            gate: RwLock::new(value),
            inside: AtomicUsize::new(0),
        }
    }

    /// Blocks while a writer holds the gate, then joins the readers inside.
    pub fn enter(&self) -> ZoneGuard<'_, T> {
        let guard = self.gate.read();
        let now_inside = self.inside.fetch_add(1, Ordering::AcqRel) + 1;
        trace!("entered danger zone, {} reader(s) inside", now_inside);
        ZoneGuard {
            guard,
            inside: &self.inside,
        }
    }

    /// Closes the gate and waits until every reader inside has left.
    ///
    /// There is no timeout: a reader that got in just before the gate closed
    /// is allowed to finish however long it takes.
    pub fn lock(&self) -> ZoneLock<'_, T> {
        let started = Instant::now();
        let guard = self.gate.write();
        debug!(
            "danger zone locked after waiting {:?} for readers to drain",
            started.elapsed()
        );
        ZoneLock { guard }
    }

    /// Number of readers currently inside the zone
    pub fn readers_inside(&self) -> usize {
        self.inside.load(Ordering::Acquire)
    }
}

impl<T> Deref for ZoneGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> Drop for ZoneGuard<'_, T> {
    fn drop(&mut self) {
        self.inside.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<T> Deref for ZoneLock<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for ZoneLock<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
