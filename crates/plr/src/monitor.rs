//! Progress reporting and cooperative cancellation.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// The construction phase reporting a unit of work.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Phase {
    /// One nonterminal's prediction set was closed.
    Predictions,
    /// One LR(0) state was expanded.
    LR0,
    /// A batch of cognates had their successors computed.
    Cognates,
    /// One row of the action table was built.
    Tables,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("the construction has been cancelled")]
pub struct Cancelled;

/// Receives progress notifications from the table construction.
///
/// Returning `Err(Cancelled)` aborts the construction at the next loop boundary.
pub trait Monitor {
    fn work_done(&mut self, phase: Phase) -> Result<(), Cancelled>;
}

impl<M: ?Sized + Monitor> Monitor for &mut M {
    fn work_done(&mut self, phase: Phase) -> Result<(), Cancelled> {
        (**self).work_done(phase)
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct NoopMonitor;

impl Monitor for NoopMonitor {
    fn work_done(&mut self, _: Phase) -> Result<(), Cancelled> {
        Ok(())
    }
}

/// A cancellation flag shareable between threads.
#[derive(Debug, Default, Clone)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl Monitor for CancelFlag {
    fn work_done(&mut self, _: Phase) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Cancels once more than `limit` units of work have been reported.
#[derive(Debug, Clone)]
pub struct WorkLimit {
    limit: usize,
    done: usize,
}

impl WorkLimit {
    pub const fn new(limit: usize) -> Self {
        Self { limit, done: 0 }
    }

    pub fn done(&self) -> usize {
        self.done
    }
}

impl Monitor for WorkLimit {
    fn work_done(&mut self, _: Phase) -> Result<(), Cancelled> {
        self.done += 1;
        if self.done > self.limit {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
