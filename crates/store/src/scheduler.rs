//! Scheduler capability
//!
//! The injector's merge-and-diff work must run inside the host environment's
//! update cycle so dependent views refresh. That contract is expressed as an
//! injected capability with two operations, never as ambient global state:
//! when a cycle is already active the work runs in place, otherwise it is
//! handed to `run_in_update_cycle`. Either way the work completes before the
//! injecting call returns.

use std::sync::atomic::{AtomicBool, Ordering};

/// Host update-cycle capability consumed by the injector.
pub trait UpdateScheduler: Send + Sync {
    /// True while the host's update cycle is active.
    fn is_in_update_cycle(&self) -> bool;

    /// Run `work` inside an update cycle, synchronously.
    fn run_in_update_cycle(&self, work: &mut dyn FnMut());
}

/// Default scheduler for hosts without a reconciliation pass.
///
/// Runs work immediately, flagging the cycle active for its duration so
/// nested injections take the run-in-place path.
#[derive(Debug, Default)]
pub struct ImmediateScheduler {
    active: AtomicBool,
}

impl ImmediateScheduler {
    /// Create the default scheduler.
    pub fn new() -> Self {
        Self::default()
    }
}

impl UpdateScheduler for ImmediateScheduler {
    fn is_in_update_cycle(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn run_in_update_cycle(&self, work: &mut dyn FnMut()) {
        self.active.store(true, Ordering::Release);
        work();
        self.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_scheduler_flags_cycle_during_work() {
        let scheduler = ImmediateScheduler::new();
        assert!(!scheduler.is_in_update_cycle());

        let mut observed = false;
        scheduler.run_in_update_cycle(&mut || {
            observed = scheduler.is_in_update_cycle();
        });

        assert!(observed);
        assert!(!scheduler.is_in_update_cycle());
    }
}
