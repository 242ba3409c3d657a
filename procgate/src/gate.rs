//! One-shot latch sequencing a spawn attempt before the reaper starts.
//!
//! The constructing thread blocks in [`Gate::wait_for_open`] until either the
//! reaper has started (success) or the spawn attempt recorded its failure and
//! opened the gate itself. A single [`Gate::open`] releases every waiter.

use std::io;
use std::sync::{Arc, Condvar, Mutex};

use crate::sync::lock;

#[derive(Debug, Default)]
struct GateState {
    opened: bool,
    saved_error: Option<Arc<io::Error>>,
}

/// A thread-safe, monotone, one-shot latch with a set-once error slot.
#[derive(Debug, Default)]
pub struct Gate {
    state: Mutex<GateState>,
    opened: Condvar,
}

impl Gate {
    /// Create a closed gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the gate and wake every thread blocked in [`wait_for_open`](Self::wait_for_open).
    ///
    /// Calling it again only re-broadcasts.
    pub fn open(&self) {
        let mut state = lock(&self.state);
        state.opened = true;
        self.opened.notify_all();
    }

    /// Block until the gate has been opened.
    pub fn wait_for_open(&self) {
        let mut state = lock(&self.state);
        // Spurious wakeups land back in the loop.
        while !state.opened {
            state = self
                .opened
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Whether the gate has been opened.
    pub fn is_open(&self) -> bool {
        lock(&self.state).opened
    }

    /// Record a failure discovered during the spawn attempt.
    ///
    /// Only the first error is kept; returns `false` if one was already recorded.
    pub fn record_error(&self, error: io::Error) -> bool {
        let mut state = lock(&self.state);
        if state.saved_error.is_some() {
            return false;
        }
        state.saved_error = Some(Arc::new(error));
        true
    }

    /// The recorded spawn failure, if any.
    pub fn error(&self) -> Option<Arc<io::Error>> {
        lock(&self.state).saved_error.clone()
    }
}
