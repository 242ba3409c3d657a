//! Shared exit slot written by the reaper and read by waiters.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use super::interrupt::Interrupt;
use super::status::ExitStatus;
use crate::sync::lock;

/// `None` until the reaper publishes; `Some` forever after.
///
/// The exited flag and the exit code live in one `Option` under one lock, so
/// no reader can observe one without the other.
#[derive(Debug)]
pub(crate) struct ExitState {
    slot: Mutex<Option<ExitStatus>>,
    exited: Condvar,
    watch: watch::Sender<Option<ExitStatus>>,
}

impl ExitState {
    pub(crate) fn new() -> Self {
        let (watch, _) = watch::channel(None);
        Self {
            slot: Mutex::new(None),
            exited: Condvar::new(),
            watch,
        }
    }

    /// Record the exit status and release every waiter.
    ///
    /// Only the first publication takes effect.
    pub(crate) fn publish(&self, status: ExitStatus) -> bool {
        let mut slot = lock(&self.slot);
        if slot.is_some() {
            return false;
        }
        *slot = Some(status);
        self.watch.send_replace(Some(status));
        self.exited.notify_all();
        true
    }

    /// Lock the slot. Held by `destroy` across the kill decision.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Option<ExitStatus>> {
        lock(&self.slot)
    }

    pub(crate) fn get(&self) -> Option<ExitStatus> {
        *self.lock()
    }

    pub(crate) fn wait(&self) -> ExitStatus {
        let mut slot = self.lock();
        loop {
            if let Some(status) = *slot {
                return status;
            }
            slot = self
                .exited
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn wait_timeout(&self, timeout: Duration) -> Option<ExitStatus> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if let Some(status) = *slot {
                return Some(status);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            slot = self
                .exited
                .wait_timeout(slot, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Wait until exit or until `interrupt` is raised, whichever is observed first.
    ///
    /// Returns `None` only if the process had not exited when the interrupt was seen.
    pub(crate) fn wait_interruptible(self: &Arc<Self>, interrupt: &Interrupt) -> Option<ExitStatus> {
        interrupt.register(self);
        let outcome = {
            let mut slot = self.lock();
            loop {
                if let Some(status) = *slot {
                    break Some(status);
                }
                if interrupt.is_raised() {
                    break None;
                }
                slot = self
                    .exited
                    .wait(slot)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };
        interrupt.unregister(self);
        outcome
    }

    /// Wake every blocked waiter so it can re-check its interrupt.
    pub(crate) fn wake(&self) {
        let _slot = self.lock();
        self.exited.notify_all();
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<ExitStatus>> {
        self.watch.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_publish_once() {
        let state = ExitState::new();
        assert!(state.get().is_none());
        assert!(state.publish(ExitStatus::Code(3)));
        assert!(!state.publish(ExitStatus::Code(4)));
        assert_eq!(state.get(), Some(ExitStatus::Code(3)));
        assert_eq!(state.wait(), ExitStatus::Code(3));
    }

    #[test]
    fn test_wait_timeout_expires() {
        let state = ExitState::new();
        assert!(state.wait_timeout(Duration::from_millis(20)).is_none());
        state.publish(ExitStatus::Code(0));
        assert_eq!(
            state.wait_timeout(Duration::from_millis(20)),
            Some(ExitStatus::Code(0))
        );
    }

    #[test]
    fn test_all_waiters_see_same_status() {
        let state = Arc::new(ExitState::new());
        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                thread::spawn(move || state.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        state.publish(ExitStatus::Code(7));

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), ExitStatus::Code(7));
        }
    }

    #[tokio::test]
    async fn test_subscribers_see_publication() {
        let state = ExitState::new();
        let mut rx = state.subscribe();
        state.publish(ExitStatus::Code(5));
        let seen = *rx.wait_for(Option::is_some).await.unwrap();
        assert_eq!(seen, Some(ExitStatus::Code(5)));
    }
}
