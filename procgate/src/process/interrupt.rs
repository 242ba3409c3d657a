//! Caller-owned cancellation for blocking waits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::exit::ExitState;
use crate::sync::lock;

#[derive(Debug, Default)]
struct Inner {
    raised: AtomicBool,
    waiting_on: Mutex<Vec<Weak<ExitState>>>,
}

/// A cancellation token for [`ProcessHandle::wait_for_interruptible`](crate::ProcessHandle::wait_for_interruptible).
///
/// Raising it wakes only the waits that were given this token. It stays
/// raised until [`clear`](Self::clear) is called, so a later interruptible
/// wait on the same token returns immediately.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    inner: Arc<Inner>,
}

impl Interrupt {
    /// Create a lowered interrupt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the interrupt and wake any wait using this token.
    pub fn raise(&self) {
        self.inner.raised.store(true, Ordering::SeqCst);
        let waiting_on = lock(&self.inner.waiting_on).clone();
        for state in waiting_on.iter().filter_map(Weak::upgrade) {
            state.wake();
        }
    }

    /// Whether the interrupt is currently raised.
    pub fn is_raised(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// Lower the interrupt, returning whether it was raised.
    pub fn clear(&self) -> bool {
        self.inner.raised.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn register(&self, state: &Arc<ExitState>) {
        lock(&self.inner.waiting_on).push(Arc::downgrade(state));
    }

    pub(crate) fn unregister(&self, state: &Arc<ExitState>) {
        let target = Arc::as_ptr(state);
        let mut waiting_on = lock(&self.inner.waiting_on);
        if let Some(pos) = waiting_on.iter().position(|w| w.as_ptr() == target) {
            waiting_on.swap_remove(pos);
        }
        waiting_on.retain(|w| w.strong_count() > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ExitStatus;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_raise_and_clear() {
        let interrupt = Interrupt::new();
        assert!(!interrupt.is_raised());
        interrupt.raise();
        assert!(interrupt.is_raised());
        assert!(interrupt.clone().is_raised());
        assert!(interrupt.clear());
        assert!(!interrupt.clear());
    }

    #[test]
    fn test_interrupt_releases_only_its_waiter() {
        let state = Arc::new(ExitState::new());
        let interrupt = Interrupt::new();

        let interrupted = {
            let state = Arc::clone(&state);
            let interrupt = interrupt.clone();
            thread::spawn(move || state.wait_interruptible(&interrupt))
        };
        let bystander = {
            let state = Arc::clone(&state);
            thread::spawn(move || state.wait())
        };

        thread::sleep(Duration::from_millis(20));
        interrupt.raise();
        assert_eq!(interrupted.join().unwrap(), None);
        assert!(!bystander.is_finished());

        state.publish(ExitStatus::Code(0));
        assert_eq!(bystander.join().unwrap(), ExitStatus::Code(0));
    }

    #[test]
    fn test_exit_wins_over_raised_interrupt() {
        let state = Arc::new(ExitState::new());
        state.publish(ExitStatus::Code(2));

        let interrupt = Interrupt::new();
        interrupt.raise();
        assert_eq!(
            state.wait_interruptible(&interrupt),
            Some(ExitStatus::Code(2))
        );
    }

    #[test]
    fn test_registration_is_cleaned_up() {
        let state = Arc::new(ExitState::new());
        let interrupt = Interrupt::new();
        interrupt.raise();
        assert_eq!(state.wait_interruptible(&interrupt), None);
        assert!(lock(&interrupt.inner.waiting_on).is_empty());
    }
}
