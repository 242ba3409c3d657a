//! Background reaper: one detached thread per child.

use std::io;
use std::sync::Arc;
use std::thread;

use tracing::debug;

use super::exit::ExitState;
use super::status::ExitStatus;
use crate::gate::Gate;
use crate::native::NativeProcess;

pub(crate) const REAPER_THREAD_NAME: &str = "process reaper";

/// Start the reaper for `pid`.
///
/// The thread opens `gate` before calling `wait(pid)`, then publishes the
/// status into `exit`. Its `JoinHandle` is dropped: the thread is detached and
/// its lifetime is bounded only by the child's.
pub(crate) fn start(
    pid: u32,
    gate: Arc<Gate>,
    exit: Arc<ExitState>,
    native: Arc<dyn NativeProcess>,
) -> io::Result<()> {
    thread::Builder::new()
        .name(REAPER_THREAD_NAME.to_string())
        .spawn(move || {
            gate.open();
            debug!(pid, "Reaper waiting for process");
            let status = ExitStatus::from_raw(native.wait(pid));
            exit.publish(status);
            debug!(pid, %status, "Process reaped");
        })
        .map(drop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::FakeNative;
    use std::time::Duration;

    #[test]
    fn test_reaper_opens_gate_then_publishes() {
        let native = Arc::new(FakeNative::new());
        let gate = Arc::new(Gate::new());
        let exit = Arc::new(ExitState::new());

        start(7, Arc::clone(&gate), Arc::clone(&exit), native.clone()).unwrap();

        gate.wait_for_open();
        assert!(exit.wait_timeout(Duration::from_millis(20)).is_none());

        native.exit(7, 3);
        assert_eq!(exit.wait(), ExitStatus::Code(3));
    }

    #[test]
    fn test_sentinel_publishes_unknown() {
        let native = Arc::new(FakeNative::new());
        let gate = Arc::new(Gate::new());
        let exit = Arc::new(ExitState::new());

        native.exit(8, crate::native::STATUS_UNAVAILABLE);
        start(8, gate, Arc::clone(&exit), native).unwrap();
        assert_eq!(exit.wait(), ExitStatus::Unknown);
    }
}
