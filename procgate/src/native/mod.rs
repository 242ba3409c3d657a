//! The native process layer.
//!
//! Process creation, waiting and killing are delegated to a [`NativeProcess`]
//! implementation. The lifecycle code never touches the OS directly, which
//! keeps it testable with a scripted collaborator.

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::SystemProcess;

use std::fmt;
use std::io;
use std::os::fd::OwnedFd;
use std::path::PathBuf;

/// Value returned by [`NativeProcess::wait`] when the exit status could not be determined.
pub const STATUS_UNAVAILABLE: i32 = -500;

/// Everything the native layer needs to start one child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Command vector; `argv[0]` is the program.
    pub argv: Vec<String>,
    /// Replacement environment as `KEY=VALUE` entries, or `None` to inherit.
    pub env: Option<Vec<String>>,
    /// Absolute working directory.
    pub cwd: PathBuf,
    /// Absolute path of the launcher helper that execs `argv`.
    pub launcher: PathBuf,
}

impl SpawnRequest {
    /// The program name, `argv[0]`.
    pub fn program(&self) -> &str {
        self.argv.first().map_or("", String::as_str)
    }
}

/// A freshly created child: its pid and the parent ends of its stdio pipes.
pub struct SpawnedChild {
    pub pid: u32,
    pub stdin: OwnedFd,
    pub stdout: OwnedFd,
    pub stderr: OwnedFd,
}

impl fmt::Debug for SpawnedChild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnedChild")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// The OS-facing half of process management.
pub trait NativeProcess: Send + Sync + fmt::Debug {
    /// Create the child described by `request`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the process or its descriptors could not be created.
    fn spawn(&self, request: &SpawnRequest) -> io::Result<SpawnedChild>;

    /// Block until `pid` terminates and return its exit code.
    ///
    /// Returns [`STATUS_UNAVAILABLE`] when the status cannot be determined.
    fn wait(&self, pid: u32) -> i32;

    /// Forcibly terminate `pid`. Failures are not reported.
    fn kill(&self, pid: u32);
}
