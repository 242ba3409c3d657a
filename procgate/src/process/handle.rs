//! The caller-visible handle for one spawned child.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::os::fd::OwnedFd;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::exit::ExitState;
use super::interrupt::Interrupt;
use super::status::ExitStatus;
use super::stream::{StderrStream, StdinStream, StdoutStream, Stream};
use crate::error::{Error, Result};
use crate::native::NativeProcess;

/// A spawned child process: its pid, its stdio streams and its eventual exit status.
///
/// The exit status is published by a background reaper thread. All accessors
/// take `&self`, so a handle can be shared between threads (for example in an
/// `Arc`) and waited on from several of them at once.
///
/// Dropping the handle closes the parent's ends of the streams but neither
/// kills nor waits for the child; the reaper keeps running until it exits.
pub struct ProcessHandle {
    pid: u32,
    program: String,
    exit: Arc<ExitState>,
    native: Arc<dyn NativeProcess>,
    stdin: StdinStream,
    stdout: StdoutStream,
    stderr: StderrStream,
}

impl ProcessHandle {
    pub(crate) fn new(
        pid: u32,
        program: String,
        exit: Arc<ExitState>,
        native: Arc<dyn NativeProcess>,
        stdio: [OwnedFd; 3],
    ) -> Self {
        let [stdin, stdout, stderr] = stdio;
        Self {
            pid,
            program,
            exit,
            native,
            stdin: Stream::new("stdin", BufWriter::new(File::from(stdin))),
            stdout: Stream::new("stdout", BufReader::new(File::from(stdout))),
            stderr: Stream::new("stderr", File::from(stderr)),
        }
    }

    /// OS process identifier.
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// The program the child was started with, `argv[0]`.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Writable end of the child's stdin.
    pub const fn stdin(&self) -> &StdinStream {
        &self.stdin
    }

    /// Readable end of the child's stdout.
    pub const fn stdout(&self) -> &StdoutStream {
        &self.stdout
    }

    /// Readable end of the child's stderr.
    pub const fn stderr(&self) -> &StderrStream {
        &self.stderr
    }

    /// Whether the reaper has observed the child's termination.
    pub fn has_exited(&self) -> bool {
        self.exit.get().is_some()
    }

    /// The exit status, without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if the process has not exited yet.
    pub fn exit_value(&self) -> Result<ExitStatus> {
        self.exit
            .get()
            .ok_or_else(|| Error::IllegalState("Process has not yet exited.".to_string()))
    }

    /// Block until the process exits and return its status.
    pub fn wait_for(&self) -> ExitStatus {
        self.exit.wait()
    }

    /// Block until the process exits or `interrupt` is raised.
    ///
    /// Other waiters and the reaper are unaffected by the interrupt, which
    /// stays raised after this returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interrupted`] if the interrupt was observed before exit.
    pub fn wait_for_interruptible(&self, interrupt: &Interrupt) -> Result<ExitStatus> {
        self.exit
            .wait_interruptible(interrupt)
            .ok_or(Error::Interrupted { pid: self.pid })
    }

    /// Block for at most `timeout`; `None` if the process is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ExitStatus> {
        self.exit.wait_timeout(timeout)
    }

    /// Wait for exit without blocking the async runtime.
    ///
    /// Dropping the future cancels only this wait.
    pub async fn wait(&self) -> ExitStatus {
        let mut rx = self.exit.subscribe();
        let seen = rx.wait_for(Option::is_some).await.map(|status| *status);
        match seen {
            Ok(Some(status)) => status,
            // The sender lives in `self.exit`, so it cannot be dropped while we borrow it.
            _ => self.wait_for(),
        }
    }

    /// Forcibly terminate the process and close its streams.
    ///
    /// The kill is skipped if the reaper has already published an exit status,
    /// so a reaped (and possibly reused) pid is never signalled. Stream close
    /// failures are logged and suppressed. Does not wait for reads or writes
    /// in progress on other threads; see [`Stream::close`].
    pub fn destroy(&self) {
        {
            let slot = self.exit.lock();
            if slot.is_none() {
                debug!(pid = self.pid, program = %self.program, "Killing process");
                self.native.kill(self.pid);
            }
        }
        self.close_streams();
    }

    fn close_streams(&self) {
        let results = [
            (self.stdin.name(), self.stdin.close()),
            (self.stdout.name(), self.stdout.close()),
            (self.stderr.name(), self.stderr.close()),
        ];
        for (name, result) in results {
            if let Err(e) = result {
                warn!(pid = self.pid, stream = name, error = %e, "Failed to close stream");
            }
        }
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit.get() {
            Some(status) => write!(f, "[ProcessHandle pid={} exitcode={status}]", self.pid),
            None => write!(f, "[ProcessHandle pid={} exited=false]", self.pid),
        }
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("program", &self.program)
            .field("exit_status", &self.exit.get())
            .finish_non_exhaustive()
    }
}
