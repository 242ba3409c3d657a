//! Procgate - spawn child processes and reap them in the background.
//!
//! A spawned child is represented by a [`ProcessHandle`]. The handle owns the
//! parent ends of the child's stdio pipes and exposes its exit status through
//! blocking ([`ProcessHandle::wait_for`]), non-blocking
//! ([`ProcessHandle::exit_value`]) and async ([`ProcessHandle::wait`])
//! accessors.
//!
//! Lifecycle:
//! - the native layer creates the child and returns its pid and descriptors
//! - a detached reaper thread opens a [`Gate`], then blocks waiting on the pid
//! - the spawning thread returns the handle only after the gate has opened
//! - the reaper publishes the exit status once, under the handle's lock

mod error;
mod gate;
pub mod native;
mod process;
pub mod runtime;
mod sync;

pub use error::{Error, Result};
pub use gate::Gate;
pub use process::{
    spawn, Close, ExitStatus, Interrupt, ProcessHandle, SpawnOptions, Spawner, StderrStream,
    StdinStream, StdoutStream, Stream,
};
