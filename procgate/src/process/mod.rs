//! Spawned-process lifecycle.
//!
//! A [`ProcessHandle`] is produced by [`spawn`] (or [`Spawner::spawn`]) and
//! is only returned once its reaper thread is running. The reaper publishes
//! the exit status exactly once; every waiter, blocking or async, observes
//! the same [`ExitStatus`].

mod exit;
mod handle;
mod interrupt;
mod reaper;
mod spawn;
mod status;
mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use handle::ProcessHandle;
pub use interrupt::Interrupt;
pub use spawn::{spawn, SpawnOptions, Spawner};
pub use status::ExitStatus;
pub use stream::{Close, StderrStream, StdinStream, StdoutStream, Stream};
