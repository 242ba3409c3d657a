//! Scripted native layer for lifecycle tests.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use crate::native::{NativeProcess, SpawnRequest, SpawnedChild, STATUS_UNAVAILABLE};
use crate::sync::lock;

/// Exit code the fake reports for a killed child.
pub const KILLED: i32 = 137;

#[derive(Debug)]
pub struct FakeNative {
    fail_spawn: Option<io::ErrorKind>,
    next_pid: AtomicU32,
    spawns: AtomicUsize,
    kills: AtomicUsize,
    exits: Mutex<HashMap<u32, i32>>,
    exited: Condvar,
}

impl FakeNative {
    pub fn new() -> Self {
        Self {
            fail_spawn: None,
            next_pid: AtomicU32::new(1000),
            spawns: AtomicUsize::new(0),
            kills: AtomicUsize::new(0),
            exits: Mutex::new(HashMap::new()),
            exited: Condvar::new(),
        }
    }

    pub fn failing(kind: io::ErrorKind) -> Self {
        Self {
            fail_spawn: Some(kind),
            ..Self::new()
        }
    }

    pub fn request(argv: &[&str]) -> SpawnRequest {
        SpawnRequest {
            argv: argv.iter().map(ToString::to_string).collect(),
            env: None,
            cwd: PathBuf::from("/"),
            launcher: PathBuf::from("/fake/launcher"),
        }
    }

    /// Let `pid` terminate with `code`.
    pub fn exit(&self, pid: u32, code: i32) {
        lock(&self.exits).entry(pid).or_insert(code);
        self.exited.notify_all();
    }

    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

impl NativeProcess for FakeNative {
    fn spawn(&self, _request: &SpawnRequest) -> io::Result<SpawnedChild> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.fail_spawn {
            return Err(io::Error::new(kind, "scripted spawn failure"));
        }
        Ok(SpawnedChild {
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            stdin: tempfile::tempfile()?.into(),
            stdout: tempfile::tempfile()?.into(),
            stderr: tempfile::tempfile()?.into(),
        })
    }

    fn wait(&self, pid: u32) -> i32 {
        let mut exits = lock(&self.exits);
        loop {
            if let Some(code) = exits.remove(&pid) {
                // Reaped; a second wait would find nothing.
                exits.insert(pid, STATUS_UNAVAILABLE);
                return code;
            }
            exits = self
                .exited
                .wait(exits)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    fn kill(&self, pid: u32) {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.exit(pid, KILLED);
    }
}
