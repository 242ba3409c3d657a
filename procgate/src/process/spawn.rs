//! Spawn orchestration.
//!
//! Validates the request, calls the native layer, wraps the child's
//! descriptors in streams and starts the reaper. The constructing thread only
//! returns once the [`Gate`] has opened:
//! - by the reaper, once it is running and about to wait on the pid, or
//! - by the failure path, after recording the spawn error.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::exit::ExitState;
use super::handle::ProcessHandle;
use super::reaper;
use crate::error::{Error, Result};
use crate::gate::Gate;
use crate::native::{NativeProcess, SpawnRequest, SpawnedChild};
use crate::runtime::{self, Runtime};

/// Configuration for spawning a process.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    /// Command vector; the first element is the program.
    pub argv: Vec<String>,

    /// Working directory. Defaults to the current directory.
    pub working_dir: Option<PathBuf>,

    /// `KEY=VALUE` entries applied over the base environment.
    pub env: Vec<String>,

    /// Variables removed from the inherited environment.
    pub env_remove: Vec<String>,

    /// Start from an empty environment instead of inheriting.
    pub env_clear: bool,
}

impl SpawnOptions {
    /// Create options for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            argv: vec![program.into()],
            ..Self::default()
        }
    }

    /// Create options from a full command vector.
    pub fn from_argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.argv.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .push(format!("{}={}", key.as_ref(), value.as_ref()));
        self
    }

    /// Add raw `KEY=VALUE` environment entries.
    pub fn env_entries<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env.extend(entries.into_iter().map(Into::into));
        self
    }

    /// Remove an environment variable.
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    /// Clear the environment before setting variables.
    pub fn env_clear(mut self) -> Self {
        self.env_clear = true;
        self
    }

    /// The program name, if the command vector is non-empty.
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    /// Check the command vector and environment entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let Some(program) = self.program() else {
            return Err(Error::invalid_argument("command vector is empty"));
        };
        if program.is_empty() {
            return Err(Error::invalid_argument("program name is empty"));
        }
        // The launcher would read `NAME=VALUE` in program position as an assignment.
        if program.contains('=') {
            return Err(Error::invalid_argument(format!(
                "program name `{program}` contains `=`"
            )));
        }
        if let Some(index) = self.argv.iter().position(|arg| arg.contains('\0')) {
            return Err(Error::invalid_argument(format!(
                "argument {index} contains a NUL byte"
            )));
        }
        for entry in &self.env {
            match entry.split_once('=') {
                Some((key, _)) if !key.is_empty() && !entry.contains('\0') => {}
                _ => {
                    return Err(Error::invalid_argument(format!(
                        "environment entry `{entry}` is not of the form KEY=VALUE"
                    )))
                }
            }
        }
        Ok(())
    }

    /// Validate and resolve into the request handed to the native layer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if validation fails or the working
    /// directory cannot be made absolute.
    pub fn to_request(&self, launcher: &Path) -> Result<SpawnRequest> {
        self.validate()?;
        Ok(SpawnRequest {
            argv: self.argv.clone(),
            env: self.resolve_env(),
            cwd: self.resolve_cwd()?,
            launcher: launcher.to_path_buf(),
        })
    }

    fn resolve_cwd(&self) -> Result<PathBuf> {
        match self.working_dir {
            Some(ref dir) => std::path::absolute(dir).map_err(|e| {
                Error::invalid_argument(format!(
                    "working directory `{}` cannot be resolved: {e}",
                    dir.display()
                ))
            }),
            None => std::env::current_dir().map_err(|e| {
                Error::invalid_argument(format!("current directory cannot be resolved: {e}"))
            }),
        }
    }

    /// `None` inherits the parent's environment unchanged.
    fn resolve_env(&self) -> Option<Vec<String>> {
        if !self.env_clear && self.env.is_empty() && self.env_remove.is_empty() {
            return None;
        }

        let mut vars: BTreeMap<String, String> = if self.env_clear {
            BTreeMap::new()
        } else {
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect()
        };
        for key in &self.env_remove {
            vars.remove(key);
        }
        for entry in &self.env {
            if let Some((key, value)) = entry.split_once('=') {
                vars.insert(key.to_string(), value.to_string());
            }
        }

        Some(vars.into_iter().map(|(k, v)| format!("{k}={v}")).collect())
    }
}

/// Spawns processes through a specific native layer and launcher.
#[derive(Debug, Clone)]
pub struct Spawner {
    native: Arc<dyn NativeProcess>,
    launcher: PathBuf,
}

impl Spawner {
    /// Create a spawner over `native` that starts children through `launcher`.
    pub fn new(native: Arc<dyn NativeProcess>, launcher: impl Into<PathBuf>) -> Self {
        Self {
            native,
            launcher: launcher.into(),
        }
    }

    /// A spawner using the process-wide runtime's native layer and launcher.
    pub fn from_runtime(runtime: &Runtime) -> Self {
        Self::new(runtime.native(), runtime.launcher())
    }

    /// Spawn a child and return its handle once the reaper is running.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `options` are malformed; nothing is spawned.
    /// - [`Error::Spawn`] if the native layer fails or the reaper cannot start.
    pub fn spawn(&self, options: &SpawnOptions) -> Result<ProcessHandle> {
        let request = options.to_request(&self.launcher)?;
        let program = request.program().to_string();
        let gate = Arc::new(Gate::new());

        let handle = match self.native.spawn(&request) {
            Ok(child) => self.start(child, &program, &gate),
            Err(e) => {
                gate.record_error(e);
                gate.open();
                None
            }
        };

        gate.wait_for_open();

        match (gate.error(), handle) {
            (None, Some(handle)) => {
                debug!(pid = handle.pid(), program = %program, "Spawned process");
                Ok(handle)
            }
            (Some(source), _) => Err(Error::spawn(program, source)),
            (None, None) => Err(Error::spawn(
                program,
                Arc::new(io::Error::other("spawn produced no process")),
            )),
        }
    }

    /// Wrap the child's descriptors and start its reaper.
    ///
    /// On failure the child is killed and reaped here, the error is recorded in
    /// `gate`, and the gate is opened.
    fn start(&self, child: SpawnedChild, program: &str, gate: &Arc<Gate>) -> Option<ProcessHandle> {
        let SpawnedChild {
            pid,
            stdin,
            stdout,
            stderr,
        } = child;
        let exit = Arc::new(ExitState::new());
        let handle = ProcessHandle::new(
            pid,
            program.to_string(),
            Arc::clone(&exit),
            Arc::clone(&self.native),
            [stdin, stdout, stderr],
        );

        match reaper::start(pid, Arc::clone(gate), exit, Arc::clone(&self.native)) {
            Ok(()) => Some(handle),
            Err(e) => {
                warn!(pid, error = %e, "Failed to start reaper; killing process");
                self.native.kill(pid);
                self.native.wait(pid);
                gate.record_error(e);
                gate.open();
                None
            }
        }
    }
}

/// Spawn a process using the process-wide runtime.
///
/// # Example
///
/// ```rust,no_run
/// use procgate::{spawn, SpawnOptions};
///
/// let child = spawn(&SpawnOptions::new("ls").arg("-la").working_dir("/tmp"))?;
/// println!("exit status: {}", child.wait_for());
/// # Ok::<(), procgate::Error>(())
/// ```
///
/// # Errors
///
/// - [`Error::InvalidArgument`] if `options` are malformed.
/// - [`Error::Configuration`] if the launcher or native layer is unavailable.
/// - [`Error::Spawn`] if the native spawn fails.
pub fn spawn(options: &SpawnOptions) -> Result<ProcessHandle> {
    options.validate()?;
    let runtime = runtime::global()?;
    Spawner::from_runtime(runtime).spawn(options)
}
