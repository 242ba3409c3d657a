//! Process-wide initialization: launcher discovery and native layer status.
//!
//! Resolved once, on first use, and immutable afterwards. A failed
//! initialization is cached too, so every later spawn reports the same
//! configuration error instead of probing the filesystem again.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::native::NativeProcess;

/// Environment variable naming the launcher binary.
pub const LAUNCHER_ENV: &str = "PROCGATE_LAUNCHER";

/// Launcher used when none is configured.
pub const DEFAULT_LAUNCHER: &str = "env";

/// Search path used when `PATH` is unset.
pub const DEFAULT_SEARCH_PATH: &str = "/usr/bin:/bin";

/// Where to look for the launcher helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    /// Launcher name or path.
    pub launcher: String,
    /// Colon-separated directories to search when `launcher` is not a path that exists.
    pub search_path: Option<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            launcher: DEFAULT_LAUNCHER.to_string(),
            search_path: None,
        }
    }
}

impl LauncherConfig {
    /// Read the configuration from `PROCGATE_LAUNCHER` and `PATH`.
    pub fn from_env() -> Self {
        Self {
            launcher: std::env::var(LAUNCHER_ENV)
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_LAUNCHER.to_string()),
            search_path: std::env::var("PATH").ok(),
        }
    }

    /// Set the launcher name or path.
    pub fn launcher(mut self, launcher: impl Into<String>) -> Self {
        self.launcher = launcher.into();
        self
    }

    /// Set the search path.
    pub fn search_path(mut self, path: impl Into<String>) -> Self {
        self.search_path = Some(path.into());
        self
    }
}

/// Locate `name` as given, or in the first `search_path` directory containing it.
///
/// The returned path is absolute.
pub fn find_launcher(name: &str, search_path: Option<&str>) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    let direct = Path::new(name);
    if direct.exists() {
        return std::path::absolute(direct).ok();
    }

    search_path
        .unwrap_or(DEFAULT_SEARCH_PATH)
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(name))
        .find(|candidate| candidate.exists())
        .and_then(|candidate| std::path::absolute(candidate).ok())
}

/// The initialized native layer.
#[derive(Debug, Clone)]
pub struct Runtime {
    launcher: PathBuf,
    native: Arc<dyn NativeProcess>,
}

impl Runtime {
    /// Resolve the launcher and load the platform's native layer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the launcher cannot be found or the
    /// platform has no native process layer.
    pub fn load(config: &LauncherConfig) -> Result<Self> {
        let native = system_native()?;
        let launcher = find_launcher(&config.launcher, config.search_path.as_deref())
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "Couldn't find launcher program. Tried: {}",
                    config.launcher
                ))
            })?;

        debug!(launcher = %launcher.display(), "Native process layer ready");
        Ok(Self { launcher, native })
    }

    /// Absolute path of the launcher helper.
    pub fn launcher(&self) -> &Path {
        &self.launcher
    }

    /// The native collaborator.
    pub fn native(&self) -> Arc<dyn NativeProcess> {
        Arc::clone(&self.native)
    }
}

#[cfg(unix)]
fn system_native() -> Result<Arc<dyn NativeProcess>> {
    Ok(Arc::new(crate::native::SystemProcess::new()))
}

#[cfg(not(unix))]
fn system_native() -> Result<Arc<dyn NativeProcess>> {
    Err(Error::Configuration(
        "no native process layer is available on this platform".to_string(),
    ))
}

static RUNTIME: OnceLock<Result<Runtime>> = OnceLock::new();

/// Initialize the process-wide runtime with `config`.
///
/// Only the first call (or the first [`global`] call) has any effect; later
/// calls return the result recorded then. Call this before anything spawns,
/// since [`spawn`](crate::spawn) initializes from the environment otherwise.
///
/// # Errors
///
/// Returns the cached [`Error::Configuration`] if initialization failed.
pub fn initialize(config: &LauncherConfig) -> Result<&'static Runtime> {
    let mut loaded_here = false;
    let runtime = RUNTIME.get_or_init(|| {
        loaded_here = true;
        let loaded = Runtime::load(config);
        if let Err(ref e) = loaded {
            warn!(error = %e, "Native process layer unavailable");
        }
        loaded
    });
    if !loaded_here {
        debug!(
            launcher = %config.launcher,
            "Runtime already initialized; ignoring launcher configuration"
        );
    }
    runtime.as_ref().map_err(Error::clone)
}

/// The process-wide runtime, initialized from the environment on first use.
///
/// # Errors
///
/// Returns the cached [`Error::Configuration`] if initialization failed.
pub fn global() -> Result<&'static Runtime> {
    if let Some(runtime) = RUNTIME.get() {
        return runtime.as_ref().map_err(Error::clone);
    }
    initialize(&LauncherConfig::from_env())
}

/// Snapshot of the runtime's initialization outcome.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub native_loaded: bool,
    pub launcher: Option<PathBuf>,
    pub load_error: Option<String>,
}

/// Report whether the native layer loaded, initializing it if needed.
pub fn status() -> RuntimeStatus {
    match global() {
        Ok(runtime) => RuntimeStatus {
            native_loaded: true,
            launcher: Some(runtime.launcher.clone()),
            load_error: None,
        },
        Err(e) => RuntimeStatus {
            native_loaded: false,
            launcher: None,
            load_error: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_find_launcher_in_search_path() {
        let empty = tempdir().unwrap();
        let bin = tempdir().unwrap();
        File::create(bin.path().join("my-launcher")).unwrap();

        let search = format!(
            "{}::{}",
            empty.path().display(),
            bin.path().display()
        );
        let found = find_launcher("my-launcher", Some(&search)).unwrap();
        assert_eq!(found, bin.path().join("my-launcher"));
        assert!(found.is_absolute());
    }

    #[test]
    fn test_find_launcher_direct_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runner");
        File::create(&path).unwrap();

        let found = find_launcher(path.to_str().unwrap(), Some("")).unwrap();
        assert_eq!(found, path);
    }

    #[test]
    fn test_find_launcher_missing() {
        let dir = tempdir().unwrap();
        let search = dir.path().display().to_string();
        assert!(find_launcher("procgate-no-such-launcher", Some(&search)).is_none());
        assert!(find_launcher("", None).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_load_reports_missing_launcher() {
        let dir = tempdir().unwrap();
        let config = LauncherConfig::default()
            .launcher("procgate-no-such-launcher")
            .search_path(dir.path().display().to_string());

        let err = Runtime::load(&config).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("procgate-no-such-launcher"));
    }

    #[cfg(unix)]
    #[test]
    fn test_load_default_launcher() {
        let config = LauncherConfig::default().search_path(DEFAULT_SEARCH_PATH);
        let runtime = Runtime::load(&config).unwrap();
        assert!(runtime.launcher().ends_with("env"));
    }

    #[cfg(unix)]
    #[test]
    fn test_initialize_after_global_keeps_first_result() {
        let first = global().map(|r| r.launcher().to_path_buf()).ok();
        let config = LauncherConfig::default()
            .launcher("procgate-no-such-launcher")
            .search_path("");
        let again = initialize(&config).map(|r| r.launcher().to_path_buf()).ok();
        assert_eq!(first, again);
    }

    #[cfg(unix)]
    #[test]
    fn test_global_status_is_stable() {
        let first = status();
        let second = status();
        assert_eq!(first.native_loaded, second.native_loaded);
        assert_eq!(first.launcher, second.launcher);
    }
}
