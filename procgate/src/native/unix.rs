//! Unix native layer built on `std::process::Command` and `nix`.

use std::io;
use std::process::{Command, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, warn};

use super::{NativeProcess, SpawnRequest, SpawnedChild, STATUS_UNAVAILABLE};

/// Spawns children through the launcher and reaps them with `waitpid`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcess;

impl SystemProcess {
    pub const fn new() -> Self {
        Self
    }
}

impl NativeProcess for SystemProcess {
    fn spawn(&self, request: &SpawnRequest) -> io::Result<SpawnedChild> {
        let mut cmd = Command::new(&request.launcher);
        cmd.arg("--").args(&request.argv);
        cmd.current_dir(&request.cwd);

        if let Some(ref env) = request.env {
            cmd.env_clear();
            for entry in env {
                if let Some((key, value)) = entry.split_once('=') {
                    cmd.env(key, value);
                }
            }
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let pid = child.id();

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // The `Child` is dropped without waiting; `wait` reaps by pid.
        drop(child);

        match (stdin, stdout, stderr) {
            (Some(stdin), Some(stdout), Some(stderr)) => Ok(SpawnedChild {
                pid,
                stdin: stdin.into(),
                stdout: stdout.into(),
                stderr: stderr.into(),
            }),
            _ => {
                self.kill(pid);
                self.wait(pid);
                Err(io::Error::other("child stdio pipes were not created"))
            }
        }
    }

    fn wait(&self, pid: u32) -> i32 {
        let Ok(raw) = i32::try_from(pid) else {
            return STATUS_UNAVAILABLE;
        };
        let pid = Pid::from_raw(raw);

        loop {
            match waitpid(pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return code,
                Ok(WaitStatus::Signaled(_, signal, _)) => return 128 + signal as i32,
                Ok(_) | Err(Errno::EINTR) => {}
                Err(e) => {
                    debug!(pid = raw, error = %e, "waitpid failed; exit status unavailable");
                    return STATUS_UNAVAILABLE;
                }
            }
        }
    }

    fn kill(&self, pid: u32) {
        let Ok(raw) = i32::try_from(pid) else {
            return;
        };
        if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGKILL) {
            warn!(pid, error = %e, "Failed to kill process");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Read;
    use std::path::PathBuf;

    fn request(argv: &[&str]) -> SpawnRequest {
        SpawnRequest {
            argv: argv.iter().map(ToString::to_string).collect(),
            env: None,
            cwd: std::env::current_dir().unwrap(),
            launcher: crate::runtime::find_launcher("env", Some("/usr/bin:/bin")).unwrap(),
        }
    }

    #[test]
    fn test_exit_codes() {
        let native = SystemProcess::new();

        let child = native.spawn(&request(&["true"])).unwrap();
        assert_eq!(native.wait(child.pid), 0);

        let child = native.spawn(&request(&["sh", "-c", "exit 42"])).unwrap();
        assert_eq!(native.wait(child.pid), 42);
    }

    #[test]
    fn test_kill_reports_signal_code() {
        let native = SystemProcess::new();
        let child = native.spawn(&request(&["sleep", "10"])).unwrap();
        native.kill(child.pid);
        assert_eq!(native.wait(child.pid), 128 + Signal::SIGKILL as i32);
    }

    #[test]
    fn test_second_wait_is_unavailable() {
        let native = SystemProcess::new();
        let child = native.spawn(&request(&["true"])).unwrap();
        assert_eq!(native.wait(child.pid), 0);
        assert_eq!(native.wait(child.pid), STATUS_UNAVAILABLE);
    }

    #[test]
    fn test_env_replaces_inherited_environment() {
        let native = SystemProcess::new();
        let mut req = request(&["sh", "-c", "echo \"$ONLY_VAR:$HOME\""]);
        req.env = Some(vec!["ONLY_VAR=set".to_string()]);

        let child = native.spawn(&req).unwrap();
        let mut out = String::new();
        File::from(child.stdout).read_to_string(&mut out).unwrap();
        assert_eq!(native.wait(child.pid), 0);
        assert_eq!(out.trim(), "set:");
    }

    #[test]
    fn test_missing_cwd_fails_to_spawn() {
        let native = SystemProcess::new();
        let mut req = request(&["true"]);
        req.cwd = PathBuf::from("/nonexistent/procgate/dir");
        assert!(native.spawn(&req).is_err());
    }
}
