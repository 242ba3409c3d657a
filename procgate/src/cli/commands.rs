//! CLI command execution.

use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use procgate::{runtime, ExitStatus, ProcessHandle, SpawnOptions};

use super::args::{Cli, Commands, RunArgs};

/// How long to keep forwarding output after a timed-out child is killed.
const FORWARD_GRACE: Duration = Duration::from_millis(500);

/// Summary printed by `run --json`.
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    pid: u32,
    program: &'a str,
    status: ExitStatus,
    timed_out: bool,
}

// === Command Execution ===

pub async fn execute(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Launcher { json } => {
            show_launcher(json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn spawn_options(args: &RunArgs) -> SpawnOptions {
    let mut options = SpawnOptions::from_argv(args.command.iter().cloned())
        .env_entries(args.env.iter().cloned());
    if args.clear_env {
        options = options.env_clear();
    }
    if let Some(ref dir) = args.cwd {
        options = options.working_dir(dir);
    }
    options
}

/// How a supervised child ended.
struct Outcome {
    handle: Arc<ProcessHandle>,
    status: ExitStatus,
    timed_out: bool,
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let Outcome {
        handle,
        status,
        timed_out,
    } = supervise(&args).await?;

    if args.json {
        let report = RunReport {
            pid: handle.pid(),
            program: handle.program(),
            status,
            timed_out,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if timed_out {
        eprintln!("procgate: {} timed out and was killed", handle.program());
    }

    Ok(exit_code(status))
}

/// Spawn the child, forward its stdio and wait for it, killing it on timeout.
async fn supervise(args: &RunArgs) -> Result<Outcome> {
    let timeout = match args.timeout {
        Some(secs) if !(secs.is_finite() && secs > 0.0) => {
            bail!("--timeout must be a positive number of seconds, got {secs}")
        }
        Some(secs) => Some(Duration::from_secs_f64(secs)),
        None => None,
    };

    let options = spawn_options(args);
    let handle = Arc::new(
        procgate::spawn(&options)
            .with_context(|| format!("Failed to run {}", args.command.join(" ")))?,
    );

    forward_stdin(Arc::clone(&handle));
    let stdout = spawn_forwarder("stdout forwarder", {
        let handle = Arc::clone(&handle);
        move || forward(handle.stdout(), &mut io::stdout())
    })?;
    let stderr = spawn_forwarder("stderr forwarder", {
        let handle = Arc::clone(&handle);
        move || forward(handle.stderr(), &mut io::stderr())
    })?;

    let mut timed_out = false;
    let status = match timeout {
        Some(limit) => {
            if let Ok(status) = tokio::time::timeout(limit, handle.wait()).await {
                status
            } else {
                warn!(pid = handle.pid(), "Timed out; killing process");
                timed_out = true;
                let victim = Arc::clone(&handle);
                tokio::task::spawn_blocking(move || victim.destroy())
                    .await
                    .context("Failed to destroy process")?;
                handle.wait().await
            }
        }
        None => handle.wait().await,
    };

    for (name, done) in [("stdout", stdout), ("stderr", stderr)] {
        // After a kill, descendants may still hold the pipe open.
        let finished = if timed_out {
            tokio::time::timeout(FORWARD_GRACE, done).await.ok()
        } else {
            Some(done.await)
        };
        match finished {
            Some(Ok(Ok(_))) => {}
            Some(Ok(Err(e))) => debug!(stream = name, error = %e, "Forwarding stopped"),
            Some(Err(_)) => bail!("{name} forwarder panicked"),
            None => debug!(stream = name, "Output still open after kill; not waiting"),
        }
    }

    Ok(Outcome {
        handle,
        status,
        timed_out,
    })
}

/// Copy our stdin into the child on a detached thread, then close the pipe.
///
/// Detached because reading our own stdin may block past the child's exit.
fn forward_stdin(handle: Arc<ProcessHandle>) {
    let spawned = thread::Builder::new()
        .name("stdin forwarder".to_string())
        .spawn(move || {
            if let Err(e) = io::copy(&mut io::stdin().lock(), &mut handle.stdin()) {
                debug!(error = %e, "Stdin forwarding stopped");
            }
            if let Err(e) = handle.stdin().close() {
                debug!(error = %e, "Failed to close child stdin");
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to start stdin forwarder");
    }
}

/// Run `job` on a detached thread and report its result over a oneshot.
///
/// Detached so a pipe held open by an orphaned descendant cannot keep us alive.
fn spawn_forwarder<F>(name: &str, job: F) -> Result<oneshot::Receiver<io::Result<u64>>>
where
    F: FnOnce() -> io::Result<u64> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let _ = tx.send(job());
        })
        .with_context(|| format!("Failed to start {name}"))?;
    Ok(rx)
}

fn forward(mut from: impl Read, to: &mut impl Write) -> io::Result<u64> {
    let copied = io::copy(&mut from, to)?;
    to.flush()?;
    Ok(copied)
}

/// Codes outside `0..=255` and unknown statuses have no byte form.
fn exit_byte(status: ExitStatus) -> Option<u8> {
    status.code().and_then(|code| u8::try_from(code).ok())
}

fn exit_code(status: ExitStatus) -> ExitCode {
    exit_byte(status).map_or(ExitCode::FAILURE, ExitCode::from)
}

fn show_launcher(json: bool) -> Result<()> {
    let status = runtime::status();

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match (status.launcher, status.load_error) {
        (Some(launcher), _) => {
            println!("Native layer: loaded");
            println!("Launcher:     {}", launcher.display());
        }
        (None, Some(error)) => {
            println!("Native layer: unavailable");
            println!("Error:        {error}");
        }
        (None, None) => println!("Native layer: unavailable"),
    }
    Ok(())
}
