//! Thin wrapper around the `git` binary.
//!
//! Every invocation runs with a deadline; a subprocess that outlives it is
//! killed and reported as [`ProvisionError::GitTimeout`]. Credential prompts
//! are disabled so an unauthenticated clone fails instead of hanging.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{ProvisionError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct Git {
    program: PathBuf,
    timeout: Duration,
}

impl Git {
    /// Locate `git` on `PATH`.
    pub fn locate(timeout: Duration) -> Result<Self> {
        let program = which::which("git").map_err(|_| ProvisionError::GitNotFound)?;
        Ok(Self { program, timeout })
    }

    /// Run `git <args>` in `cwd`, returning trimmed stdout.
    ///
    /// `step` names the operation in errors and logs (e.g. `"clone"`).
    pub fn run<I, S>(&self, step: &str, cwd: Option<&Path>, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        debug!(step, cwd = ?cwd, "running git");

        let git_error = |stderr: String| ProvisionError::Git {
            step: step.to_string(),
            stderr,
        };

        let mut child = cmd.spawn().map_err(|e| git_error(e.to_string()))?;

        // Pipes are drained on background threads while we poll for exit.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {}
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                }
            }
            if start.elapsed() > self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = stdout.map(join_drain).unwrap_or_default();
        let stderr = stderr.map(join_drain).unwrap_or_default();

        match status {
            None => Err(ProvisionError::GitTimeout {
                step: step.to_string(),
                secs: self.timeout.as_secs(),
            }),
            Some(status) if !status.success() => {
                let message = stderr.trim();
                Err(git_error(if message.is_empty() {
                    format!("exited with {status}")
                } else {
                    message.to_string()
                }))
            }
            Some(_) => Ok(stdout.trim().to_string()),
        }
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_drain(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}
