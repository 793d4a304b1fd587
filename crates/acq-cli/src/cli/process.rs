//! Child processes that stop when a token is cancelled.

use acq_core::control::CancelToken;
use anyhow::{Context, Result};
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Run `cmd` to completion, polling `token` every `poll`. On cancellation the child
/// is killed and the token's reason is returned as the error. A non-zero exit
/// becomes an error carrying the child's stderr.
pub fn run_cancellable(mut cmd: Command, token: &CancelToken, poll: Duration) -> Result<()> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    if let Some(reason) = token.err() {
        return Err(reason.into());
    }
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning {}", program))?;

    let stderr = child.stderr.take();
    let reader = std::thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = stderr {
            let _ = pipe.read_to_string(&mut text);
        }
        text
    });

    loop {
        if let Some(status) = child.try_wait()? {
            let stderr_text = reader.join().unwrap_or_default();
            if status.success() {
                return Ok(());
            }
            anyhow::bail!("{} exited with {}: {}", program, status, stderr_text.trim());
        }
        if let Some(reason) = token.err() {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!(program = %program, ?reason, "killed child after cancellation");
            return Err(reason.into());
        }
        std::thread::sleep(poll);
    }
}
