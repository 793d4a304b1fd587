//! `docker`-backed availability probe and puller.

use acq_core::control::CancelToken;
use acq_core::coordinator::{AvailabilityProbe, Puller};
use std::process::{Command, Stdio};
use std::time::Duration;

use super::process::run_cancellable;

/// Image is available when `docker image inspect` succeeds.
pub struct DockerProbe;

impl AvailabilityProbe for DockerProbe {
    fn is_available(&self, key: &str) -> bool {
        Command::new("docker")
            .args(["image", "inspect", "--format", "{{.Id}}", key])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// Runs `docker pull`, killing it if the token is cancelled.
pub struct DockerPuller {
    poll: Duration,
}

impl DockerPuller {
    pub fn new(poll: Duration) -> Self {
        Self { poll }
    }
}

impl Puller for DockerPuller {
    fn pull(&self, token: &CancelToken, key: &str) -> anyhow::Result<()> {
        tracing::info!(image = key, "docker pull");
        let mut cmd = Command::new("docker");
        cmd.args(["pull", key]);
        run_cancellable(cmd, token, self.poll)
    }
}
