//! `acq pull` – make images available, pulling each missing one once.

use acq_core::config::AcqConfig;
use acq_core::control::CancelToken;
use acq_core::coordinator::{PrepareError, PullCoordinator, PullStatus, Puller};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::docker::{DockerProbe, DockerPuller};

const WAIT_POLL: Duration = Duration::from_millis(500);

/// What a pull run ended with, short of an error.
#[derive(Debug)]
enum PullReport {
    /// Every image is present.
    Available(usize),
    /// Pulls are in flight and the caller chose not to wait.
    Pending(PrepareError),
}

pub async fn run_pull(
    cfg: &AcqConfig,
    images: Vec<String>,
    wait: bool,
    token: CancelToken,
) -> Result<()> {
    let coordinator = PullCoordinator::new(DockerProbe)
        .with_poll_interval(cfg.cancel_poll_interval())
        .with_retry_hint_secs(cfg.retry_hint_secs);
    let puller: Arc<dyn Puller> = Arc::new(DockerPuller::new(cfg.cancel_poll_interval()));

    let report = tokio::task::spawn_blocking(move || {
        pull_blocking(&coordinator, &images, puller, &token, wait, WAIT_POLL)
    })
    .await
    .context("pull task join")??;

    match report {
        PullReport::Available(n) => println!("all {} image(s) available", n),
        PullReport::Pending(pending) => println!("{}", pending),
    }
    Ok(())
}

fn pull_blocking(
    coordinator: &PullCoordinator,
    images: &[String],
    puller: Arc<dyn Puller>,
    token: &CancelToken,
    wait: bool,
    poll: Duration,
) -> Result<PullReport> {
    let pending = match coordinator.ensure_available(token, images, puller) {
        Ok(()) => return Ok(PullReport::Available(images.len())),
        Err(e @ PrepareError::Pending { .. }) if !wait => return Ok(PullReport::Pending(e)),
        Err(PrepareError::Pending { keys, .. }) => keys,
        Err(e) => return Err(e.into()),
    };
    tracing::info!("waiting for {}", pending.join(", "));

    while pending.iter().any(|k| coordinator.is_downloading(k)) {
        if token.wait_timeout(poll, coordinator.poll_interval()) {
            // Claims are released by their watchers; nothing left to wait for.
            break;
        }
    }
    if let Some(reason) = token.err() {
        anyhow::bail!("pull interrupted: {}", reason);
    }

    let missing: Vec<&str> = pending
        .iter()
        .map(String::as_str)
        .filter(|k| coordinator.status(k) != PullStatus::Available)
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("failed to pull: {} (see log for details)", missing.join(", "));
    }
    Ok(PullReport::Available(images.len()))
}
