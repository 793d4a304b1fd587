//! `gh run download`-backed artifact fetcher.

use acq_core::batch::{FetchJob, FetchOptions, Fetched, Fetcher};
use acq_core::control::CancelToken;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::process::run_cancellable;

/// Downloads a run's artifacts into `dest/run-<id>`. A non-empty run directory is
/// treated as already downloaded.
pub struct GhRunFetcher {
    poll: Duration,
}

impl GhRunFetcher {
    pub fn new(poll: Duration) -> Self {
        Self { poll }
    }

    fn command(job: &FetchJob, dir: &Path, options: &FetchOptions) -> Command {
        let mut cmd = Command::new("gh");
        cmd.args(["run", "download", job.id.as_str(), "--dir"]).arg(dir);
        for name in &options.artifact_filter {
            cmd.args(["--name", name.as_str()]);
        }
        cmd
    }
}

fn has_entries(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

impl Fetcher for GhRunFetcher {
    fn fetch(
        &self,
        token: &CancelToken,
        job: &FetchJob,
        options: &FetchOptions,
    ) -> anyhow::Result<Fetched> {
        let dir = options.job_dir(job);
        if has_entries(&dir) {
            return Ok(Fetched {
                path: dir,
                cached: true,
            });
        }
        fs::create_dir_all(&dir)?;
        let result = run_cancellable(Self::command(job, &dir, options), token, self.poll);
        if let Err(e) = result {
            // An empty run directory must not survive a failed download.
            if !has_entries(&dir) {
                let _ = fs::remove_dir(&dir);
            }
            return Err(e);
        }
        Ok(Fetched {
            path: dir,
            cached: false,
        })
    }
}
