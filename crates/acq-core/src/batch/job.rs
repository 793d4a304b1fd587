//! Batch inputs and the fetcher collaborator.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::control::CancelToken;

/// One unit of work: an opaque id (e.g. a workflow run id) and an optional label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchJob {
    pub id: String,
    pub name: Option<String>,
}

impl FetchJob {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Display for FetchJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", self.id, name),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Parameters shared by every job in a batch.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Parent directory; each job lands in `dest_dir/run-<id>`.
    pub dest_dir: PathBuf,
    /// Log each job at info instead of debug.
    pub verbose: bool,
    /// How many qualifying results the caller wants. Informational only: the whole
    /// batch always runs, see `select_qualifying`.
    pub max_needed: Option<usize>,
    /// Artifact names handed to the fetcher; empty means all of them.
    pub artifact_filter: Vec<String>,
}

impl FetchOptions {
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            ..Self::default()
        }
    }

    pub fn job_dir(&self, job: &FetchJob) -> PathBuf {
        job_dir(&self.dest_dir, job)
    }
}

pub(crate) fn job_dir(dest_dir: &Path, job: &FetchJob) -> PathBuf {
    dest_dir.join(format!("run-{}", job.id))
}

/// What a successful fetch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub path: PathBuf,
    /// Already present; nothing was downloaded.
    pub cached: bool,
}

/// Performs the download for one job (e.g. `gh run download`). May block on I/O
/// but must return promptly once `token` is cancelled; returning the token's
/// `Cancelled` reason as the error marks the job as cancelled mid-flight.
pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        token: &CancelToken,
        job: &FetchJob,
        options: &FetchOptions,
    ) -> anyhow::Result<Fetched>;
}
