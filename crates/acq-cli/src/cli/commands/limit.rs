//! `acq limit` – show the effective download concurrency.

use acq_core::config::AcqConfig;
use acq_core::limit::{LimitSource, CONCURRENCY_ENV_VAR};

pub fn run_limit(cfg: &AcqConfig) {
    let resolved = cfg.resolve_limit();
    let source = match resolved.source {
        LimitSource::Env => CONCURRENCY_ENV_VAR,
        LimitSource::Default => "config/default",
    };
    println!("max concurrent downloads: {} (from {})", resolved.value, source);
}
