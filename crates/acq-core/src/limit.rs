//! Worker-pool width resolution.
//!
//! The width comes from `ACQ_MAX_CONCURRENT_DOWNLOADS` when it holds an integer in
//! `[MIN_CONCURRENCY, MAX_CONCURRENCY]`. Anything else logs a warning and falls back
//! to the default; a bad value is never fatal.

/// Environment variable overriding the pool width.
pub const CONCURRENCY_ENV_VAR: &str = "ACQ_MAX_CONCURRENT_DOWNLOADS";

/// Compiled-in pool width.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 10;

pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 100;

/// Where a resolved width came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSource {
    /// Taken from the raw input.
    Env,
    /// Input missing or invalid.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLimit {
    pub value: usize,
    pub source: LimitSource,
}

/// Resolve `raw` against the compiled-in default.
pub fn resolve_limit(raw: Option<&str>) -> usize {
    resolve_limit_with_default(raw, DEFAULT_MAX_CONCURRENT_DOWNLOADS).value
}

/// Resolve `raw`, falling back to `default` on a missing, empty, unparsable or
/// out-of-range value. `default` is trusted as-is.
pub fn resolve_limit_with_default(raw: Option<&str>, default: usize) -> ResolvedLimit {
    let fallback = ResolvedLimit {
        value: default,
        source: LimitSource::Default,
    };
    let raw = match raw {
        Some(s) if !s.is_empty() => s,
        _ => return fallback,
    };
    match raw.parse::<i64>() {
        Ok(n) if in_range(n) => ResolvedLimit {
            value: n as usize,
            source: LimitSource::Env,
        },
        Ok(n) => {
            tracing::warn!(
                "{}={} is outside [{}, {}], using default {}",
                CONCURRENCY_ENV_VAR,
                n,
                MIN_CONCURRENCY,
                MAX_CONCURRENCY,
                default
            );
            fallback
        }
        Err(e) => {
            tracing::warn!(
                "{}={:?} is not an integer ({}), using default {}",
                CONCURRENCY_ENV_VAR,
                raw,
                e,
                default
            );
            fallback
        }
    }
}

/// Read `ACQ_MAX_CONCURRENT_DOWNLOADS` and resolve it against `default`.
pub fn limit_from_env(default: usize) -> ResolvedLimit {
    let raw = std::env::var(CONCURRENCY_ENV_VAR).ok();
    resolve_limit_with_default(raw.as_deref(), default)
}

fn in_range(n: i64) -> bool {
    n >= MIN_CONCURRENCY as i64 && n <= MAX_CONCURRENCY as i64
}

/// Validate a configured default; out-of-range values fall back to the compiled-in one.
pub fn validate_default(configured: usize) -> usize {
    if in_range(configured as i64) {
        configured
    } else {
        tracing::warn!(
            "configured max_concurrent_downloads={} is outside [{}, {}], using {}",
            configured,
            MIN_CONCURRENCY,
            MAX_CONCURRENCY,
            DEFAULT_MAX_CONCURRENT_DOWNLOADS
        );
        DEFAULT_MAX_CONCURRENT_DOWNLOADS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_values_are_used() {
        assert_eq!(resolve_limit(Some("5")), 5);
        assert_eq!(resolve_limit(Some("1")), 1);
        assert_eq!(resolve_limit(Some("100")), 100);
    }

    #[test]
    fn missing_or_empty_uses_default() {
        assert_eq!(resolve_limit(None), DEFAULT_MAX_CONCURRENT_DOWNLOADS);
        assert_eq!(resolve_limit(Some("")), DEFAULT_MAX_CONCURRENT_DOWNLOADS);
    }

    #[test]
    fn invalid_values_fall_back() {
        for raw in ["0", "-5", "101", "invalid", " 5", "5.0", "99999999999999999999"] {
            assert_eq!(
                resolve_limit(Some(raw)),
                DEFAULT_MAX_CONCURRENT_DOWNLOADS,
                "input {:?}",
                raw
            );
        }
    }

    #[test]
    fn source_reports_origin() {
        let r = resolve_limit_with_default(Some("7"), 3);
        assert_eq!(r, ResolvedLimit { value: 7, source: LimitSource::Env });
        let r = resolve_limit_with_default(Some("abc"), 3);
        assert_eq!(r, ResolvedLimit { value: 3, source: LimitSource::Default });
        let r = resolve_limit_with_default(None, 3);
        assert_eq!(r.source, LimitSource::Default);
    }

    #[test]
    fn configured_default_is_validated() {
        assert_eq!(validate_default(4), 4);
        assert_eq!(validate_default(0), DEFAULT_MAX_CONCURRENT_DOWNLOADS);
        assert_eq!(validate_default(500), DEFAULT_MAX_CONCURRENT_DOWNLOADS);
    }
}
