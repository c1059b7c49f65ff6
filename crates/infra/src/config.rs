//! Ledger configuration loading and representation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_MAX_ATTEMPTS: &str = "STOCKLEDGER_MAX_ATTEMPTS";
pub const ENV_TIMEOUT_MS: &str = "STOCKLEDGER_TIMEOUT_MS";
pub const ENV_RETRY_BACKOFF_MS: &str = "STOCKLEDGER_RETRY_BACKOFF_MS";

/// Retry and timeout budget for serializing writes to one product.
///
/// `timeout` is the bound a caller can rely on: conflicting writes are
/// retried until it elapses. Every lost commit means another caller won, so
/// N racing callers on one product all finish as long as N commits fit in
/// the timeout. `max_attempts` optionally caps retries on top of that.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Optional cap on commit attempts per call. `None` retries until
    /// `timeout`.
    pub max_attempts: Option<u32>,
    /// Wall-clock budget for one call, measured from its first attempt.
    pub timeout: Duration,
    /// Base pause after a conflict. The pause doubles with every attempt
    /// (up to [`MAX_BACKOFF_DOUBLINGS`] times) and is jittered; zero only
    /// yields the thread.
    pub retry_backoff: Duration,
}

/// Upper bound on how often the base backoff doubles.
pub const MAX_BACKOFF_DOUBLINGS: u32 = 6;

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(1),
        }
    }
}

impl LedgerConfig {
    /// Load from `STOCKLEDGER_*` environment variables.
    ///
    /// Unset variables keep their defaults; invalid ones are logged and
    /// replaced by the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment, config map, ...).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let max_attempts = parse_or(&lookup, ENV_MAX_ATTEMPTS, defaults.max_attempts, |v| {
            v.parse::<u32>().ok().filter(|n| *n >= 1).map(Some)
        });
        let timeout = parse_or(&lookup, ENV_TIMEOUT_MS, defaults.timeout, parse_millis);
        let retry_backoff =
            parse_or(&lookup, ENV_RETRY_BACKOFF_MS, defaults.retry_backoff, parse_millis);

        Self {
            max_attempts,
            timeout,
            retry_backoff,
        }
    }
}

fn parse_millis(value: &str) -> Option<Duration> {
    value.parse::<u64>().ok().map(Duration::from_millis)
}

fn parse_or<T: core::fmt::Debug>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => parse(raw.trim()).unwrap_or_else(|| {
            warn!(key, value = %raw, ?default, "invalid ledger setting; using default");
            default
        }),
    }
}
