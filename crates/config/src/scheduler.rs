//! Admission scheduler settings

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Cap used when the configured value is missing or unusable
pub const DEFAULT_PARALLEL_OPERATIONS: usize = 1;
/// Tick of the cooperative admission and completion polling loops
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How many queued operations may run at once
    #[serde(
        default = "default_parallel_operations",
        deserialize_with = "lenient_parallel_operations"
    )]
    pub parallel_operations: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl SchedulerConfig {
    /// Poll interval as a duration
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            parallel_operations: DEFAULT_PARALLEL_OPERATIONS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

fn default_parallel_operations() -> usize {
    DEFAULT_PARALLEL_OPERATIONS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Interpret a raw concurrency-cap setting.
///
/// Absent, unparseable and non-positive values all yield the default of 1.
#[must_use]
pub fn parse_parallel_operations(raw: Option<&str>) -> usize {
    let Some(raw) = raw else {
        tracing::debug!(
            "parallel operation limit not set, defaulting to {DEFAULT_PARALLEL_OPERATIONS}"
        );
        return DEFAULT_PARALLEL_OPERATIONS;
    };

    match raw.trim().parse::<usize>() {
        Ok(limit) if limit > 0 => {
            tracing::debug!("parallel operation limit set to {limit}");
            limit
        }
        _ => {
            tracing::warn!(
                value = raw,
                "invalid parallel operation limit, defaulting to {DEFAULT_PARALLEL_OPERATIONS}"
            );
            DEFAULT_PARALLEL_OPERATIONS
        }
    }
}

// Accepts an integer or a string in the file and never fails on a bad value
fn lenient_parallel_operations<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawLimit {
        Int(i64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match RawLimit::deserialize(deserializer)? {
        RawLimit::Int(value) => parse_parallel_operations(Some(&value.to_string())),
        RawLimit::Text(value) => parse_parallel_operations(Some(&value)),
        RawLimit::Other(_) => parse_parallel_operations(Some("")),
    })
}
