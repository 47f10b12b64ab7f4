//! Retry and retention policy attached to every stage job.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_DELAY_MS: u64 = 1000;
/// Completed jobs older than this are pruned.
pub const COMPLETED_MAX_AGE_SECS: u64 = 3600;
/// At most this many completed jobs are kept per queue.
pub const COMPLETED_MAX_COUNT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backoff {
    #[serde(rename = "type")]
    pub kind: BackoffKind,
    /// Base delay in milliseconds.
    pub delay: u64,
}

impl Backoff {
    /// Delay before the retry that follows the `attempts_made`-th failure.
    /// Exponential: 1s, 2s, 4s, ... for a 1000ms base.
    pub fn delay_for(&self, attempts_made: u32) -> Duration {
        let millis = match self.kind {
            BackoffKind::Fixed => self.delay,
            BackoffKind::Exponential => {
                let exponent = attempts_made.saturating_sub(1).min(32);
                self.delay.saturating_mul(1u64 << exponent)
            }
        };
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveOnComplete {
    /// Seconds a completed job is kept.
    pub age: u64,
    pub count: usize,
}

impl RemoveOnComplete {
    /// Ids of completed jobs that must be dropped: anything older than `age`,
    /// then the oldest entries beyond `count`.
    pub fn prune(&self, completed: &[(String, DateTime<Utc>)], now: DateTime<Utc>) -> Vec<String> {
        let max_age = chrono::Duration::seconds(i64::try_from(self.age).unwrap_or(i64::MAX));
        let mut by_age: Vec<&(String, DateTime<Utc>)> = completed.iter().collect();
        by_age.sort_by_key(|(_, finished_at)| *finished_at);

        let (expired, kept): (Vec<_>, Vec<_>) = by_age
            .into_iter()
            .partition(|(_, finished_at)| now - *finished_at >= max_age);

        let overflow = kept.len().saturating_sub(self.count);
        expired
            .into_iter()
            .chain(kept.into_iter().take(overflow))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    pub attempts: u32,
    pub backoff: Backoff,
    pub remove_on_complete: RemoveOnComplete,
    /// `false` keeps exhausted jobs forever.
    pub remove_on_fail: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff: Backoff {
                kind: BackoffKind::Exponential,
                delay: DEFAULT_BACKOFF_DELAY_MS,
            },
            remove_on_complete: RemoveOnComplete {
                age: COMPLETED_MAX_AGE_SECS,
                count: COMPLETED_MAX_COUNT,
            },
            remove_on_fail: false,
        }
    }
}

impl JobOptions {
    /// Backoff before the next attempt, or `None` when attempts are exhausted.
    pub fn next_retry(&self, attempts_made: u32) -> Option<Duration> {
        (attempts_made < self.attempts).then(|| self.backoff.delay_for(attempts_made))
    }
}
