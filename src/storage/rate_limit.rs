//! Sliding-window rate limiting over a persisted usage ledger.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied { retry_after_secs: u64 },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Current time as fractional Unix seconds.
pub fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Timestamps of allowed actions, keyed by rate limit key.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UsageLedger {
    entries: BTreeMap<String, Vec<f64>>,
}

impl UsageLedger {
    pub fn from_entries(entries: BTreeMap<String, Vec<f64>>) -> Self {
        Self { entries }
    }

    /// Recorded timestamps for `key`, oldest first.
    pub fn usage(&self, key: &str) -> &[f64] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drop timestamps of `key` that fell out of the window ending at `now`.
    pub fn prune(&mut self, key: &str, window_secs: u64, now: f64) -> &[f64] {
        let window = window_secs as f64;
        let kept: Vec<f64> = self
            .usage(key)
            .iter()
            .copied()
            .filter(|t| now - t < window)
            .collect();

        if kept.is_empty() {
            self.entries.remove(key);
            return &[];
        }
        let slot = self.entries.entry(key.to_string()).or_default();
        *slot = kept;
        slot.as_slice()
    }

    /// Admit an action under `key` if fewer than `limit` happened in the window.
    ///
    /// Allowed actions are recorded at `now`. Denials leave the ledger as
    /// pruned and report how long until the oldest entry leaves the window.
    pub fn admit(&mut self, key: &str, limit: usize, window_secs: u64, now: f64) -> Admission {
        let entries = self.prune(key, window_secs, now);
        if entries.len() >= limit {
            let oldest = entries.iter().copied().fold(now, f64::min);
            let remaining = (window_secs as f64 - (now - oldest)).max(0.0);
            return Admission::Denied {
                retry_after_secs: remaining.floor() as u64,
            };
        }

        self.entries.entry(key.to_string()).or_default().push(now);
        Admission::Allowed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
