//! The persistent state store.
//!
//! Owns the seen set, the per-URL delivery records and the rate limit usage
//! ledger. The JSON snapshot on disk is only touched through `open` and
//! `save`; write failures are logged and the in-memory state stays
//! authoritative.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;

use crate::storage::local::JsonFile;
use crate::storage::rate_limit::{Admission, UsageLedger, unix_now};
use crate::storage::snapshot::{PostRecord, decode_state};

/// On-disk layout of the state file.
#[derive(Serialize)]
struct StateFile<'a> {
    seen: &'a BTreeSet<String>,
    posts: &'a BTreeMap<String, Vec<PostRecord>>,
    usage: &'a UsageLedger,
}

/// Seen URLs, delivery records and rate limit usage, backed by a JSON file.
#[derive(Debug)]
pub struct StateStore {
    file: JsonFile,
    seen: BTreeSet<String>,
    posts: BTreeMap<String, Vec<PostRecord>>,
    usage: UsageLedger,
}

impl StateStore {
    /// Open the store at `path`, restoring whatever the snapshot holds.
    ///
    /// Never fails: unreadable or malformed files start from empty state.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let file = JsonFile::new(path);
        let mut store = Self {
            file,
            seen: BTreeSet::new(),
            posts: BTreeMap::new(),
            usage: UsageLedger::default(),
        };
        store.load();
        store
    }

    fn load(&mut self) {
        let text = match self.file.read() {
            Ok(Some(text)) => text,
            Ok(None) => return,
            Err(e) => {
                log::warn!(
                    "Could not read state from {}: {}. Starting empty.",
                    self.file.path().display(),
                    e
                );
                return;
            }
        };

        let decoded = decode_state(&text);
        if !decoded.dropped.is_empty() {
            log::warn!(
                "Dropped {} malformed record(s) from {}",
                decoded.dropped.len(),
                self.file.path().display()
            );
            for what in &decoded.dropped {
                log::debug!("  dropped {}", what);
            }
        }

        self.seen = decoded.value.seen;
        self.posts = decoded.value.posts;
        self.usage = UsageLedger::from_entries(decoded.value.usage);
    }

    /// Persist the full snapshot. Failures are logged, never raised.
    pub fn save(&self) {
        let payload = StateFile {
            seen: &self.seen,
            posts: &self.posts,
            usage: &self.usage,
        };
        if let Err(e) = self.file.write_json(&payload) {
            log::warn!(
                "Failed to save state to {}: {}",
                self.file.path().display(),
                e
            );
        }
    }

    /// Mark a URL as seen. Empty input is ignored.
    pub fn remember(&mut self, url: &str) {
        if !url.is_empty() {
            self.seen.insert(url.to_string());
        }
    }

    pub fn seen(&self, url: &str) -> bool {
        !url.is_empty() && self.seen.contains(url)
    }

    /// Whether `url` has already been delivered to `channel_id`.
    pub fn has_post(&self, url: &str, channel_id: u64) -> bool {
        self.posts
            .get(url)
            .is_some_and(|records| records.iter().any(|r| r.channel_id == channel_id))
    }

    /// Append a delivery record. Callers check `has_post` first.
    pub fn record_post(&mut self, url: &str, channel_id: u64, message_id: u64) {
        if url.is_empty() {
            return;
        }
        self.posts.entry(url.to_string()).or_default().push(PostRecord {
            channel_id,
            message_id,
        });
    }

    pub fn posts_for(&self, url: &str) -> Vec<PostRecord> {
        self.posts.get(url).cloned().unwrap_or_default()
    }

    /// Every URL with at least one delivery record.
    pub fn all_urls_with_posts(&self) -> Vec<String> {
        self.posts.keys().cloned().collect()
    }

    /// `(url, message_id)` of every delivery into `channel_id`.
    pub fn posts_in_channel(&self, channel_id: u64) -> Vec<(String, u64)> {
        self.posts
            .iter()
            .flat_map(|(url, records)| {
                records
                    .iter()
                    .filter(move |r| r.channel_id == channel_id)
                    .map(move |r| (url.clone(), r.message_id))
            })
            .collect()
    }

    /// Forget a URL entirely: seen membership and all delivery records.
    pub fn remove_url(&mut self, url: &str) {
        self.seen.remove(url);
        self.posts.remove(url);
    }

    /// Drop every delivery record for `channel_id`. Returns whether anything changed.
    pub fn remove_channel_posts(&mut self, channel_id: u64) -> bool {
        let mut changed = false;
        self.posts.retain(|_, records| {
            let before = records.len();
            records.retain(|r| r.channel_id != channel_id);
            changed |= records.len() != before;
            !records.is_empty()
        });
        changed
    }

    /// Sliding-window rate limit check for `key`.
    ///
    /// Allowed actions are recorded and the snapshot saved before returning,
    /// so limits survive a restart.
    pub fn allow(&mut self, key: &str, limit: usize, window_secs: u64, now: Option<f64>) -> Admission {
        let now = now.unwrap_or_else(unix_now);
        let admission = self.usage.admit(key, limit, window_secs, now);
        if admission.is_allowed() {
            self.save();
        }
        admission
    }

    pub fn usage(&self, key: &str) -> &[f64] {
        self.usage.usage(key)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn post_count(&self) -> usize {
        self.posts.values().map(Vec::len).sum()
    }
}
