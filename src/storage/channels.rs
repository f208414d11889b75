//! Destination channel registry.
//!
//! Maps each owning group (server) to the one channel that receives posts.
//! Persisted separately from the state store, with the same
//! swallow-on-failure policy.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::storage::local::JsonFile;
use crate::storage::snapshot::decode_channels;

#[derive(Serialize)]
struct ChannelsFile<'a> {
    channels: &'a BTreeMap<String, u64>,
}

/// Owning group id to destination channel id, backed by a JSON file.
#[derive(Debug)]
pub struct ChannelRegistry {
    file: JsonFile,
    channels: BTreeMap<String, u64>,
}

impl ChannelRegistry {
    /// Open the registry at `path`. Unreadable files start empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let file = JsonFile::new(path);
        let channels = match file.read() {
            Ok(Some(text)) => {
                let decoded = decode_channels(&text);
                if !decoded.dropped.is_empty() {
                    log::warn!(
                        "Dropped {} malformed entr(ies) from {}",
                        decoded.dropped.len(),
                        file.path().display()
                    );
                }
                decoded.value
            }
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                log::warn!("Could not read channels from {}: {}", file.path().display(), e);
                BTreeMap::new()
            }
        };
        Self { file, channels }
    }

    /// Persist the mapping. Failures are logged, never raised.
    pub fn save(&self) {
        let payload = ChannelsFile {
            channels: &self.channels,
        };
        if let Err(e) = self.file.write_json(&payload) {
            log::warn!(
                "Failed to save channels to {}: {}",
                self.file.path().display(),
                e
            );
        }
    }

    /// Point a group at a channel, or clear it with `None`.
    pub fn set_channel(&mut self, group_id: u64, channel_id: Option<u64>) {
        match channel_id {
            Some(id) => {
                self.channels.insert(group_id.to_string(), id);
            }
            None => {
                self.channels.remove(&group_id.to_string());
            }
        }
    }

    pub fn get_channel(&self, group_id: u64) -> Option<u64> {
        self.channels.get(&group_id.to_string()).copied()
    }

    /// All active destination channels.
    pub fn all_channel_ids(&self) -> Vec<u64> {
        self.channels.values().copied().filter(|id| *id != 0).collect()
    }

    pub fn is_active(&self, channel_id: u64) -> bool {
        self.channels.values().any(|id| *id == channel_id)
    }
}
