// src/pipeline/mod.rs

//! Scan, delivery and cleanup orchestration.
//!
//! - `run_scan`: fetch every source and deliver new items to every channel
//! - `run_cleanup`: re-check delivered URLs and retire expired ones
//! - `commands`: the externally triggered actions (manual scan, preview, …)
//! - `schedule`: the two periodic loops

pub mod cleanup;
pub mod commands;
pub mod deliver;
pub mod scan;
pub mod schedule;

#[cfg(test)]
pub mod testing;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::delivery::{ChatClient, DiscordClient, Offline};
use crate::error::Result;
use crate::models::{Config, load_sources};
use crate::services::{ExpiryChecker, HttpFetcher, LinkExtractor, PageFetcher};
use crate::storage::{ChannelRegistry, Shared, StateStore};
use crate::utils::http::create_async_client;

pub use cleanup::{CleanupReport, clear_channel, run_cleanup};
pub use deliver::{deliver_to_all_channels, deliver_to_channel};
pub use scan::{ScanReport, collect_items, fetch_source, run_scan};
pub use schedule::{DAILY, run_loops};

/// Everything a scan or cleanup pass needs, shared by the loops and commands.
pub struct Context {
    pub config: Arc<Config>,
    pub sources: Vec<String>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub chat: Arc<dyn ChatClient>,
    pub extractor: LinkExtractor,
    pub expiry: ExpiryChecker,
    pub state: Shared<StateStore>,
    pub channels: Shared<ChannelRegistry>,
    channel_locks: Shared<HashMap<u64, Arc<Mutex<()>>>>,
}

impl Context {
    /// Assemble a context, opening the state and channel files named in `config`.
    pub fn new(
        config: Config,
        sources: Vec<String>,
        fetcher: Arc<dyn PageFetcher>,
        chat: Arc<dyn ChatClient>,
    ) -> Result<Self> {
        let extractor = LinkExtractor::new(config.extractor.clone())?;
        let expiry = ExpiryChecker::new(Arc::clone(&fetcher))?;
        let state = Shared::new(StateStore::open(&config.paths.state_file));
        let channels = Shared::new(ChannelRegistry::open(&config.paths.channels_file));

        Ok(Self {
            config: Arc::new(config),
            sources,
            fetcher,
            chat,
            extractor,
            expiry,
            state,
            channels,
            channel_locks: Shared::new(HashMap::new()),
        })
    }

    /// Production wiring: HTTP fetcher, Discord client and the sources file.
    pub fn connect(config: Config) -> Result<Self> {
        let token = config.require_token()?.to_string();
        let chat: Arc<dyn ChatClient> = Arc::new(DiscordClient::new(token, &config.http)?);
        Self::with_chat(config, chat)
    }

    /// Wiring without a chat platform, for previews and diagnostics.
    pub fn offline(config: Config) -> Result<Self> {
        Self::with_chat(config, Arc::new(Offline))
    }

    fn with_chat(config: Config, chat: Arc<dyn ChatClient>) -> Result<Self> {
        let client = create_async_client(&config.http)?;
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(client));

        let sources = load_sources(&config.paths.sources_file);
        if sources.is_empty() {
            log::warn!(
                "No sources configured. Add URLs to {}.",
                config.paths.sources_file.display()
            );
        } else {
            log::info!("Loaded {} source(s).", sources.len());
        }

        Self::new(config, sources, fetcher, chat)
    }

    /// Destination channels currently registered.
    pub fn active_channels(&self) -> Vec<u64> {
        self.channels.with(|c| c.all_channel_ids())
    }

    /// Serialize delivery work per channel.
    ///
    /// Held for a whole delivery pass or clear so two passes against the same
    /// channel never interleave.
    pub async fn lock_channel(&self, channel_id: u64) -> OwnedMutexGuard<()> {
        let lock = self
            .channel_locks
            .with(|locks| Arc::clone(locks.entry(channel_id).or_default()));
        lock.lock_owned().await
    }
}

/// Sleep for `ms` milliseconds; zero skips the timer entirely.
pub(crate) async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
