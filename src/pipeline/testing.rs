//! In-memory fakes for the page fetcher and the chat client.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::delivery::{ChatClient, ChatMessage};
use crate::error::{AppError, Result};
use crate::models::Config;
use crate::pipeline::Context;
use crate::services::{FetchedPage, PageFetcher};

/// Serves canned pages; any other URL fails like a refused connection.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, FetchedPage>,
}

impl FakeFetcher {
    pub fn with_page(mut self, url: &str, status: u16, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchedPage {
                status,
                body: body.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.pages.get(url).cloned().ok_or_else(|| {
            AppError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("no fake page for {url}"),
            ))
        })
    }
}

#[derive(Default)]
struct ChatLog {
    next_id: u64,
    /// Per channel, oldest first: (author, message).
    history: HashMap<u64, Vec<(u64, ChatMessage)>>,
    sent: Vec<(u64, String)>,
    deleted: Vec<(u64, u64)>,
    delete_attempts: Vec<(u64, u64)>,
    failing_sends: Vec<String>,
    failing_history: HashSet<u64>,
}

impl ChatLog {
    fn push(&mut self, channel_id: u64, author: u64, content: &str) -> u64 {
        self.next_id += 1;
        let message = ChatMessage {
            id: self.next_id,
            content: content.to_string(),
        };
        self.history
            .entry(channel_id)
            .or_default()
            .push((author, message));
        self.next_id
    }
}

/// Chat platform double. Clones share the same message log.
#[derive(Clone)]
pub struct FakeChat {
    bot_id: u64,
    log: Arc<Mutex<ChatLog>>,
}

impl FakeChat {
    pub fn new(bot_id: u64) -> Self {
        Self {
            bot_id,
            log: Arc::new(Mutex::new(ChatLog {
                next_id: 1000,
                ..ChatLog::default()
            })),
        }
    }

    /// Seed a message the bot posted earlier.
    pub fn with_message(self, channel_id: u64, content: &str) -> Self {
        self.seed_own(channel_id, content);
        self
    }

    /// Seed a message from another user.
    pub fn with_foreign_message(self, channel_id: u64, content: &str) -> Self {
        let author = self.bot_id + 1;
        self.log.lock().unwrap().push(channel_id, author, content);
        self
    }

    /// Fail every send whose content contains `needle`.
    pub fn failing_send(self, needle: &str) -> Self {
        self.log.lock().unwrap().failing_sends.push(needle.to_string());
        self
    }

    /// Fail history reads for `channel_id`.
    pub fn failing_history(self, channel_id: u64) -> Self {
        self.log.lock().unwrap().failing_history.insert(channel_id);
        self
    }

    /// Seed a bot message and return its id.
    pub fn seed_own(&self, channel_id: u64, content: &str) -> u64 {
        self.log.lock().unwrap().push(channel_id, self.bot_id, content)
    }

    pub fn sent(&self) -> Vec<(u64, String)> {
        self.log.lock().unwrap().sent.clone()
    }

    pub fn deleted(&self) -> Vec<(u64, u64)> {
        self.log.lock().unwrap().deleted.clone()
    }

    pub fn delete_attempts(&self) -> Vec<(u64, u64)> {
        self.log.lock().unwrap().delete_attempts.clone()
    }

    pub fn own_messages(&self, channel_id: u64) -> Vec<ChatMessage> {
        let log = self.log.lock().unwrap();
        log.history
            .get(&channel_id)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|(author, _)| *author == self.bot_id)
                    .map(|(_, m)| m.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn recent_own_messages(&self, channel_id: u64, limit: usize) -> Result<Vec<ChatMessage>> {
        let log = self.log.lock().unwrap();
        if log.failing_history.contains(&channel_id) {
            return Err(AppError::chat("read channel history", "status 403: Missing Access"));
        }
        Ok(log
            .history
            .get(&channel_id)
            .map(|messages| {
                messages
                    .iter()
                    .rev()
                    .take(limit)
                    .filter(|(author, _)| *author == self.bot_id)
                    .map(|(_, m)| m.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn send_message(&self, channel_id: u64, content: &str) -> Result<u64> {
        let mut log = self.log.lock().unwrap();
        if log.failing_sends.iter().any(|needle| content.contains(needle.as_str())) {
            return Err(AppError::chat("send message", "status 500: fake failure"));
        }
        log.sent.push((channel_id, content.to_string()));
        let bot_id = self.bot_id;
        Ok(log.push(channel_id, bot_id, content))
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.delete_attempts.push((channel_id, message_id));
        let messages = log.history.entry(channel_id).or_default();
        let before = messages.len();
        messages.retain(|(_, m)| m.id != message_id);
        if messages.len() == before {
            return Err(AppError::chat("delete message", "status 404: Unknown Message"));
        }
        log.deleted.push((channel_id, message_id));
        Ok(())
    }
}

/// A context whose files live under `tmp`, with every pause disabled.
pub fn context(tmp: &TempDir, fetcher: FakeFetcher, chat: FakeChat, sources: Vec<String>) -> Context {
    let mut config = Config::default();
    config.paths.sources_file = tmp.path().join("sources.json");
    config.paths.state_file = tmp.path().join("data/state.json");
    config.paths.channels_file = tmp.path().join("data/channels.json");
    config.scan.post_delay_ms = 0;
    config.scan.delete_delay_ms = 0;
    config.scan.clear_delay_ms = 0;
    config.scan.sweep_delay_ms = 0;

    Context::new(config, sources, Arc::new(fetcher), Arc::new(chat)).unwrap()
}
