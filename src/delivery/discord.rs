//! Discord REST client.
//!
//! Talks to the HTTP API with a bot token; no gateway session is needed to
//! post, list or delete messages.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::delivery::{ChatClient, ChatMessage};
use crate::error::{AppError, Result};
use crate::models::HttpConfig;

const API_BASE: &str = "https://discord.com/api/v10";

/// Discord returns at most this many messages per history page.
const PAGE_SIZE: usize = 100;

/// Upper bound on how long a rate-limited call waits before its one retry.
const MAX_RETRY_WAIT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct CreateMessageBody<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiUser {
    id: String,
}

#[derive(Deserialize)]
struct ApiMessage {
    id: String,
    #[serde(default)]
    content: String,
    author: ApiUser,
}

#[derive(Deserialize)]
struct RateLimited {
    retry_after: f64,
}

/// `ChatClient` for Discord bot accounts.
pub struct DiscordClient {
    client: Client,
    token: String,
    api_base: String,
    bot_id: OnceCell<u64>,
}

impl DiscordClient {
    pub fn new(token: impl Into<String>, http: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("DiscordBot (giveaway-scanner, ", env!("CARGO_PKG_VERSION"), ")"))
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            token: token.into(),
            api_base: API_BASE.to_string(),
            bot_id: OnceCell::new(),
        })
    }

    /// Point the client at another API root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// The bot's own user id, fetched once.
    pub async fn bot_id(&self) -> Result<u64> {
        self.bot_id
            .get_or_try_init(|| async {
                let user: ApiUser = self
                    .call("get current user", || self.client.get(self.url("/users/@me")))
                    .await?
                    .json()
                    .await?;
                parse_snowflake(&user.id)
            })
            .await
            .copied()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Send a request built by `build`, retrying once after a 429.
    async fn call<F>(&self, context: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retried = false;
        loop {
            let response = build()
                .header("Authorization", format!("Bot {}", self.token))
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::TOO_MANY_REQUESTS && !retried {
                let wait = response
                    .json::<RateLimited>()
                    .await
                    .map(|r| Duration::from_secs_f64(r.retry_after.max(0.0)))
                    .unwrap_or(Duration::from_secs(1))
                    .min(MAX_RETRY_WAIT);
                log::debug!("Discord rate limited during {}; waiting {:?}", context, wait);
                tokio::time::sleep(wait).await;
                retried = true;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(AppError::chat(context, format!("status {}: {}", status, body)));
        }
    }
}

#[async_trait]
impl ChatClient for DiscordClient {
    async fn recent_own_messages(&self, channel_id: u64, limit: usize) -> Result<Vec<ChatMessage>> {
        let bot_id = self.bot_id().await?;
        let path = self.url(&format!("/channels/{channel_id}/messages"));

        let mut own = Vec::new();
        let mut fetched = 0usize;
        let mut before: Option<String> = None;

        while fetched < limit {
            let page_size = (limit - fetched).min(PAGE_SIZE);
            let page: Vec<ApiMessage> = self
                .call("read channel history", || {
                    let mut request = self
                        .client
                        .get(&path)
                        .query(&[("limit", page_size.to_string())]);
                    if let Some(before) = &before {
                        request = request.query(&[("before", before)]);
                    }
                    request
                })
                .await?
                .json()
                .await?;

            if page.is_empty() {
                break;
            }
            fetched += page.len();
            before = page.last().map(|m| m.id.clone());
            let exhausted = page.len() < page_size;

            own.extend(authored_by(page, bot_id));

            if exhausted {
                break;
            }
        }

        Ok(own)
    }

    async fn send_message(&self, channel_id: u64, content: &str) -> Result<u64> {
        let path = self.url(&format!("/channels/{channel_id}/messages"));
        let body = CreateMessageBody { content };
        let message: ApiMessage = self
            .call("send message", || self.client.post(&path).json(&body))
            .await?
            .json()
            .await?;
        parse_snowflake(&message.id)
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<()> {
        let path = self.url(&format!("/channels/{channel_id}/messages/{message_id}"));
        self.call("delete message", || self.client.delete(&path))
            .await?;
        Ok(())
    }
}

/// Messages in `page` written by `bot_id`. Entries with unparseable ids are skipped.
fn authored_by(page: Vec<ApiMessage>, bot_id: u64) -> Vec<ChatMessage> {
    page.into_iter()
        .filter_map(|message| {
            let parsed = parse_snowflake(&message.author.id)
                .and_then(|author| Ok((author, parse_snowflake(&message.id)?)));
            match parsed {
                Ok((author, id)) if author == bot_id => Some(ChatMessage {
                    id,
                    content: message.content,
                }),
                Ok(_) => None,
                Err(e) => {
                    log::debug!("Skipping history entry {:?}: {}", message.id, e);
                    None
                }
            }
        })
        .collect()
}

fn parse_snowflake(id: &str) -> Result<u64> {
    id.parse()
        .map_err(|e| AppError::chat("parse id", format!("invalid snowflake {id:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snowflake() {
        assert_eq!(parse_snowflake("175928847299117063").unwrap(), 175928847299117063);
        assert!(parse_snowflake("abc").is_err());
    }

    fn api_message(id: &str, author: &str, content: &str) -> ApiMessage {
        ApiMessage {
            id: id.to_string(),
            content: content.to_string(),
            author: ApiUser {
                id: author.to_string(),
            },
        }
    }

    #[test]
    fn test_authored_by_skips_malformed_ids() {
        let page = vec![
            api_message("10", "7", "🎁 A\nhttps://a.test/1"),
            api_message("11", "not-a-number", "broken author"),
            api_message("oops", "7", "broken id"),
            api_message("12", "8", "someone else"),
            api_message("13", "7", "🎁 B\nhttps://a.test/2"),
        ];

        let own = authored_by(page, 7);
        assert_eq!(
            own.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![10, 13]
        );
        assert_eq!(own[1].content, "🎁 B\nhttps://a.test/2");
    }

    #[test]
    fn test_api_base_override() {
        let client = DiscordClient::new("token", &HttpConfig::default())
            .unwrap()
            .with_api_base("http://localhost:8080/api/");
        assert_eq!(client.url("/users/@me"), "http://localhost:8080/api/users/@me");
    }

    #[test]
    fn test_message_payload_parses() {
        let message: ApiMessage = serde_json::from_str(
            r#"{"id": "42", "content": "🎁 Prize\nhttps://wn.nr/x", "author": {"id": "7", "bot": true}}"#,
        )
        .unwrap();
        assert_eq!(message.id, "42");
        assert_eq!(message.author.id, "7");
    }
}
