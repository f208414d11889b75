// src/pipeline/deliver.rs

//! Idempotent delivery of items to destination channels.

use std::collections::HashSet;

use crate::models::{GiveawayItem, link_from_message};
use crate::pipeline::{Context, pause};

/// Deliver `items` to each channel in turn. Returns the total posted.
pub async fn deliver_to_all_channels(
    ctx: &Context,
    channels: &[u64],
    items: &[GiveawayItem],
) -> usize {
    let mut posted = 0;
    for &channel_id in channels {
        posted += deliver_to_channel(ctx, channel_id, items).await;
    }
    posted
}

/// Deliver `items` to one channel in extraction order, skipping any URL the
/// channel already shows or already has a delivery record for.
///
/// Returns the number of messages sent. Send failures are logged per item and
/// the pass continues.
pub async fn deliver_to_channel(ctx: &Context, channel_id: u64, items: &[GiveawayItem]) -> usize {
    let _guard = ctx.lock_channel(channel_id).await;
    let scan = &ctx.config.scan;

    let mut visible: HashSet<String> = match ctx
        .chat
        .recent_own_messages(channel_id, scan.history_limit)
        .await
    {
        Ok(messages) => messages
            .iter()
            .filter_map(|m| link_from_message(&m.content))
            .map(|link| link.trim().to_string())
            .filter(|link| !link.is_empty())
            .collect(),
        Err(e) => {
            log::warn!("Unable to read history of channel {}: {}", channel_id, e);
            return 0;
        }
    };

    let mut posted = 0;
    for item in items {
        if item.url.is_empty() {
            continue;
        }
        let delivered = ctx.state.with(|state| state.has_post(&item.url, channel_id));
        if delivered || visible.contains(&item.url) {
            log::debug!("Duplicate in channel {}: {}", channel_id, item.url);
            continue;
        }

        match ctx
            .chat
            .send_message(channel_id, &item.message_content())
            .await
        {
            Ok(message_id) => {
                ctx.state
                    .with(|state| state.record_post(&item.url, channel_id, message_id));
                visible.insert(item.url.clone());
                posted += 1;
                pause(scan.post_delay_ms).await;
            }
            Err(e) => {
                log::warn!(
                    "Failed to post item {} to channel {}: {}",
                    item.url,
                    channel_id,
                    e
                );
            }
        }
    }

    log::info!("Posted {} item(s) to channel {}", posted, channel_id);
    posted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{FakeChat, FakeFetcher, context};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn item(url: &str) -> GiveawayItem {
        GiveawayItem::new(format!("Prize {url}"), url, "https://src.test")
    }

    #[tokio::test]
    async fn test_same_url_twice_yields_one_record() {
        let tmp = TempDir::new().unwrap();
        let chat = FakeChat::new(1);
        let ctx = context(&tmp, FakeFetcher::default(), chat.clone(), vec![]);
        let items = vec![item("https://gleam.io/a/one")];

        assert_eq!(deliver_to_channel(&ctx, 100, &items).await, 1);
        assert_eq!(deliver_to_channel(&ctx, 100, &items).await, 0);

        ctx.state.with(|state| {
            assert_eq!(state.posts_for("https://gleam.io/a/one").len(), 1);
        });
        assert_eq!(chat.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_within_one_batch_posts_once() {
        let tmp = TempDir::new().unwrap();
        let chat = FakeChat::new(1);
        let ctx = context(&tmp, FakeFetcher::default(), chat.clone(), vec![]);
        let items = vec![item("https://a.test/x"), item("https://a.test/x")];

        assert_eq!(deliver_to_channel(&ctx, 100, &items).await, 1);
    }

    #[tokio::test]
    async fn test_visible_link_is_skipped_without_record() {
        let tmp = TempDir::new().unwrap();
        let chat = FakeChat::new(1).with_message(100, "🎁 Old\nhttps://gleam.io/a/old");
        let ctx = context(&tmp, FakeFetcher::default(), chat.clone(), vec![]);

        let items = vec![item("https://gleam.io/a/old"), item("https://gleam.io/a/new")];
        assert_eq!(deliver_to_channel(&ctx, 100, &items).await, 1);

        let sent = chat.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "🎁 Prize https://gleam.io/a/new\nhttps://gleam.io/a/new");
        ctx.state.with(|state| assert!(!state.has_post("https://gleam.io/a/old", 100)));
    }

    #[tokio::test]
    async fn test_other_authors_messages_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let chat = FakeChat::new(1).with_foreign_message(100, "look\nhttps://gleam.io/a/one");
        let ctx = context(&tmp, FakeFetcher::default(), chat.clone(), vec![]);

        assert_eq!(
            deliver_to_channel(&ctx, 100, &[item("https://gleam.io/a/one")]).await,
            1
        );
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let tmp = TempDir::new().unwrap();
        let chat = FakeChat::new(1);
        let ctx = context(&tmp, FakeFetcher::default(), chat.clone(), vec![]);
        let items = vec![item("https://a.test/x")];

        assert_eq!(deliver_to_channel(&ctx, 100, &items).await, 1);
        assert_eq!(deliver_to_all_channels(&ctx, &[100, 200], &items).await, 1);
        ctx.state.with(|state| {
            assert!(state.has_post("https://a.test/x", 100));
            assert!(state.has_post("https://a.test/x", 200));
        });
    }

    #[tokio::test]
    async fn test_send_failure_continues_batch() {
        let tmp = TempDir::new().unwrap();
        let chat = FakeChat::new(1).failing_send("https://a.test/bad");
        let ctx = context(&tmp, FakeFetcher::default(), chat.clone(), vec![]);
        let items = vec![
            item("https://a.test/bad"),
            item("https://a.test/good"),
        ];

        assert_eq!(deliver_to_channel(&ctx, 100, &items).await, 1);
        ctx.state.with(|state| {
            assert!(!state.has_post("https://a.test/bad", 100));
            assert!(state.has_post("https://a.test/good", 100));
        });
    }

    #[tokio::test]
    async fn test_history_failure_skips_channel() {
        let tmp = TempDir::new().unwrap();
        let chat = FakeChat::new(1).failing_history(100);
        let ctx = context(&tmp, FakeFetcher::default(), chat.clone(), vec![]);

        assert_eq!(
            deliver_to_channel(&ctx, 100, &[item("https://a.test/x")]).await,
            0
        );
        assert!(chat.sent().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_passes_do_not_double_post() {
        let tmp = TempDir::new().unwrap();
        let chat = FakeChat::new(1);
        let ctx = Arc::new(context(&tmp, FakeFetcher::default(), chat.clone(), vec![]));
        let items = Arc::new(vec![item("https://a.test/x"), item("https://a.test/y")]);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ctx = Arc::clone(&ctx);
                let items = Arc::clone(&items);
                tokio::spawn(async move { deliver_to_channel(&ctx, 100, &items).await })
            })
            .collect();

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }
        assert_eq!(total, 2);
        assert_eq!(chat.sent().len(), 2);
    }
}
