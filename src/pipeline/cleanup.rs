// src/pipeline/cleanup.rs

//! Expiry cleanup and bulk clearing of delivered messages.

use std::collections::HashSet;

use crate::pipeline::{Context, pause};

/// Summary of one cleanup cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub checked: usize,
    pub expired: usize,
    pub deleted: usize,
}

/// Re-check every delivered URL and retire the expired ones.
///
/// For an expired URL, each message in a still-registered channel is deleted
/// best-effort, then the URL is purged from the store and the store saved.
/// Does nothing when no channel is registered.
pub async fn run_cleanup(ctx: &Context) -> CleanupReport {
    let active: HashSet<u64> = ctx.active_channels().into_iter().collect();
    if active.is_empty() {
        return CleanupReport::default();
    }

    let urls = ctx.state.with(|state| state.all_urls_with_posts());
    if urls.is_empty() {
        return CleanupReport::default();
    }

    log::info!("Cleanup: checking {} posted URL(s) for expiry...", urls.len());
    let delay = ctx.config.scan.delete_delay_ms;
    let mut report = CleanupReport {
        checked: urls.len(),
        ..CleanupReport::default()
    };

    for url in urls {
        if !ctx.expiry.is_expired(&url).await {
            continue;
        }
        report.expired += 1;

        let records = ctx.state.with(|state| state.posts_for(&url));
        for record in records {
            if !active.contains(&record.channel_id) {
                continue;
            }
            match ctx
                .chat
                .delete_message(record.channel_id, record.message_id)
                .await
            {
                Ok(()) => report.deleted += 1,
                Err(e) => log::debug!(
                    "Cleanup: could not delete message {} in {}: {}",
                    record.message_id,
                    record.channel_id,
                    e
                ),
            }
            pause(delay).await;
        }

        ctx.state.with(|state| {
            state.remove_url(&url);
            state.save();
        });
    }

    if report.deleted > 0 {
        log::info!("Cleanup: removed {} expired post(s).", report.deleted);
    }
    report
}

/// Delete every message the bot posted in `channel_id` and forget its
/// delivery records. Returns how many messages were deleted.
///
/// Tracked messages go first; a sweep over the recent history then catches
/// any the store never recorded. Individual failures are skipped.
pub async fn clear_channel(ctx: &Context, channel_id: u64) -> usize {
    let _guard = ctx.lock_channel(channel_id).await;
    let scan = &ctx.config.scan;

    let tracked = ctx.state.with(|state| state.posts_in_channel(channel_id));
    let mut deleted = 0;
    for (url, message_id) in tracked {
        match ctx.chat.delete_message(channel_id, message_id).await {
            Ok(()) => {
                deleted += 1;
                pause(scan.clear_delay_ms).await;
            }
            Err(e) => log::debug!("Clear: tracked message {} for {} not deleted: {}", message_id, url, e),
        }
    }

    let mut swept = 0;
    match ctx
        .chat
        .recent_own_messages(channel_id, scan.sweep_limit)
        .await
    {
        Ok(messages) => {
            for message in messages {
                match ctx.chat.delete_message(channel_id, message.id).await {
                    Ok(()) => {
                        swept += 1;
                        pause(scan.sweep_delay_ms).await;
                    }
                    Err(e) => log::debug!("Clear: message {} not deleted: {}", message.id, e),
                }
            }
        }
        Err(e) => log::warn!("Clear: could not read history of channel {}: {}", channel_id, e),
    }

    ctx.state.with(|state| {
        if state.remove_channel_posts(channel_id) {
            state.save();
        }
    });

    log::info!(
        "Cleared {} tracked and {} untracked message(s) from channel {}",
        deleted,
        swept,
        channel_id
    );
    deleted + swept
}
