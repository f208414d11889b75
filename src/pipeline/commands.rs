// src/pipeline/commands.rs

//! Externally triggered actions.
//!
//! Each command applies its rate limit, does its work and returns the reply
//! text for whoever invoked it. Permission checks and the chat transport
//! stay with the caller.

use crate::pipeline::cleanup::clear_channel;
use crate::pipeline::deliver::deliver_to_channel;
use crate::pipeline::scan::{collect_items, fetch_source};
use crate::pipeline::{Context, DAILY};
use crate::services::SourceKind;
use crate::storage::Admission;
use crate::utils::format_cooldown;

/// Manual scans per channel per day.
pub const SCAN_LIMIT: usize = 1;
/// Previews per channel per day.
pub const PREVIEW_LIMIT: usize = 1;
/// Channel registration changes per group per day.
pub const REGISTRATION_LIMIT: usize = 2;

pub const HELP_TEXT: &str = "\
Commands:
• /preview: Show what the scraper finds (per-channel 1/day).

Admin-only (Manage Server):
• /setchannel: Set the channel to receive giveaway posts.
• /start: Start bot activity in this channel.
• /stop: Stop bot activity in this channel.
• /scan: Manually scan now (per-channel 1/day).
• /clear: Delete the bot's giveaway posts in the configured channel.

Background jobs: scan and cleanup run every 24 hours.";

/// An externally triggered action, as requested by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Scan { channel_id: u64 },
    Preview { channel_id: Option<u64>, url: Option<String> },
    SetChannel { group_id: u64, channel_id: u64 },
    Start { group_id: u64, channel_id: u64 },
    Stop { group_id: u64, channel_id: u64 },
    Clear { group_id: u64 },
    Help,
}

impl Action {
    /// Whether the action talks to the chat platform.
    pub fn needs_chat(&self) -> bool {
        matches!(self, Action::Scan { .. } | Action::Clear { .. })
    }
}

/// Run `action` and return its reply text.
pub async fn dispatch(ctx: &Context, action: Action) -> String {
    log::debug!("Dispatching {:?}", action);
    match action {
        Action::Scan { channel_id } => manual_scan(ctx, channel_id).await,
        Action::Preview { channel_id, url } => preview(ctx, channel_id, url.as_deref()).await,
        Action::SetChannel {
            group_id,
            channel_id,
        } => set_channel(ctx, group_id, channel_id),
        Action::Start {
            group_id,
            channel_id,
        } => start(ctx, group_id, channel_id),
        Action::Stop {
            group_id,
            channel_id,
        } => stop(ctx, group_id, channel_id),
        Action::Clear { group_id } => clear(ctx, group_id).await,
        Action::Help => help_text().to_string(),
    }
}

fn scan_key(channel_id: u64) -> String {
    format!("scan:channel:{channel_id}")
}

fn preview_key(channel_id: u64) -> String {
    format!("preview:channel:{channel_id}")
}

fn registration_key(group_id: u64) -> String {
    format!("setchannel:guild:{group_id}")
}

/// Charge one use of `key` against its daily limit.
fn admit(ctx: &Context, key: &str, limit: usize) -> Admission {
    let admission = ctx
        .state
        .with(|state| state.allow(key, limit, DAILY.as_secs(), None));
    if let Admission::Denied { retry_after_secs } = admission {
        log::info!("Rate limited {} for {}s", key, retry_after_secs);
    }
    admission
}

/// Scan every source now and deliver into `channel_id` only.
pub async fn manual_scan(ctx: &Context, channel_id: u64) -> String {
    if let Admission::Denied { retry_after_secs } = admit(ctx, &scan_key(channel_id), SCAN_LIMIT) {
        return format!(
            "This channel hit its daily scan limit. Try again in {}.",
            format_cooldown(retry_after_secs)
        );
    }

    let (items, _) = collect_items(ctx, &ctx.sources).await;
    if items.is_empty() {
        return "No new giveaways found.".to_string();
    }

    let posted = deliver_to_channel(ctx, channel_id, &items).await;
    ctx.state.with(|state| state.save());
    format!("Scan complete. Posted {posted} item(s) to <#{channel_id}>.")
}

/// Show what extraction finds without posting anything.
///
/// Uses `url` when given, else the first configured sources. The rate limit
/// only applies when invoked from a channel.
pub async fn preview(ctx: &Context, channel_id: Option<u64>, url: Option<&str>) -> String {
    if let Some(channel_id) = channel_id {
        if let Admission::Denied { retry_after_secs } =
            admit(ctx, &preview_key(channel_id), PREVIEW_LIMIT)
        {
            return format!(
                "This channel hit its daily preview limit. Try again in {}.",
                format_cooldown(retry_after_secs)
            );
        }
    }

    let targets: Vec<String> = match url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => vec![url.to_string()],
        None => ctx.sources.clone(),
    };
    if targets.is_empty() {
        return "No sources configured.".to_string();
    }

    let limits = &ctx.config.scan;
    let mut lines = Vec::new();
    for target in targets.iter().take(limits.preview_max_sources) {
        let items = match fetch_source(ctx, target).await {
            Ok(items) => items,
            Err(e) => {
                lines.push(format!("- {target}: error {e}"));
                continue;
            }
        };

        let hint = if items.is_empty() && ctx.extractor.classify(target) == SourceKind::CampaignPlatform {
            " (campaign filter: 0 kept)"
        } else {
            ""
        };
        lines.push(format!("- {}: {} found{}", target, items.len(), hint));
        for item in items.iter().take(limits.preview_max_items) {
            lines.push(format!("  • {} -> {}", item.display_title(), item.url));
        }
    }

    if lines.is_empty() {
        "No results.".to_string()
    } else {
        lines.join("\n")
    }
}

/// Register `channel_id` as the destination for `group_id`.
pub fn set_channel(ctx: &Context, group_id: u64, channel_id: u64) -> String {
    if let Some(reply) = registration_cooldown(ctx, group_id) {
        return reply;
    }
    register(ctx, group_id, channel_id);
    format!("Giveaway posts will be sent to <#{channel_id}>.")
}

/// Same registration as `set_channel`, with the activity wording.
pub fn start(ctx: &Context, group_id: u64, channel_id: u64) -> String {
    if let Some(reply) = registration_cooldown(ctx, group_id) {
        return reply;
    }
    register(ctx, group_id, channel_id);
    format!("Bot activity started in <#{channel_id}>.")
}

/// Deregister `channel_id` if it is the group's current destination.
pub fn stop(ctx: &Context, group_id: u64, channel_id: u64) -> String {
    if let Some(reply) = registration_cooldown(ctx, group_id) {
        return reply;
    }

    let stopped = ctx.channels.with(|channels| {
        if channels.get_channel(group_id) == Some(channel_id) {
            channels.set_channel(group_id, None);
            channels.save();
            true
        } else {
            false
        }
    });

    if stopped {
        log::info!("Group {} stopped posting to channel {}", group_id, channel_id);
        format!("Bot activity stopped in <#{channel_id}>.")
    } else {
        "This channel is not currently active.".to_string()
    }
}

/// Delete every bot message in the group's configured channel.
pub async fn clear(ctx: &Context, group_id: u64) -> String {
    let Some(channel_id) = ctx.channels.with(|channels| channels.get_channel(group_id)) else {
        return "No channel configured. Use /setchannel in the target channel.".to_string();
    };

    let deleted = clear_channel(ctx, channel_id).await;
    format!("Cleared {deleted} message(s) from <#{channel_id}>.")
}

pub fn help_text() -> &'static str {
    HELP_TEXT
}

fn registration_cooldown(ctx: &Context, group_id: u64) -> Option<String> {
    match admit(ctx, &registration_key(group_id), REGISTRATION_LIMIT) {
        Admission::Allowed => None,
        Admission::Denied { retry_after_secs } => Some(format!(
            "Cooldown active. Try again in {}.",
            format_cooldown(retry_after_secs)
        )),
    }
}

fn register(ctx: &Context, group_id: u64, channel_id: u64) {
    ctx.channels.with(|channels| {
        channels.set_channel(group_id, Some(channel_id));
        channels.save();
    });
    log::info!("Group {} now posts to channel {}", group_id, channel_id);
}
