// src/pipeline/scan.rs

//! Source scanning.

use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::GiveawayItem;
use crate::pipeline::Context;
use crate::pipeline::deliver::deliver_to_all_channels;

/// Summary of one scan cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub sources: usize,
    pub source_failures: usize,
    pub items: usize,
    pub posted: usize,
}

/// Fetch one source and extract its candidate items.
///
/// Non-2xx responses are errors, like network failures.
pub async fn fetch_source(ctx: &Context, source: &str) -> Result<Vec<GiveawayItem>> {
    let page = ctx.fetcher.fetch(source).await?;
    if !page.is_success() {
        return Err(AppError::fetch(source, page.status));
    }
    Ok(ctx.extractor.extract_html(source, &page.body))
}

/// Fetch and extract every source, concatenating items in source order.
///
/// Failing sources are logged and skipped. Returns the items and the number
/// of failed sources.
pub async fn collect_items(ctx: &Context, sources: &[String]) -> (Vec<GiveawayItem>, usize) {
    let concurrency = ctx.config.scan.fetch_concurrency.max(1);

    let mut results = stream::iter(sources.iter().cloned())
        .map(|source| async move {
            let result = fetch_source(ctx, &source).await;
            (source, result)
        })
        .buffered(concurrency);

    let mut items = Vec::new();
    let mut failures = 0;
    while let Some((source, result)) = results.next().await {
        match result {
            Ok(found) => items.extend(found),
            Err(e) => {
                failures += 1;
                log::warn!("Error scraping {}: {}", source, e);
            }
        }
    }

    (items, failures)
}

/// One full scan cycle over every source and every registered channel.
///
/// Does nothing when no channel is registered or no source is configured.
pub async fn run_scan(ctx: &Context) -> ScanReport {
    let channels = ctx.active_channels();
    if channels.is_empty() || ctx.sources.is_empty() {
        log::debug!(
            "Scan skipped: {} channel(s), {} source(s)",
            channels.len(),
            ctx.sources.len()
        );
        return ScanReport::default();
    }

    log::info!("Scanning {} source(s) for new giveaways...", ctx.sources.len());
    let (items, source_failures) = collect_items(ctx, &ctx.sources).await;
    let mut report = ScanReport {
        sources: ctx.sources.len(),
        source_failures,
        items: items.len(),
        posted: 0,
    };

    if items.is_empty() {
        log::info!("No new giveaways found.");
        return report;
    }

    ctx.state.with(|state| {
        for item in &items {
            state.remember(&item.url);
        }
    });

    report.posted = deliver_to_all_channels(ctx, &channels, &items).await;
    ctx.state.with(|state| state.save());

    log::info!(
        "Scan complete: {} item(s) from {} source(s), {} posted",
        report.items,
        report.sources,
        report.posted
    );
    report
}
