// src/pipeline/schedule.rs

//! Periodic scan and cleanup loops.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::pipeline::Context;
use crate::pipeline::cleanup::run_cleanup;
use crate::pipeline::scan::run_scan;

/// Cadence of both loops, and the window of every daily rate limit.
pub const DAILY: Duration = Duration::from_secs(24 * 60 * 60);

/// Spawn a loop that runs `cycle` immediately and then every `period`.
fn spawn_loop<F, Fut>(name: &'static str, period: Duration, ctx: Arc<Context>, cycle: F) -> JoinHandle<()>
where
    F: Fn(Arc<Context>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            log::debug!("{} loop tick", name);
            cycle(Arc::clone(&ctx)).await;
        }
    })
}

/// Run the scan and cleanup loops until `shutdown` resolves.
///
/// The two loops are independent: a long scan never delays cleanup and
/// either may interleave with on-demand commands.
pub async fn run_loops<S>(ctx: Arc<Context>, shutdown: S)
where
    S: Future<Output = ()>,
{
    let configured = ctx.config.scan.interval_minutes;
    if (configured * 60.0 - DAILY.as_secs_f64()).abs() > f64::EPSILON {
        log::info!(
            "Scan interval configured as {} minute(s); loops run every 24h",
            configured
        );
    }

    let scan = spawn_loop("scan", DAILY, Arc::clone(&ctx), |ctx| async move {
        run_scan(&ctx).await;
    });
    let cleanup = spawn_loop("cleanup", DAILY, ctx, |ctx| async move {
        run_cleanup(&ctx).await;
    });
    log::info!("Started background loops: scan(24h), cleanup(24h)");

    shutdown.await;
    log::info!("Shutting down background loops");
    scan.abort();
    cleanup.abort();
}
