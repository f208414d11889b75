//! Giveaway Scanner CLI
//!
//! Runs the periodic scan and cleanup loops, a single cycle of either, or one
//! of the channel commands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use giveaway_scanner::{
    error::Result,
    models::{Config, parse_sources},
    pipeline::{
        self, Context,
        commands::{self, Action},
    },
    storage::{ChannelRegistry, StateStore},
};

/// Giveaway Scanner - finds giveaway links and posts them to chat channels
#[derive(Parser, Debug)]
#[command(name = "giveaway-scanner", version, about = "Giveaway link scanner")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scan and cleanup loops until interrupted
    Run,

    /// Run one scan cycle across all registered channels, or a manual scan
    /// into one channel (rate limited to once a day)
    Scan {
        /// Deliver only into this channel
        #[arg(long)]
        channel: Option<u64>,
    },

    /// Run one expiry cleanup cycle
    Cleanup,

    /// Show what extraction finds without posting
    Preview {
        /// Source URL to preview instead of the configured sources
        #[arg(long)]
        url: Option<String>,
    },

    /// Register the destination channel for a group
    SetChannel {
        #[arg(long)]
        group: u64,
        #[arg(long)]
        channel: u64,
    },

    /// Start posting into a channel for a group
    Start {
        #[arg(long)]
        group: u64,
        #[arg(long)]
        channel: u64,
    },

    /// Stop posting into a group's channel
    Stop {
        #[arg(long)]
        group: u64,
        #[arg(long)]
        channel: u64,
    },

    /// Delete every bot message in a group's configured channel
    Clear {
        #[arg(long)]
        group: u64,
    },

    /// Print the chat command reference
    Commands,

    /// Validate configuration and the sources file
    Validate,

    /// Show configured paths and stored state
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Run a command through the policy layer, connecting to chat only when needed.
async fn run_action(config: Config, action: Action) -> Result<String> {
    let ctx = if action.needs_chat() {
        Context::connect(config)?
    } else {
        Context::offline(config)?
    };
    Ok(commands::dispatch(&ctx, action).await)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv = dotenvy::dotenv();
    init_logging(cli.verbose);

    if let Ok(path) = dotenv {
        log::debug!("Loaded environment from {}", path.display());
    }

    let config = Config::load_or_default(&cli.config).with_env();
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run => {
            let ctx = Arc::new(Context::connect(config)?);
            let channels = ctx.active_channels();
            if channels.is_empty() {
                log::warn!("No channels configured. Use /setchannel in the desired channel.");
            } else {
                log::info!("Configured post channels ({}): {:?}", channels.len(), channels);
            }

            pipeline::run_loops(ctx, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("Failed to listen for Ctrl-C: {}", e);
                }
            })
            .await;
        }

        Command::Scan {
            channel: Some(channel_id),
        } => {
            let action = Action::Scan { channel_id };
            println!("{}", run_action(config, action).await?);
        }

        Command::Scan { channel: None } => {
            let ctx = Context::connect(config)?;
            let report = pipeline::run_scan(&ctx).await;
            log::info!(
                "Scan: {} source(s), {} failed, {} item(s), {} posted",
                report.sources,
                report.source_failures,
                report.items,
                report.posted
            );
        }

        Command::Cleanup => {
            let ctx = Context::connect(config)?;
            let report = pipeline::run_cleanup(&ctx).await;
            log::info!(
                "Cleanup: {} checked, {} expired, {} message(s) deleted",
                report.checked,
                report.expired,
                report.deleted
            );
        }

        Command::Preview { url } => {
            let action = Action::Preview {
                channel_id: None,
                url,
            };
            println!("{}", run_action(config, action).await?);
        }

        Command::SetChannel { group, channel } => {
            let action = Action::SetChannel {
                group_id: group,
                channel_id: channel,
            };
            println!("{}", run_action(config, action).await?);
        }

        Command::Start { group, channel } => {
            let action = Action::Start {
                group_id: group,
                channel_id: channel,
            };
            println!("{}", run_action(config, action).await?);
        }

        Command::Stop { group, channel } => {
            let action = Action::Stop {
                group_id: group,
                channel_id: channel,
            };
            println!("{}", run_action(config, action).await?);
        }

        Command::Clear { group } => {
            let action = Action::Clear { group_id: group };
            println!("{}", run_action(config, action).await?);
        }

        Command::Commands => {
            println!("{}", commands::help_text());
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            let sources_path = &config.paths.sources_file;
            if sources_path.exists() {
                let content = std::fs::read_to_string(sources_path)?;
                match parse_sources(&content) {
                    Ok(sources) => log::info!("✓ {} source(s) in {}", sources.len(), sources_path.display()),
                    Err(e) => {
                        log::error!("Sources file {} is invalid: {}", sources_path.display(), e);
                        return Err(e);
                    }
                }
            } else {
                log::warn!("Sources file {} not found", sources_path.display());
            }

            if config.token.is_none() {
                log::warn!("DISCORD_TOKEN not set; run, scan and cleanup will refuse to start");
            }

            log::info!("All validations passed!");
        }

        Command::Info => {
            let state = StateStore::open(&config.paths.state_file);
            let channels = ChannelRegistry::open(&config.paths.channels_file);

            log::info!("Sources file: {}", config.paths.sources_file.display());
            log::info!("State file: {}", config.paths.state_file.display());
            log::info!("Channels file: {}", config.paths.channels_file.display());
            log::info!(
                "Scan interval: {} minute(s) configured, loops run every 24h",
                config.scan.interval_minutes
            );
            log::info!("Seen URLs: {}", state.seen_count());
            log::info!(
                "Delivered posts: {} across {} URL(s)",
                state.post_count(),
                state.all_urls_with_posts().len()
            );
            log::info!("Active channels: {:?}", channels.all_channel_ids());
        }
    }

    log::info!("Done!");

    Ok(())
}
