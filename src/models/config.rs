//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
///
/// Loaded from a TOML file, then overridden by environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Scan, delivery and cleanup behavior
    #[serde(default)]
    pub scan: ScanConfig,

    /// Locations of the sources list and persisted state
    #[serde(default)]
    pub paths: PathsConfig,

    /// Link extraction rules
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Bot credential. Only ever read from the environment.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    ///
    /// A missing file is not worth a warning; most deployments only use
    /// environment variables.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            log::warn!("Config load failed from {:?}: {}. Using defaults.", path, e);
            Self::default()
        })
    }

    /// Apply overrides from the process environment.
    pub fn with_env(mut self) -> Self {
        self.apply_env(|key| std::env::var(key).ok());
        self
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Recognized keys: `DISCORD_TOKEN`, `SCAN_INTERVAL_MINUTES`,
    /// `SOURCES_FILE`, `STATE_FILE`, `CHANNELS_FILE`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("DISCORD_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.token = Some(token.trim().to_string());
        }
        if let Some(raw) = lookup("SCAN_INTERVAL_MINUTES") {
            match raw.trim().parse::<f64>() {
                Ok(minutes) if minutes > 0.0 => self.scan.interval_minutes = minutes,
                _ => log::warn!("Ignoring invalid SCAN_INTERVAL_MINUTES={:?}", raw),
            }
        }
        if let Some(path) = lookup("SOURCES_FILE") {
            self.paths.sources_file = PathBuf::from(path);
        }
        if let Some(path) = lookup("STATE_FILE") {
            self.paths.state_file = PathBuf::from(path);
        }
        if let Some(path) = lookup("CHANNELS_FILE") {
            self.paths.channels_file = PathBuf::from(path);
        }
    }

    /// Return the bot credential or a configuration error.
    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| AppError::config("DISCORD_TOKEN not set"))
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.scan.history_limit == 0 {
            return Err(AppError::validation("scan.history_limit must be > 0"));
        }
        if self.scan.fetch_concurrency == 0 {
            return Err(AppError::validation("scan.fetch_concurrency must be > 0"));
        }
        if self.scan.preview_max_sources == 0 {
            return Err(AppError::validation(
                "scan.preview_max_sources must be > 0",
            ));
        }
        if self.extractor.campaign_hosts.is_empty() {
            return Err(AppError::validation("No campaign hosts defined"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            scan: ScanConfig::default(),
            paths: PathsConfig::default(),
            extractor: ExtractorConfig::default(),
            token: None,
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for page fetches
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Scan, delivery and cleanup behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Declared scan interval. The periodic loops run daily regardless.
    #[serde(default = "defaults::interval_minutes")]
    pub interval_minutes: f64,

    /// How many recent bot messages to inspect before posting
    #[serde(default = "defaults::history_limit")]
    pub history_limit: usize,

    /// Pause after each delivered message
    #[serde(default = "defaults::post_delay")]
    pub post_delay_ms: u64,

    /// Pause after each expiry deletion attempt
    #[serde(default = "defaults::delete_delay")]
    pub delete_delay_ms: u64,

    /// Pause after each tracked message deleted by a bulk clear
    #[serde(default = "defaults::clear_delay")]
    pub clear_delay_ms: u64,

    /// Pause after each untracked message deleted by a bulk clear sweep
    #[serde(default = "defaults::sweep_delay")]
    pub sweep_delay_ms: u64,

    /// How many recent bot messages a bulk clear sweeps
    #[serde(default = "defaults::sweep_limit")]
    pub sweep_limit: usize,

    /// Maximum number of sources fetched at once
    #[serde(default = "defaults::fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Maximum number of sources a preview inspects
    #[serde(default = "defaults::preview_max_sources")]
    pub preview_max_sources: usize,

    /// Maximum number of items listed per previewed source
    #[serde(default = "defaults::preview_max_items")]
    pub preview_max_items: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval_minutes: defaults::interval_minutes(),
            history_limit: defaults::history_limit(),
            post_delay_ms: defaults::post_delay(),
            delete_delay_ms: defaults::delete_delay(),
            clear_delay_ms: defaults::clear_delay(),
            sweep_delay_ms: defaults::sweep_delay(),
            sweep_limit: defaults::sweep_limit(),
            fetch_concurrency: defaults::fetch_concurrency(),
            preview_max_sources: defaults::preview_max_sources(),
            preview_max_items: defaults::preview_max_items(),
        }
    }
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// JSON list of source pages to scan
    #[serde(default = "defaults::sources_file")]
    pub sources_file: PathBuf,

    /// State store snapshot
    #[serde(default = "defaults::state_file")]
    pub state_file: PathBuf,

    /// Owning group to channel mapping
    #[serde(default = "defaults::channels_file")]
    pub channels_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sources_file: defaults::sources_file(),
            state_file: defaults::state_file(),
            channels_file: defaults::channels_file(),
        }
    }
}

/// Link extraction rules for campaign platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Hostnames of the giveaway campaign platform (a `www.` prefix is implied)
    #[serde(default = "defaults::campaign_hosts")]
    pub campaign_hosts: Vec<String>,

    /// Link-shortener hostnames of the platform, accepted without path checks
    #[serde(default = "defaults::shortener_hosts")]
    pub shortener_hosts: Vec<String>,

    /// First path segments that are platform pages rather than campaigns
    #[serde(default = "defaults::blocked_sections")]
    pub blocked_sections: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            campaign_hosts: defaults::campaign_hosts(),
            shortener_hosts: defaults::shortener_hosts(),
            blocked_sections: defaults::blocked_sections(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // HTTP defaults
    pub fn user_agent() -> String {
        "giveaway-scanner/0.1 (+https://crates.io/crates/scraper) reqwest".into()
    }
    pub fn timeout() -> u64 {
        20
    }

    // Scan defaults
    pub fn interval_minutes() -> f64 {
        12.0
    }
    pub fn history_limit() -> usize {
        200
    }
    pub fn post_delay() -> u64 {
        1200
    }
    pub fn delete_delay() -> u64 {
        600
    }
    pub fn clear_delay() -> u64 {
        300
    }
    pub fn sweep_delay() -> u64 {
        250
    }
    pub fn sweep_limit() -> usize {
        500
    }
    pub fn fetch_concurrency() -> usize {
        4
    }
    pub fn preview_max_sources() -> usize {
        3
    }
    pub fn preview_max_items() -> usize {
        5
    }

    // Path defaults
    pub fn sources_file() -> PathBuf {
        PathBuf::from("sources.json")
    }
    pub fn state_file() -> PathBuf {
        PathBuf::from("data/state.json")
    }
    pub fn channels_file() -> PathBuf {
        PathBuf::from("data/channels.json")
    }

    // Extractor defaults
    pub fn campaign_hosts() -> Vec<String> {
        vec!["gleam.io".into()]
    }
    pub fn shortener_hosts() -> Vec<String> {
        vec!["wn.nr".into()]
    }
    pub fn blocked_sections() -> Vec<String> {
        [
            "", "blog", "features", "pricing", "help", "docs", "legal", "terms", "privacy",
            "jobs", "status", "login", "signup", "partners", "about", "contact", "press",
            "brand", "developer", "developers", "api", "company", "changelog", "site",
            "pages", "collections", "category", "categories", "tag", "tags", "gallery",
            "app", "tools", "guides", "customers", "success", "integrations", "faq",
            "templates",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}
