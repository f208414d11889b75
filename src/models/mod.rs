// src/models/mod.rs

//! Domain models for the scanner.

mod config;
mod item;
mod sources;

// Re-export all public types
pub use config::{Config, ExtractorConfig, HttpConfig, PathsConfig, ScanConfig};
pub use item::{GiveawayItem, link_from_message};
pub use sources::{load_sources, parse_sources};
