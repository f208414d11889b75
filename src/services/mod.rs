//! Service layer for the scanner.
//!
//! This module contains the page-level logic for:
//! - Link extraction (`LinkExtractor`)
//! - Expiry detection (`ExpiryChecker`)
//! - Page fetching (`PageFetcher`, `HttpFetcher`)

mod expiry;
mod extractor;
mod fetcher;

pub use expiry::{ExpiryChecker, visible_text};
pub use extractor::{LinkExtractor, SourceKind};
pub use fetcher::{FetchedPage, HttpFetcher, PageFetcher};
