// src/services/extractor.rs

//! Giveaway link extraction.
//!
//! Turns a fetched source page into candidate giveaway items. Pages hosted on
//! a campaign platform keep every platform link outside its utility sections;
//! any other page keeps anchors whose text or href mentions a giveaway keyword.

use std::collections::HashSet;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ExtractorConfig, GiveawayItem};
use crate::utils::url::{first_path_segment, host, host_matches, normalize};
use crate::utils::{normalize_whitespace, resolve_url};

/// Keywords that mark a generic anchor as a giveaway.
const KEYWORD_PATTERN: &str = r"(?i)giveaway|contest|sweepstake|prize|\bfree\b|\bwin\b";

/// How a source page is filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Hosted on the campaign platform or its link shortener
    CampaignPlatform,
    /// Any other page; keyword matching applies
    Generic,
}

/// Extracts candidate giveaway items from source pages.
pub struct LinkExtractor {
    config: ExtractorConfig,
    keywords: Regex,
    anchor_sel: Selector,
    base_sel: Selector,
}

impl LinkExtractor {
    /// Create an extractor with the given platform rules.
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        Ok(Self {
            config,
            keywords: Regex::new(KEYWORD_PATTERN)?,
            anchor_sel: Self::parse_selector("a[href]")?,
            base_sel: Self::parse_selector("base[href]")?,
        })
    }

    /// Classify a source by its hostname.
    pub fn classify(&self, source: &str) -> SourceKind {
        let Some(source_host) = host(source) else {
            return SourceKind::Generic;
        };
        let on_platform = self
            .config
            .campaign_hosts
            .iter()
            .chain(self.config.shortener_hosts.iter())
            .any(|h| host_matches(&source_host, h));

        if on_platform {
            SourceKind::CampaignPlatform
        } else {
            SourceKind::Generic
        }
    }

    /// Parse `html` and extract items found on `source`.
    pub fn extract_html(&self, source: &str, html: &str) -> Vec<GiveawayItem> {
        let document = Html::parse_document(html);
        self.extract(source, &document)
    }

    /// Extract deduplicated items in document order.
    pub fn extract(&self, source: &str, document: &Html) -> Vec<GiveawayItem> {
        let kind = self.classify(source);
        let base = self.document_base(source, document);

        let mut anchors = 0usize;
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for anchor in document.select(&self.anchor_sel) {
            anchors += 1;
            let candidate = match kind {
                SourceKind::CampaignPlatform => self.campaign_candidate(&anchor, base.as_ref()),
                SourceKind::Generic => self.generic_candidate(&anchor, base.as_ref()),
            };

            if let Some((title, url)) = candidate {
                if seen.insert(url.clone()) {
                    items.push(GiveawayItem::new(title, url, source));
                }
            }
        }

        log::info!(
            "Parsed {}: anchors={}, matches={}",
            source,
            anchors,
            items.len()
        );
        items
    }

    /// Check whether a normalized URL is an accepted campaign link.
    ///
    /// Shortener links are always accepted. Platform links are rejected when
    /// their first path segment is a utility section (including the root).
    pub fn is_campaign_link(&self, url: &str) -> bool {
        let Some(link_host) = host(url) else {
            return false;
        };

        if self
            .config
            .shortener_hosts
            .iter()
            .any(|h| host_matches(&link_host, h))
        {
            return true;
        }

        if !self
            .config
            .campaign_hosts
            .iter()
            .any(|h| host_matches(&link_host, h))
        {
            return false;
        }

        let first = first_path_segment(url).unwrap_or_default();
        !self
            .config
            .blocked_sections
            .iter()
            .any(|blocked| blocked.eq_ignore_ascii_case(&first))
    }

    /// Check whether anchor text plus raw href mentions a giveaway keyword.
    pub fn matches_keywords(&self, text: &str, href: &str) -> bool {
        let label = format!("{text} {href}");
        self.keywords.is_match(label.trim())
    }

    fn campaign_candidate(
        &self,
        anchor: &ElementRef,
        base: Option<&Url>,
    ) -> Option<(String, String)> {
        let href = anchor.value().attr("href")?.trim();
        let url = normalize(&Self::absolute(base, href));
        if !self.is_campaign_link(&url) {
            return None;
        }
        Some((Self::anchor_title(anchor, &url), url))
    }

    fn generic_candidate(
        &self,
        anchor: &ElementRef,
        base: Option<&Url>,
    ) -> Option<(String, String)> {
        let href = anchor.value().attr("href")?.trim();
        let text = Self::anchor_text(anchor);
        if !self.matches_keywords(&text, href) {
            return None;
        }
        let url = Self::absolute(base, href);
        Some((Self::anchor_title(anchor, &url), url))
    }

    /// Base URL for relative links: `<base href>` if present, else the source.
    fn document_base(&self, source: &str, document: &Html) -> Option<Url> {
        let source_url = Url::parse(source).ok()?;
        let declared = document
            .select(&self.base_sel)
            .next()
            .and_then(|base| base.value().attr("href"))
            .and_then(|href| source_url.join(href.trim()).ok());
        Some(declared.unwrap_or(source_url))
    }

    fn absolute(base: Option<&Url>, href: &str) -> String {
        match base {
            Some(base) => resolve_url(base, href),
            None => href.to_string(),
        }
    }

    fn anchor_text(anchor: &ElementRef) -> String {
        normalize_whitespace(&anchor.text().collect::<String>())
    }

    /// Visible text, else the title attribute, else the URL.
    fn anchor_title(anchor: &ElementRef, url: &str) -> String {
        let text = Self::anchor_text(anchor);
        if !text.is_empty() {
            return text;
        }
        anchor
            .value()
            .attr("title")
            .map(normalize_whitespace)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| url.to_string())
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GLEAM_SOURCE: &str = "https://gleam.io/giveaways";
    const BLOG_SOURCE: &str = "https://deals.example.com/list/";

    fn extractor() -> LinkExtractor {
        LinkExtractor::new(ExtractorConfig::default()).unwrap()
    }

    fn urls(items: &[GiveawayItem]) -> Vec<&str> {
        items.iter().map(|i| i.url.as_str()).collect()
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(LinkExtractor::parse_selector("[[invalid").is_err());
    }

    #[test]
    fn test_classify_sources() {
        let ex = extractor();
        assert_eq!(ex.classify(GLEAM_SOURCE), SourceKind::CampaignPlatform);
        assert_eq!(ex.classify("https://www.gleam.io/x"), SourceKind::CampaignPlatform);
        assert_eq!(ex.classify("https://wn.nr/abc"), SourceKind::CampaignPlatform);
        assert_eq!(ex.classify(BLOG_SOURCE), SourceKind::Generic);
        assert_eq!(ex.classify("https://example.com/?q=gleam.io"), SourceKind::Generic);
    }

    #[test]
    fn test_campaign_link_filter() {
        let ex = extractor();
        assert!(ex.is_campaign_link("https://gleam.io/comp/abc123"));
        assert!(!ex.is_campaign_link("https://gleam.io/blog/post"));
        assert!(!ex.is_campaign_link("https://gleam.io/Pricing"));
        assert!(!ex.is_campaign_link("https://gleam.io/"));
        assert!(ex.is_campaign_link("https://wn.nr/xyz"));
        assert!(ex.is_campaign_link("https://wn.nr/blog"));
        assert!(!ex.is_campaign_link("https://example.com/comp/abc"));
    }

    #[test]
    fn test_keyword_filter() {
        let ex = extractor();
        assert!(ex.matches_keywords("Enter to WIN a prize", "/go"));
        assert!(!ex.matches_keywords("Contact us", "/contact"));
        assert!(ex.matches_keywords("", "/summer-giveaway"));
        assert!(ex.matches_keywords("Free stuff", "/x"));
        assert!(!ex.matches_keywords("Winter sale", "/freedom"));
    }

    #[test]
    fn test_extract_campaign_source() {
        let html = r#"
            <html><body>
              <a href="/comp/abc123?ref=home#top">  Win a
                 Console </a>
              <a href="/blog/post">Blog</a>
              <a href="https://wn.nr/xyz" title="Short link"></a>
              <a href="https://gleam.io/comp/abc123?ref=footer">Duplicate</a>
              <a href="https://example.com/giveaway">Elsewhere</a>
              <a href="/">Home</a>
            </body></html>
        "#;
        let items = extractor().extract_html(GLEAM_SOURCE, html);

        assert_eq!(
            urls(&items),
            vec!["https://gleam.io/comp/abc123", "https://wn.nr/xyz"]
        );
        assert_eq!(items[0].title, "Win a Console");
        assert_eq!(items[1].title, "Short link");
        assert!(items.iter().all(|i| i.source == GLEAM_SOURCE));
    }

    #[test]
    fn test_extract_campaign_title_falls_back_to_url() {
        let html = r#"<a href="https://gleam.io/AbCd/prize?x=1"></a>"#;
        let items = extractor().extract_html(GLEAM_SOURCE, html);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "https://gleam.io/AbCd/prize");
    }

    #[test]
    fn test_extract_generic_source() {
        let html = r#"
            <ul>
              <li><a href="/go">Enter to WIN a prize</a></li>
              <li><a href="/contact">Contact us</a></li>
              <li><a href="https://shop.test/sweepstakes?id=4">Enter now</a></li>
              <li><a href="/go">Same link again</a></li>
            </ul>
        "#;
        let items = extractor().extract_html(BLOG_SOURCE, html);

        assert_eq!(
            urls(&items),
            vec![
                "https://deals.example.com/go",
                "https://shop.test/sweepstakes?id=4"
            ]
        );
        assert_eq!(items[0].title, "Enter to WIN a prize");
    }

    #[test]
    fn test_extract_generic_honors_base_element() {
        let html = r#"
            <html><head><base href="https://cdn.example.com/promos/"></head>
            <body><a href="contest.html">Contest</a></body></html>
        "#;
        let items = extractor().extract_html(BLOG_SOURCE, html);
        assert_eq!(urls(&items), vec!["https://cdn.example.com/promos/contest.html"]);
    }

    #[test]
    fn test_extract_generic_does_not_normalize() {
        let html = r#"<a href="/giveaway?id=7#enter">Go</a>"#;
        let items = extractor().extract_html(BLOG_SOURCE, html);
        assert_eq!(urls(&items), vec!["https://deals.example.com/giveaway?id=7#enter"]);
    }

    #[test]
    fn test_extract_empty_document() {
        assert!(extractor().extract_html(BLOG_SOURCE, "").is_empty());
    }
}
