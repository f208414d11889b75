//! Expiry detection for delivered giveaway links.

use std::sync::Arc;

use regex::Regex;
use scraper::Html;

use crate::error::Result;
use crate::services::PageFetcher;

/// Phrases that mark a giveaway page as finished.
const ENDED_PATTERN: &str = r"(?i)(ended|giveaway\s+has\s+ended|no\s+longer\s+active|expired)";

/// Elements whose text never renders.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Classifies giveaway URLs as expired or still running.
pub struct ExpiryChecker {
    fetcher: Arc<dyn PageFetcher>,
    ended: Regex,
}

impl ExpiryChecker {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        Ok(Self {
            fetcher,
            ended: Regex::new(ENDED_PATTERN)?,
        })
    }

    /// Fetch `url` and decide whether its giveaway has ended.
    ///
    /// Fetch failures count as "not expired" so a flaky network never retires
    /// a live giveaway.
    pub async fn is_expired(&self, url: &str) -> bool {
        match self.fetcher.fetch(url).await {
            Ok(page) => self.classify(page.status, &page.body),
            Err(e) => {
                log::debug!("Expiry check for {} failed: {}", url, e);
                false
            }
        }
    }

    /// Expired when the status is an error or the visible text says so.
    pub fn classify(&self, status: u16, body: &str) -> bool {
        if status >= 400 {
            return true;
        }
        self.ended.is_match(&visible_text(body))
    }
}

/// Flatten a page to its visible text, one space between text nodes.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::FakeFetcher;

    fn checker(fetcher: FakeFetcher) -> ExpiryChecker {
        ExpiryChecker::new(Arc::new(fetcher)).unwrap()
    }

    #[test]
    fn test_visible_text_skips_scripts() {
        let text = visible_text(
            "<html><head><script>var state = 'expired';</script></head>\
             <body><h1>Win  a bike</h1><p>Enter now</p></body></html>",
        );
        assert_eq!(text, "Win  a bike Enter now");
    }

    #[test]
    fn test_classify_error_status() {
        let c = checker(FakeFetcher::default());
        assert!(c.classify(404, "<p>all good</p>"));
        assert!(c.classify(500, ""));
    }

    #[test]
    fn test_classify_text_heuristics() {
        let c = checker(FakeFetcher::default());
        assert!(c.classify(200, "<p>This giveaway has ended.</p>"));
        assert!(c.classify(200, "<p>Promotion is NO LONGER\n ACTIVE</p>"));
        assert!(c.classify(200, "<div>Expired</div>"));
        assert!(!c.classify(200, "<p>Enter to win! 3 days left</p>"));
    }

    #[tokio::test]
    async fn test_is_expired_fetches_page() {
        let fetcher = FakeFetcher::default()
            .with_page("https://gleam.io/a/done", 200, "<p>Competition ended</p>")
            .with_page("https://gleam.io/b/live", 200, "<p>Enter now</p>")
            .with_page("https://gleam.io/c/gone", 410, "");
        let c = checker(fetcher);

        assert!(c.is_expired("https://gleam.io/a/done").await);
        assert!(!c.is_expired("https://gleam.io/b/live").await);
        assert!(c.is_expired("https://gleam.io/c/gone").await);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_expired() {
        let c = checker(FakeFetcher::default());
        assert!(!c.is_expired("https://unreachable.test/x").await);
    }
}
