//! Giveaway item data structure.

use serde::{Deserialize, Serialize};

/// A candidate giveaway link extracted from a source page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GiveawayItem {
    /// Anchor text, title attribute or the URL itself
    pub title: String,

    /// Absolute URL of the giveaway
    pub url: String,

    /// Source page the link was found on
    pub source: String,
}

impl GiveawayItem {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            source: source.into(),
        }
    }

    /// Title to display, falling back to the URL.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.url
        } else {
            &self.title
        }
    }

    /// Format the chat message body.
    ///
    /// The URL is always the second line; delivery relies on that to spot
    /// links already visible in a channel.
    pub fn message_content(&self) -> String {
        format!("🎁 {}\n{}", self.display_title(), self.url)
    }
}

/// Extract the link line from a previously delivered message body.
pub fn link_from_message(content: &str) -> Option<&str> {
    content.lines().nth(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_content() {
        let item = GiveawayItem::new("Win a console", "https://gleam.io/abc/console", "src");
        assert_eq!(
            item.message_content(),
            "🎁 Win a console\nhttps://gleam.io/abc/console"
        );
    }

    #[test]
    fn test_message_content_without_title() {
        let item = GiveawayItem::new("", "https://wn.nr/xyz", "src");
        assert_eq!(item.message_content(), "🎁 https://wn.nr/xyz\nhttps://wn.nr/xyz");
    }

    #[test]
    fn test_link_from_message() {
        let item = GiveawayItem::new("Prize", "https://example.com/go", "src");
        assert_eq!(
            link_from_message(&item.message_content()),
            Some("https://example.com/go")
        );
        assert_eq!(link_from_message("single line"), None);
    }
}
