// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Normalize a campaign URL for deduplication and posting.
///
/// Keeps scheme, host and path; drops query string and fragment. Inputs
/// without a scheme are treated as `https`. Unparseable input is returned
/// unchanged.
///
/// # Examples
/// ```
/// use giveaway_scanner::utils::url::normalize;
///
/// assert_eq!(
///     normalize("https://gleam.io/comp/abc?ref=123#frag"),
///     "https://gleam.io/comp/abc"
/// );
/// ```
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).or_else(|e| match e {
        url::ParseError::RelativeUrlWithoutBase => {
            Url::parse(&format!("https://{}", trimmed.trim_start_matches("//")))
        }
        other => Err(other),
    });

    match parsed {
        Ok(mut url) if url.has_host() => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        _ => raw.to_string(),
    }
}

/// Lowercased host of a URL, if it has one.
pub fn host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Check whether `host` is `expected` or `www.{expected}`, ignoring case.
pub fn host_matches(host: &str, expected: &str) -> bool {
    let host = host.to_lowercase();
    let bare = host.strip_prefix("www.").unwrap_or(&host);
    bare == expected.to_lowercase()
}

/// First path segment of a URL, lowercased. The root path yields `""`.
pub fn first_path_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let first = parsed
        .path_segments()
        .and_then(|mut segments| segments.next())
        .unwrap_or("");
    Some(first.to_lowercase())
}
