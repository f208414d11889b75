//! Permissive decoding of persisted documents.
//!
//! Persisted files are decoded record by record. Anything malformed is
//! dropped and described in the returned report instead of failing the load;
//! a document that is not JSON at all decodes to the empty state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One delivery of a URL into a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub channel_id: u64,
    pub message_id: u64,
}

/// Decoded value plus a description of every record that was dropped.
#[derive(Debug, Default)]
pub struct Decoded<T> {
    pub value: T,
    pub dropped: Vec<String>,
}

impl<T> Decoded<T> {
    fn drop_record(&mut self, what: impl Into<String>) {
        self.dropped.push(what.into());
    }
}

/// Contents of the state store file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StateSnapshot {
    pub seen: BTreeSet<String>,
    pub posts: BTreeMap<String, Vec<PostRecord>>,
    pub usage: BTreeMap<String, Vec<f64>>,
}

/// Decode the state store document.
///
/// Accepts the object layout `{seen, posts, usage}` and the legacy bare
/// array of seen URLs.
pub fn decode_state(json: &str) -> Decoded<StateSnapshot> {
    let mut out = Decoded::<StateSnapshot>::default();

    let root: Value = match serde_json::from_str(json) {
        Ok(root) => root,
        Err(e) => {
            out.drop_record(format!("document: {e}"));
            return out;
        }
    };

    match root {
        Value::Array(items) => out.value.seen = decode_seen(&items, &mut out.dropped),
        Value::Object(map) => {
            match map.get("seen") {
                Some(Value::Array(items)) => {
                    out.value.seen = decode_seen(items, &mut out.dropped)
                }
                Some(_) => out.drop_record("seen: not an array"),
                None => {}
            }
            match map.get("posts") {
                Some(Value::Object(posts)) => {
                    out.value.posts = decode_posts(posts, &mut out.dropped)
                }
                Some(_) => out.drop_record("posts: not an object"),
                None => {}
            }
            match map.get("usage") {
                Some(Value::Object(usage)) => {
                    out.value.usage = decode_usage(usage, &mut out.dropped)
                }
                Some(_) => out.drop_record("usage: not an object"),
                None => {}
            }
        }
        _ => out.drop_record("document: not an object or array"),
    }

    out
}

/// Decode the channel registry document `{"channels": {group: channel}}`.
pub fn decode_channels(json: &str) -> Decoded<BTreeMap<String, u64>> {
    let mut out = Decoded::<BTreeMap<String, u64>>::default();

    let root: Value = match serde_json::from_str(json) {
        Ok(root) => root,
        Err(e) => {
            out.drop_record(format!("document: {e}"));
            return out;
        }
    };

    let Some(Value::Object(channels)) = root.get("channels") else {
        out.drop_record("channels: missing or not an object");
        return out;
    };

    for (group, channel) in channels {
        match as_id(channel) {
            Some(id) => {
                out.value.insert(group.clone(), id);
            }
            None => out.drop_record(format!("channels.{group}: invalid channel id")),
        }
    }
    out
}

fn decode_seen(items: &[Value], dropped: &mut Vec<String>) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    for (i, item) in items.iter().enumerate() {
        match item {
            Value::String(s) if !s.is_empty() => {
                seen.insert(s.clone());
            }
            Value::Number(n) => {
                seen.insert(n.to_string());
            }
            _ => dropped.push(format!("seen[{i}]: not a URL")),
        }
    }
    seen
}

fn decode_posts(
    posts: &Map<String, Value>,
    dropped: &mut Vec<String>,
) -> BTreeMap<String, Vec<PostRecord>> {
    let mut out = BTreeMap::new();
    for (url, entries) in posts {
        let Value::Array(entries) = entries else {
            dropped.push(format!("posts.{url}: not an array"));
            continue;
        };

        let mut records = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let record = entry.as_object().and_then(|rec| {
                Some(PostRecord {
                    channel_id: as_id(rec.get("channel_id")?)?,
                    message_id: as_id(rec.get("message_id")?)?,
                })
            });
            match record {
                Some(record) => records.push(record),
                None => dropped.push(format!("posts.{url}[{i}]: invalid record")),
            }
        }

        if records.is_empty() {
            dropped.push(format!("posts.{url}: no valid records"));
        } else {
            out.insert(url.clone(), records);
        }
    }
    out
}

fn decode_usage(usage: &Map<String, Value>, dropped: &mut Vec<String>) -> BTreeMap<String, Vec<f64>> {
    let mut out = BTreeMap::new();
    for (key, stamps) in usage {
        let Value::Array(stamps) = stamps else {
            dropped.push(format!("usage.{key}: not an array"));
            continue;
        };

        let mut times = Vec::with_capacity(stamps.len());
        for (i, stamp) in stamps.iter().enumerate() {
            let time = match stamp {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            match time.filter(|t| t.is_finite()) {
                Some(t) => times.push(t),
                None => dropped.push(format!("usage.{key}[{i}]: not a timestamp")),
            }
        }
        out.insert(key.clone(), times);
    }
    out
}

/// Non-negative integer id, given as a JSON number or a string of digits.
fn as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
            s.parse().ok()
        }
        _ => None,
    }
}
