//! Line parser: turns one raw log line into a structured [`LogEvent`].
//!
//! Accepted shape is `[<timestamp>] <LEVEL> <message>`. Lines that do not
//! match, or whose timestamp is in neither supported format, are skipped.
//! Everything after the timestamp degrades gracefully: a broken inline JSON
//! object is left in the message, a missing IP is simply `None`.

mod keywords;

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;

pub use keywords::KeywordList;

static RE_LOG_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]\s+(\w+)\s+(.*)").unwrap());
static RE_IPV4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap());

const PLAIN_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One parsed log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub file_id: i64,
    pub timestamp: DateTime<Utc>,
    /// Upper-cased level token.
    pub level: String,
    /// Message with any parseable trailing JSON object removed.
    pub message: String,
    /// First configured keyword found in the message.
    pub keyword: Option<String>,
    pub ip: Option<String>,
}

/// Stateless parser bound to a keyword list.
#[derive(Debug, Clone, Default)]
pub struct LineParser {
    keywords: KeywordList,
}

impl LineParser {
    pub fn new(keywords: KeywordList) -> Self {
        Self { keywords }
    }

    pub fn keywords(&self) -> &KeywordList {
        &self.keywords
    }

    /// Parses a single line. Returns `None` when the line is not a log record.
    pub fn parse(&self, line: &str, file_id: i64) -> Option<LogEvent> {
        let caps = RE_LOG_LINE.captures(line)?;
        let timestamp = parse_timestamp(&caps[1])?;
        let level = caps[2].to_uppercase();
        let mut message = caps[3].to_string();

        let mut ip = None;
        if let Some(json_start) = message.find('{') {
            if let Ok(payload) =
                serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(
                    &message[json_start..],
                )
            {
                ip = payload.get("ip").and_then(json_ip);
                message = message[..json_start].trim().to_string();
            }
        }

        if ip.is_none() {
            ip = RE_IPV4.find(&message).map(|m| m.as_str().to_string());
        }

        let keyword = self.keywords.detect(&message).map(str::to_string);

        Some(LogEvent {
            file_id,
            timestamp,
            level,
            message,
            keyword,
            ip,
        })
    }
}

/// Tries RFC 3339 first, then `YYYY-MM-DD HH:MM:SS` interpreted as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, PLAIN_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn json_ip(value: &serde_json::Value) -> Option<String> {
    let ip = match value {
        serde_json::Value::Null => return None,
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    (!ip.is_empty()).then_some(ip)
}
