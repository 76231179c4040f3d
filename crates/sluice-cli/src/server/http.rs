//! Validator headers and error bodies.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format(HTTP_DATE_FORMAT)
        .to_string()
}

/// Parse an `If-Modified-Since` value. Unparseable dates are ignored.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn unix_nanos(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

fn unix_secs(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Quoted hex SHA-256 of the logical path, the newest input write time and
/// the compiled output.
pub fn entity_tag(logical_path: &str, last_modified: SystemTime, compiled: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|", logical_path, unix_nanos(last_modified)));
    hasher.update(compiled);
    format!("\"{:x}\"", hasher.finalize())
}

/// Whether `If-None-Match` names `etag` (or is `*`).
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match
        .split(',')
        .map(|tag| tag.trim())
        .any(|tag| tag == "*" || tag == etag || tag.strip_prefix("W/") == Some(etag))
}

/// Whether the client's copy from `if_modified_since` is at least as new as
/// `last_modified`. HTTP dates have one-second resolution.
pub fn not_modified_since(if_modified_since: &str, last_modified: SystemTime) -> bool {
    parse_http_date(if_modified_since)
        .is_some_and(|since| since.timestamp() >= unix_secs(last_modified))
}

/// Wrap `message` in a block comment both CSS and JS ignore.
pub fn comment_body(message: &str) -> String {
    format!("/* {} */", message.replace("*/", "* /"))
}
