//! Object key layout.
//!
//! ```text
//! products/<ts>_<nonce>_<filename>
//! payment_screenshots/<ownerId>/<ts>_<nonce>_<filename>
//! ```
//!
//! `<ts>` is milliseconds since the Unix epoch and `<nonce>` is fresh per key,
//! so two uploads of the same filename in the same millisecond still get
//! distinct keys. Every caller-supplied segment is reduced to
//! `[A-Za-z0-9._-]`, so a key can never escape its prefix.

use uuid::Uuid;

const MAX_SEGMENT_CHARS: usize = 96;
const NONCE_CHARS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn product(ts_millis: i64, filename: &str) -> Self {
        ObjectKey(format!("products/{}", stamped(ts_millis, filename)))
    }

    pub fn payment_screenshot(owner_id: &str, ts_millis: i64, filename: &str) -> Self {
        ObjectKey(format!(
            "payment_screenshots/{}/{}",
            sanitize_segment(owner_id),
            stamped(ts_millis, filename)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the last `/`.
    pub fn directory(&self) -> &str {
        self.0.rsplit_once('/').map(|(d, _)| d).unwrap_or("")
    }

    /// Everything after the last `/`.
    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, f)| f).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn stamped(ts_millis: i64, filename: &str) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}",
        ts_millis,
        &nonce[..NONCE_CHARS],
        sanitize_segment(filename)
    )
}

/// Basename only, unsafe characters replaced with `_`, no leading dots,
/// bounded length. Empty input becomes `upload`.
pub fn sanitize_segment(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    let bounded: String = trimmed.chars().take(MAX_SEGMENT_CHARS).collect();
    if bounded.is_empty() {
        "upload".to_string()
    } else {
        bounded
    }
}
