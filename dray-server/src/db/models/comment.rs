//! Shipment comment model with @mention extraction

use serde::{Deserialize, Serialize};
use shared::types::Timestamp;

/// A comment on a shipment, ordered by creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShipmentComment {
    pub id: String,
    pub shipment_id: String,
    pub organization_id: String,
    pub business_unit_id: String,
    pub user_id: String,
    pub text: String,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Explicit mention row extracted from a comment's `@username` tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShipmentCommentMention {
    pub id: String,
    pub comment_id: String,
    pub organization_id: String,
    pub business_unit_id: String,
    pub username: String,
    pub created_at: Timestamp,
}

/// Extract distinct `@username` mentions in order of first appearance.
///
/// A username token is `[A-Za-z0-9_.-]+` immediately following `@`; the `@`
/// must not be preceded by an alphanumeric (so emails are not mentions).
pub fn extract_mentions(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut out: Vec<String> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'@' {
            let preceded_by_word = i > 0 && (bytes[i - 1].is_ascii_alphanumeric());
            if !preceded_by_word {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric()
                        || bytes[end] == b'_'
                        || bytes[end] == b'.'
                        || bytes[end] == b'-')
                {
                    end += 1;
                }
                if end > start {
                    let name = &text[start..end];
                    if !out.iter().any(|n| n == name) {
                        out.push(name.to_string());
                    }
                    i = end;
                    continue;
                }
            }
        }
        i += 1;
    }
    out
}
