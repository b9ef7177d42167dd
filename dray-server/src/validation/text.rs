//! Text length limits and helpers
//!
//! Centralized limits for free-text columns. Postgres TEXT has no built-in
//! length enforcement, so the caps live here.

use crate::core::error::{MultiError, ValidationCode};

/// Entity names, BOL, reason labels
pub const MAX_NAME_LEN: usize = 200;

/// Notes, cancel reasons, comments
pub const MAX_NOTE_LEN: usize = 500;

/// Address lines
pub const MAX_ADDRESS_LEN: usize = 500;

/// Require a non-empty value within the length cap.
pub fn require_text(value: &str, field: &str, max_len: usize, multi: &mut MultiError) {
    if value.trim().is_empty() {
        multi.add(field, ValidationCode::Required, format!("{field} must not be empty"));
        return;
    }
    cap_text(value, field, max_len, multi);
}

/// Enforce only the length cap.
pub fn cap_text(value: &str, field: &str, max_len: usize, multi: &mut MultiError) {
    if value.len() > max_len {
        multi.add(
            field,
            ValidationCode::Invalid,
            format!("{field} is too long ({} chars, max {max_len})", value.len()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_text_flags_empty_and_long() {
        let mut multi = MultiError::new();
        require_text("  ", "bol", MAX_NAME_LEN, &mut multi);
        require_text(&"x".repeat(MAX_NAME_LEN + 1), "bol", MAX_NAME_LEN, &mut multi);
        require_text("BOL-1", "bol", MAX_NAME_LEN, &mut multi);
        assert_eq!(multi.len(), 2);
    }
}
