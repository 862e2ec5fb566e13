//! Validation utilities.

use crate::types::{CommunityError, CommunityResult};

/// Validation utilities
pub struct Validator;

impl Validator {
    /// Validate message text; returns the trimmed body that gets stored
    pub fn message_text(text: &str, max_length: usize) -> CommunityResult<&str> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CommunityError::validation("Message text cannot be empty"));
        }

        if trimmed.chars().count() > max_length {
            return Err(CommunityError::validation(format!(
                "Message text too long (max {max_length} characters)"
            )));
        }

        Ok(trimmed)
    }

    /// Clamp paging input: missing limit falls back to the default, offsets never go negative
    pub fn page_bounds(limit: Option<i64>, offset: Option<i64>, default_limit: i64, max_limit: i64) -> (i64, i64) {
        let limit = limit.unwrap_or(default_limit).clamp(1, max_limit.max(1));
        let offset = offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_text() {
        assert_eq!(Validator::message_text("  hi there \n", 10).unwrap(), "hi there");
        assert!(Validator::message_text("   \t", 10).is_err());
        assert!(Validator::message_text("", 10).is_err());
        assert!(Validator::message_text("elevenchars", 10).is_err());
        // counted in characters, not bytes
        assert!(Validator::message_text("ééééé", 5).is_ok());
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(Validator::page_bounds(None, None, 50, 200), (50, 0));
        assert_eq!(Validator::page_bounds(Some(0), Some(-4), 50, 200), (1, 0));
        assert_eq!(Validator::page_bounds(Some(1000), Some(30), 50, 200), (200, 30));
    }
}
