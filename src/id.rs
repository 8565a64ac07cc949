//! ID generation for tasks and checklist items.

use uuid::Uuid;

/// Minimum number of leading characters accepted for prefix lookup.
pub const MIN_PREFIX_LEN: usize = 8;

/// Generate a fresh task or checklist item identifier (UUID v4, hyphenated).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Check whether a string parses as a UUID.
pub fn is_valid_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Whether `candidate` is long enough to be used as an id prefix.
pub fn is_usable_prefix(candidate: &str) -> bool {
    candidate.chars().count() >= MIN_PREFIX_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_format() {
        let id = generate_id();
        assert_eq!(id.len(), 36);
        assert!(is_valid_id(&id));
    }

    #[test]
    fn test_generate_id_uniqueness() {
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn test_prefix_length() {
        assert!(!is_usable_prefix("abc1234"));
        assert!(is_usable_prefix("abc12345"));
    }

    #[test]
    fn test_invalid_id() {
        assert!(!is_valid_id("eg-1234567890"));
    }
}
