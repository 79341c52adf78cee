use uuid::Uuid;

pub const RESET_KEY_LENGTH: usize = 10;

/// Shortest stored key that verification will accept.
pub const MIN_RESET_KEY_LENGTH: usize = 5;

/// Generates a reset key from the hex form of a v4 UUID.
///
/// Only 40 bits survive the truncation, which is fine for short lived, rate limited
/// verification links and nothing else.
pub fn make_key() -> String {
    let mut key = Uuid::new_v4().simple().to_string();
    key.truncate(RESET_KEY_LENGTH);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn key_is_ten_hex_characters() {
        let key = make_key();
        assert_eq!(key.len(), RESET_KEY_LENGTH);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn sampled_keys_are_distinct() {
        let keys: HashSet<String> = (0..1000).map(|_| make_key()).collect();
        assert_eq!(keys.len(), 1000);
    }
}
