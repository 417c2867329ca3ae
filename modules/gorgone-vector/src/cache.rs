use sha2::{Digest, Sha256};

/// Content hash keying the embedding cache: sha256 over the normalized
/// text, the author handle, and the item's hashtags in sorted order. Two
/// items with identical content collapse to one cache entry regardless of
/// provider or zone.
pub fn content_hash(text: &str, author_handle: &str, hashtags: &[String]) -> String {
    let mut tags: Vec<String> = hashtags.iter().map(|t| t.to_lowercase()).collect();
    tags.sort();
    tags.dedup();

    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    hasher.update(b"|");
    hasher.update(author_handle.to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(tags.join(",").as_bytes());
    hex::encode(hasher.finalize())
}

/// Lowercase and collapse runs of whitespace, so retweeted or re-encoded
/// copies of the same text hash identically.
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_under_whitespace_and_case() {
        let a = content_hash("Hello  World", "ada", &[]);
        let b = content_hash("hello world", "Ada", &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_ignores_hashtag_order_and_duplicates() {
        let a = content_hash("text", "ada", &["ai".to_string(), "rust".to_string()]);
        let b = content_hash(
            "text",
            "ada",
            &["Rust".to_string(), "ai".to_string(), "rust".to_string()],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn different_authors_hash_differently() {
        let a = content_hash("text", "ada", &[]);
        let b = content_hash("text", "grace", &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_hex_sha256() {
        let h = content_hash("x", "y", &[]);
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
