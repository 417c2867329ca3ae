use std::sync::OnceLock;

use regex::Regex;

use gorgone_common::types::{CanonicalEntity, EntityKind};

fn hashtag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#(\w+)").expect("hashtag regex compiles"))
}

fn mention_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(\w+)").expect("mention regex compiles"))
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").expect("link regex compiles"))
}

/// Extract hashtags and mentions from item text. Values keep their original
/// casing; normalization for dedup happens in the entity constructor.
pub fn entities_from_text(text: &str) -> Vec<CanonicalEntity> {
    let mut entities = Vec::new();
    for capture in hashtag_re().captures_iter(text) {
        entities.push(CanonicalEntity::new(EntityKind::Hashtag, &capture[1]));
    }
    for capture in mention_re().captures_iter(text) {
        entities.push(CanonicalEntity::new(EntityKind::Mention, &capture[1]));
    }
    entities
}

pub fn has_links(text: &str) -> bool {
    link_re().is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_hashtags_and_mentions() {
        let entities = entities_from_text("hi #AI and @Ada, also #rust_lang");
        let hashtags: Vec<_> = entities
            .iter()
            .filter(|e| e.kind == EntityKind::Hashtag)
            .map(|e| e.normalized_value.as_str())
            .collect();
        let mentions: Vec<_> = entities
            .iter()
            .filter(|e| e.kind == EntityKind::Mention)
            .map(|e| e.normalized_value.as_str())
            .collect();
        assert_eq!(hashtags, vec!["ai", "rust_lang"]);
        assert_eq!(mentions, vec!["ada"]);
    }

    #[test]
    fn keeps_original_casing_in_value() {
        let entities = entities_from_text("#MutualAid");
        assert_eq!(entities[0].value, "MutualAid");
        assert_eq!(entities[0].normalized_value, "mutualaid");
    }

    #[test]
    fn plain_text_has_no_entities() {
        assert!(entities_from_text("nothing to see here").is_empty());
    }

    #[test]
    fn detects_links() {
        assert!(has_links("read this https://example.com/a"));
        assert!(has_links("http://example.com"));
        assert!(!has_links("no links here"));
    }
}
