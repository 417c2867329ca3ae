use serde_json::Value;

use gorgone_common::types::{CanonicalItem, CounterSet, Provider};
use newswire_client::ArticlePayload;

use super::ParseError;
use crate::extract;

pub const PROVIDER: Provider = Provider::News;

/// Map one news article into the canonical item model. Articles carry no
/// author account and no engagement counters; the source name survives in
/// the raw payload for downstream consumers.
pub fn parse_item(article: &ArticlePayload) -> Result<CanonicalItem, ParseError> {
    let provider_item_id = article
        .article_id
        .clone()
        .or_else(|| article.url.clone())
        .ok_or(ParseError::MissingField("articleId"))?;

    let title = article.title.clone().unwrap_or_default();
    let body = article.body.clone().unwrap_or_default();
    if title.is_empty() && body.is_empty() {
        return Err(ParseError::MissingField("title"));
    }
    let text = if body.is_empty() {
        title
    } else if title.is_empty() {
        body
    } else {
        format!("{title}\n\n{body}")
    };

    let created_at_source = article
        .published_at
        .ok_or(ParseError::MissingField("publishedAt"))?;

    Ok(CanonicalItem {
        provider: PROVIDER,
        provider_item_id,
        entities: extract::entities_from_text(&text),
        has_links: article.url.is_some() || extract::has_links(&text),
        language: article.language.clone(),
        created_at_source,
        reply_to_provider_item_id: None,
        counters: CounterSet::default(),
        raw_payload: serde_json::to_value(article).unwrap_or(Value::Null),
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn article_concatenates_title_and_body() {
        let article: ArticlePayload = serde_json::from_value(json!({
            "articleId": "A1",
            "title": "Headline",
            "body": "The body.",
            "publishedAt": "2026-07-29T08:00:00Z",
            "url": "https://news.example.com/a1"
        }))
        .unwrap();

        let item = parse_item(&article).unwrap();
        assert_eq!(item.provider_item_id, "A1");
        assert_eq!(item.text, "Headline\n\nThe body.");
        assert!(item.has_links);
        assert!(item.counters.is_zero());
    }

    #[test]
    fn url_is_the_fallback_id() {
        let article: ArticlePayload = serde_json::from_value(json!({
            "title": "Headline",
            "publishedAt": "2026-07-29T08:00:00Z",
            "url": "https://news.example.com/a1"
        }))
        .unwrap();
        let item = parse_item(&article).unwrap();
        assert_eq!(item.provider_item_id, "https://news.example.com/a1");
    }

    #[test]
    fn empty_articles_are_parse_errors() {
        let article: ArticlePayload = serde_json::from_value(json!({
            "articleId": "A1",
            "publishedAt": "2026-07-29T08:00:00Z"
        }))
        .unwrap();
        assert_eq!(parse_item(&article), Err(ParseError::MissingField("title")));

        let article: ArticlePayload =
            serde_json::from_value(json!({"title": "x", "publishedAt": "2026-07-29T08:00:00Z"}))
                .unwrap();
        assert_eq!(
            parse_item(&article),
            Err(ParseError::MissingField("articleId"))
        );
    }
}
