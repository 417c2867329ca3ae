use chrono::{DateTime, Utc};
use serde_json::Value;

use gorgone_common::types::{CanonicalAuthor, CanonicalItem, CounterSet, Provider};
use twitterapi_client::TweetPayload;

use super::ParseError;
use crate::extract;

pub const PROVIDER: Provider = Provider::Tweet;

/// A webhook delivery reduced to its rule id and tweet list, whichever of
/// the accepted payload shapes it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookBatch {
    pub rule_id: Option<String>,
    pub tweets: Vec<TweetPayload>,
}

/// Parse a webhook body. The accepted shapes are tried in a fixed order:
/// bare array, `{tweets: […]}`, `{results: […]}`, `{tweet: {…}}`. Anything
/// else is a parse error.
pub fn parse_webhook(body: &Value) -> Result<WebhookBatch, ParseError> {
    if let Some(array) = body.as_array() {
        return Ok(WebhookBatch {
            rule_id: None,
            tweets: parse_tweet_array(array)?,
        });
    }

    let Some(object) = body.as_object() else {
        return Err(ParseError::UnrecognizedShape);
    };
    let rule_id = object
        .get("rule_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(tweets) = object.get("tweets").and_then(Value::as_array) {
        return Ok(WebhookBatch {
            rule_id,
            tweets: parse_tweet_array(tweets)?,
        });
    }
    if let Some(results) = object.get("results").and_then(Value::as_array) {
        return Ok(WebhookBatch {
            rule_id,
            tweets: parse_tweet_array(results)?,
        });
    }
    if let Some(single) = object.get("tweet").filter(|v| v.is_object()) {
        let tweet: TweetPayload =
            serde_json::from_value(single.clone()).map_err(|_| ParseError::UnrecognizedShape)?;
        return Ok(WebhookBatch {
            rule_id,
            tweets: vec![tweet],
        });
    }

    Err(ParseError::UnrecognizedShape)
}

fn parse_tweet_array(values: &[Value]) -> Result<Vec<TweetPayload>, ParseError> {
    values
        .iter()
        .map(|v| serde_json::from_value(v.clone()).map_err(|_| ParseError::UnrecognizedShape))
        .collect()
}

/// Map one tweet into the canonical item model.
pub fn parse_item(tweet: &TweetPayload) -> Result<CanonicalItem, ParseError> {
    let provider_item_id = tweet
        .id
        .clone()
        .ok_or(ParseError::MissingField("id"))?;
    let text = tweet
        .content()
        .ok_or(ParseError::MissingField("text"))?
        .to_string();
    let created_at_source = match tweet.created_at.as_deref() {
        Some(raw) => parse_created_at(raw)?,
        None => Utc::now(),
    };

    let counters = CounterSet {
        view: tweet.view_count.unwrap_or(0),
        like: tweet.like_count.unwrap_or(0),
        share: tweet.retweet_count.unwrap_or(0),
        comment: tweet.reply_count.unwrap_or(0),
        quote: tweet.quote_count.unwrap_or(0),
        bookmark: tweet.bookmark_count.unwrap_or(0),
        collect: 0,
    };

    Ok(CanonicalItem {
        provider: PROVIDER,
        provider_item_id,
        entities: extract::entities_from_text(&text),
        has_links: extract::has_links(&text),
        language: tweet.lang.clone(),
        created_at_source,
        reply_to_provider_item_id: tweet.in_reply_to_id.clone(),
        counters,
        raw_payload: serde_json::to_value(tweet).unwrap_or(Value::Null),
        text,
    })
}

/// Map the author nested in a tweet. Handles are lowercased; the provider
/// keeps original casing in the display name.
pub fn parse_author(tweet: &TweetPayload) -> Result<CanonicalAuthor, ParseError> {
    let user = tweet.user.as_ref().ok_or(ParseError::MissingField("user"))?;
    let provider_user_id = user.id.clone().ok_or(ParseError::MissingField("user.id"))?;
    let handle = user
        .handle()
        .ok_or(ParseError::MissingField("user.userName"))?
        .to_lowercase();

    Ok(CanonicalAuthor {
        provider: PROVIDER,
        provider_user_id,
        display_name: user.name.clone().unwrap_or_else(|| handle.clone()),
        handle,
        verified: user.is_verified,
        follower_count: user.followers.unwrap_or(0),
        following_count: user.following.unwrap_or(0),
        heart_count: user.favourites_count.unwrap_or(0),
        post_count: user.statuses_count.unwrap_or(0),
        location: user.location.clone(),
        language: None,
    })
}

/// The provider emits either RFC 3339 or the classic
/// `Wed Oct 10 20:19:24 +0000 2018` form depending on payload generation.
fn parse_created_at(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y")
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| ParseError::InvalidTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gorgone_common::types::EntityKind;
    use serde_json::json;

    #[test]
    fn webhook_shapes_are_tried_in_fixed_order() {
        // Bare array carries no rule id.
        let batch = parse_webhook(&json!([{"id": "T1", "text": "hi"}])).unwrap();
        assert_eq!(batch.rule_id, None);
        assert_eq!(batch.tweets.len(), 1);

        // {tweets: […]}
        let batch =
            parse_webhook(&json!({"rule_id": "R1", "tweets": [{"id": "T1", "text": "hi"}]}))
                .unwrap();
        assert_eq!(batch.rule_id.as_deref(), Some("R1"));
        assert_eq!(batch.tweets.len(), 1);

        // {results: […]}
        let batch =
            parse_webhook(&json!({"rule_id": "R2", "results": [{"id": "a"}, {"id": "b"}]}))
                .unwrap();
        assert_eq!(batch.rule_id.as_deref(), Some("R2"));
        assert_eq!(batch.tweets.len(), 2);

        // {tweet: {…}}
        let batch = parse_webhook(&json!({"tweet": {"id": "T9", "text": "solo"}})).unwrap();
        assert_eq!(batch.tweets.len(), 1);
        assert_eq!(batch.tweets[0].id.as_deref(), Some("T9"));
    }

    #[test]
    fn unknown_shapes_are_parse_errors() {
        assert_eq!(
            parse_webhook(&json!({"items": []})),
            Err(ParseError::UnrecognizedShape)
        );
        assert_eq!(
            parse_webhook(&json!("just a string")),
            Err(ParseError::UnrecognizedShape)
        );
    }

    #[test]
    fn item_parses_counters_and_entities() {
        let tweet: TweetPayload = serde_json::from_value(json!({
            "id": "T1",
            "text": "hi #ai check https://x.test/1",
            "createdAt": "2026-07-30T12:00:00Z",
            "likeCount": 5,
            "retweetCount": 2,
            "replyCount": 1,
            "viewCount": 900
        }))
        .unwrap();

        let item = parse_item(&tweet).unwrap();
        assert_eq!(item.provider_item_id, "T1");
        assert_eq!(item.counters.like, 5);
        assert_eq!(item.counters.share, 2);
        assert_eq!(item.counters.view, 900);
        assert!(item.has_links);
        assert_eq!(item.entities.len(), 1);
        assert_eq!(item.entities[0].kind, EntityKind::Hashtag);
        assert_eq!(item.entities[0].normalized_value, "ai");
    }

    #[test]
    fn item_without_id_is_a_parse_error() {
        let tweet: TweetPayload = serde_json::from_value(json!({"text": "hi"})).unwrap();
        assert_eq!(parse_item(&tweet), Err(ParseError::MissingField("id")));
    }

    #[test]
    fn author_handle_is_lowercased() {
        let tweet: TweetPayload = serde_json::from_value(json!({
            "id": "T1",
            "text": "hi",
            "user": {"id": "U1", "userName": "Ada", "followers": 10}
        }))
        .unwrap();

        let author = parse_author(&tweet).unwrap();
        assert_eq!(author.handle, "ada");
        assert_eq!(author.display_name, "ada");
        assert_eq!(author.follower_count, 10);
    }

    #[test]
    fn legacy_timestamp_format_is_accepted() {
        let parsed = parse_created_at("Wed Oct 10 20:19:24 +0000 2018").unwrap();
        assert_eq!(parsed.timestamp(), 1539202764);

        assert!(parse_created_at("not a date").is_err());
    }
}
