use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use gorgone_common::ratelimit::TokenBucket;
use gorgone_common::types::{CounterSet, Provider, RuleKind};
use gorgone_store::RuleRow;
use gorgone_tracker::CounterFetcher;
use newswire_client::{ArticleQuery, NewswireClient};
use tikapi_client::TikApiClient;
use twitterapi_client::{RuleInput, TwitterApiClient};

use crate::adapters::{news, tweet, video};
use crate::traits::{ParsedEntry, ProviderSearch, RuleMirror, SearchPage};

/// The three provider clients behind their token buckets. Each worker pool
/// constructs its own instance at startup; the buckets are shared through
/// clones of this struct, never through globals.
#[derive(Clone)]
pub struct ProviderClients {
    twitter: Arc<TwitterApiClient>,
    video: Arc<TikApiClient>,
    news: Arc<NewswireClient>,
    tweet_bucket: Arc<TokenBucket>,
    video_bucket: Arc<TokenBucket>,
    news_bucket: Arc<TokenBucket>,
    /// How long a caller will wait for a rate-limit token before treating
    /// the attempt as a retryable failure.
    acquire_deadline: Duration,
}

impl ProviderClients {
    pub fn new(twitter: TwitterApiClient, video: TikApiClient, news: NewswireClient) -> Self {
        Self {
            twitter: Arc::new(twitter),
            video: Arc::new(video),
            news: Arc::new(news),
            // Defaults sized to the providers' documented request budgets.
            tweet_bucket: Arc::new(TokenBucket::new(5.0, 10)),
            video_bucket: Arc::new(TokenBucket::new(2.0, 4)),
            news_bucket: Arc::new(TokenBucket::new(1.0, 2)),
            acquire_deadline: Duration::from_secs(20),
        }
    }

    pub fn with_rates(
        mut self,
        tweet_per_sec: f64,
        video_per_sec: f64,
        news_per_sec: f64,
    ) -> Self {
        self.tweet_bucket = Arc::new(TokenBucket::new(tweet_per_sec, tweet_per_sec.ceil() as u32 * 2));
        self.video_bucket = Arc::new(TokenBucket::new(video_per_sec, video_per_sec.ceil() as u32 * 2));
        self.news_bucket = Arc::new(TokenBucket::new(news_per_sec, news_per_sec.ceil() as u32 * 2));
        self
    }

    async fn take_token(&self, provider: Provider) -> Result<()> {
        let bucket = match provider {
            Provider::Tweet => &self.tweet_bucket,
            Provider::Video => &self.video_bucket,
            Provider::News => &self.news_bucket,
        };
        bucket
            .acquire(self.acquire_deadline)
            .await
            .map_err(|_| anyhow!("rate limit deadline exceeded for {provider}"))
    }
}

#[async_trait]
impl ProviderSearch for ProviderClients {
    async fn fetch_page(
        &self,
        rule: &RuleRow,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<SearchPage> {
        let provider = rule
            .provider()
            .ok_or_else(|| anyhow!("rule {} has unknown provider {}", rule.id, rule.provider))?;
        let kind = rule
            .kind()
            .ok_or_else(|| anyhow!("rule {} has unknown kind {}", rule.id, rule.kind))?;

        self.take_token(provider).await?;

        match provider {
            Provider::Tweet => {
                let resp = self
                    .twitter
                    .search(&rule.query_spec, cursor, page_size)
                    .await?;
                let entries = resp
                    .tweets
                    .iter()
                    .filter_map(|payload| match tweet::parse_item(payload) {
                        Ok(item) => Some(ParsedEntry {
                            item,
                            author: tweet::parse_author(payload).ok(),
                        }),
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping unparseable tweet in search page");
                            None
                        }
                    })
                    .collect();
                Ok(SearchPage {
                    entries,
                    next_cursor: resp.next_cursor.filter(|_| resp.has_next_page),
                })
            }
            Provider::Video => {
                let query = rule.query_spec.as_str();
                let resp = match kind {
                    RuleKind::Hashtag => {
                        let tag = query.strip_prefix('#').unwrap_or(query);
                        self.video.search_hashtag(tag, cursor, page_size).await?
                    }
                    RuleKind::User => {
                        let handle = query.strip_prefix('@').unwrap_or(query);
                        self.video.user_videos(handle, cursor, page_size).await?
                    }
                    _ => self.video.search_keyword(query, cursor, page_size).await?,
                };
                let entries = resp
                    .items
                    .iter()
                    .filter_map(|payload| match video::parse_item(payload) {
                        Ok(item) => Some(ParsedEntry {
                            item,
                            author: video::parse_author(payload).ok(),
                        }),
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping unparseable video in search page");
                            None
                        }
                    })
                    .collect();
                Ok(SearchPage {
                    entries,
                    next_cursor: resp.cursor.filter(|_| resp.has_more),
                })
            }
            Provider::News => {
                // News pagination is page-numbered; the cursor carries the
                // next page index.
                let page: u32 = cursor.and_then(|c| c.parse().ok()).unwrap_or(1);
                let resp = self
                    .news
                    .search(&ArticleQuery::new(rule.query_spec.clone(), page, page_size))
                    .await?;
                let full_page = resp.articles.len() as u32 >= page_size;
                let entries: Vec<ParsedEntry> = resp
                    .articles
                    .iter()
                    .filter_map(|payload| match news::parse_item(payload) {
                        Ok(item) => Some(ParsedEntry { item, author: None }),
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping unparseable article in search page");
                            None
                        }
                    })
                    .collect();
                Ok(SearchPage {
                    entries,
                    next_cursor: full_page.then(|| (page + 1).to_string()),
                })
            }
        }
    }
}

#[async_trait]
impl CounterFetcher for ProviderClients {
    async fn fetch_counters(
        &self,
        provider: Provider,
        provider_item_id: &str,
    ) -> Result<Option<CounterSet>> {
        self.take_token(provider).await?;

        match provider {
            Provider::Tweet => {
                let Some(payload) = self.twitter.get_tweet(provider_item_id).await? else {
                    return Ok(None);
                };
                Ok(Some(CounterSet {
                    view: payload.view_count.unwrap_or(0),
                    like: payload.like_count.unwrap_or(0),
                    share: payload.retweet_count.unwrap_or(0),
                    comment: payload.reply_count.unwrap_or(0),
                    quote: payload.quote_count.unwrap_or(0),
                    bookmark: payload.bookmark_count.unwrap_or(0),
                    collect: 0,
                }))
            }
            Provider::Video => {
                let Some(payload) = self.video.video(provider_item_id).await? else {
                    return Ok(None);
                };
                let stats = payload.stats.unwrap_or_default();
                Ok(Some(CounterSet {
                    view: stats.play_count.unwrap_or(0),
                    like: stats.digg_count.unwrap_or(0),
                    share: stats.share_count.unwrap_or(0),
                    comment: stats.comment_count.unwrap_or(0),
                    quote: 0,
                    bookmark: 0,
                    collect: stats.collect_count.unwrap_or(0),
                }))
            }
            // The news provider exposes no live counters; zero deltas let
            // the tier schedule wind the item down naturally.
            Provider::News => Ok(Some(CounterSet::default())),
        }
    }
}

#[async_trait]
impl RuleMirror for ProviderClients {
    async fn create(&self, rule: &RuleRow) -> Result<String> {
        self.take_token(Provider::Tweet).await?;
        let created = self
            .twitter
            .create_rule(&RuleInput {
                tag: rule.name.clone(),
                value: rule.query_spec.clone(),
                interval_seconds: rule.interval_seconds,
                is_effect: Some(rule.is_active),
            })
            .await?;
        Ok(created.rule_id)
    }

    async fn update(&self, external_id: &str, rule: &RuleRow, active: bool) -> Result<()> {
        self.take_token(Provider::Tweet).await?;
        self.twitter
            .update_rule(
                external_id,
                &RuleInput {
                    tag: rule.name.clone(),
                    value: rule.query_spec.clone(),
                    interval_seconds: rule.interval_seconds,
                    is_effect: Some(active),
                },
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, external_id: &str) -> Result<()> {
        self.take_token(Provider::Tweet).await?;
        self.twitter.delete_rule(external_id).await?;
        Ok(())
    }
}
