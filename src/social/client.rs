//! Twitter profile and timeline reads via the SocialData API.

use crate::types::{clean_handle, SavedTweet};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Public profile fields used for agent training.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TwitterUser {
    #[serde(default)]
    pub id_str: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub screen_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub profile_image_url_https: Option<String>,
    #[serde(default)]
    pub profile_banner_url: Option<String>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub friends_count: u64,
}

/// A tweet as returned by the search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FetchedTweet {
    pub id_str: String,
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub tweet_created_at: Option<String>,
    #[serde(default)]
    pub favorite_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub quote_count: u64,
}

impl FetchedTweet {
    pub fn to_saved(&self, handle: &str) -> SavedTweet {
        SavedTweet {
            id: self.id_str.clone(),
            handle: clean_handle(handle),
            content: self.full_text.clone(),
            posted_at: self.tweet_created_at.clone(),
            favorite_count: self.favorite_count,
            retweet_count: self.retweet_count,
            reply_count: self.reply_count,
            quote_count: self.quote_count,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetPage {
    #[serde(default)]
    pub tweets: Vec<FetchedTweet>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Read access to Twitter data.
#[async_trait]
pub trait TwitterSource: Send + Sync {
    async fn user_info(&self, handle: &str) -> Result<TwitterUser>;
    async fn search_page(&self, query: &str, cursor: Option<&str>) -> Result<TweetPage>;
}

/// Search query for a user's own tweets, replies excluded.
pub fn timeline_query(handle: &str) -> String {
    format!("from:{} -filter:replies", clean_handle(handle))
}

/// Collect up to `max_tweets` recent tweets over at most `max_pages` calls.
///
/// Stops early when a page has no cursor. A failing page ends the walk and
/// keeps what was already collected.
pub async fn fetch_user_tweets(
    source: &dyn TwitterSource,
    handle: &str,
    max_tweets: usize,
    max_pages: usize,
) -> Vec<FetchedTweet> {
    let query = timeline_query(handle);
    let mut tweets: Vec<FetchedTweet> = Vec::new();
    let mut cursor: Option<String> = None;

    for page in 1..=max_pages {
        match source.search_page(&query, cursor.as_deref()).await {
            Ok(result) => {
                debug!("Read {} tweets from {} (page {})", result.tweets.len(), handle, page);
                tweets.extend(result.tweets);
                cursor = result.next_cursor.filter(|c| !c.is_empty());
            }
            Err(e) => {
                warn!("Tweet page {} for {} failed: {:#}", page, handle, e);
                break;
            }
        }
        if cursor.is_none() || tweets.len() >= max_tweets {
            break;
        }
    }

    tweets.truncate(max_tweets);
    tweets
}

// ---------------------------------------------------------------------------
// SocialData HTTP client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SocialDataClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl SocialDataClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        if self.api_key.is_empty() {
            bail!("SocialData API key not configured");
        }
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("SocialData request to {path} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("SocialData {} failed ({}): {}", path, status, body);
        }
        Ok(resp)
    }
}

#[async_trait]
impl TwitterSource for SocialDataClient {
    async fn user_info(&self, handle: &str) -> Result<TwitterUser> {
        let handle = clean_handle(handle);
        let resp = self.get(&format!("/twitter/user/{handle}"), &[]).await?;
        let user: TwitterUser = resp.json().await.context("Failed to parse Twitter user")?;
        info!("Fetched Twitter profile for {}", handle);
        Ok(user)
    }

    async fn search_page(&self, query: &str, cursor: Option<&str>) -> Result<TweetPage> {
        let mut params = vec![("query", query), ("type", "Latest")];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        let resp = self.get("/twitter/search", &params).await?;
        resp.json().await.context("Failed to parse tweet search page")
    }
}
