//! Tweet statistics and the training dataset built from a profile.

use crate::social::{fetch_user_tweets, FetchedTweet, TwitterSource, TwitterUser};
use crate::types::{clean_handle, good_twitter_image};
use anyhow::{bail, Result};
use serde::Serialize;

/// Tweets included in the dataset's content samples.
const CONTENT_SAMPLE_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WritingStyle {
    pub average_tweet_length: f64,
    pub hashtags_per_tweet: f64,
    pub mentions_per_tweet: f64,
    pub uses_emojis: bool,
    pub uses_hashtags: bool,
    pub uses_mentions: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementMetrics {
    pub average_likes: f64,
    pub average_retweets: f64,
    pub average_replies: f64,
    pub average_quotes: f64,
    pub total_engagement: u64,
    /// Total engagement divided by tweet count.
    pub engagement_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileInfo {
    pub handle: String,
    pub display_name: String,
    pub bio: String,
    pub profile_image: Option<String>,
    pub cover_image: Option<String>,
    pub follower_count: u64,
    pub following_count: u64,
}

/// Everything the trainer needs to derive a persona from Twitter.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingDataset {
    pub profile: ProfileInfo,
    pub content_samples: Vec<String>,
    pub writing_style: Option<WritingStyle>,
    pub engagement: Option<EngagementMetrics>,
    #[serde(skip)]
    pub tweets: Vec<FetchedTweet>,
}

/// Count `#tag` or `@name` tokens: the sigil followed by a word character.
fn count_tagged(text: &str, sigil: char) -> usize {
    let mut count = 0;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == sigil && chars.peek().is_some_and(|n| n.is_alphanumeric() || *n == '_') {
            count += 1;
        }
    }
    count
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1FAFF
        | 0x2600..=0x27BF
        | 0x1F1E6..=0x1F1FF
        | 0x2B50 | 0x2B55 | 0x203C | 0x2049 | 0x2122 | 0x2139 | 0x3030 | 0x303D)
}

pub fn analyze_writing_style(texts: &[String]) -> Option<WritingStyle> {
    if texts.is_empty() {
        return None;
    }
    let n = texts.len() as f64;
    let total_len: usize = texts.iter().map(|t| t.chars().count()).sum();
    let hashtags: usize = texts.iter().map(|t| count_tagged(t, '#')).sum();
    let mentions: usize = texts.iter().map(|t| count_tagged(t, '@')).sum();

    Some(WritingStyle {
        average_tweet_length: total_len as f64 / n,
        hashtags_per_tweet: hashtags as f64 / n,
        mentions_per_tweet: mentions as f64 / n,
        uses_emojis: texts.iter().any(|t| t.chars().any(is_emoji)),
        uses_hashtags: hashtags > 0,
        uses_mentions: mentions > 0,
    })
}

pub fn engagement_metrics(tweets: &[FetchedTweet]) -> Option<EngagementMetrics> {
    if tweets.is_empty() {
        return None;
    }
    let n = tweets.len() as f64;
    let likes: u64 = tweets.iter().map(|t| t.favorite_count).sum();
    let retweets: u64 = tweets.iter().map(|t| t.retweet_count).sum();
    let replies: u64 = tweets.iter().map(|t| t.reply_count).sum();
    let quotes: u64 = tweets.iter().map(|t| t.quote_count).sum();
    let total = likes + retweets + replies + quotes;

    Some(EngagementMetrics {
        average_likes: likes as f64 / n,
        average_retweets: retweets as f64 / n,
        average_replies: replies as f64 / n,
        average_quotes: quotes as f64 / n,
        total_engagement: total,
        engagement_rate: total as f64 / n,
    })
}

impl ProfileInfo {
    pub fn from_user(handle: &str, user: &TwitterUser) -> Self {
        let handle = clean_handle(handle);
        Self {
            display_name: if user.name.trim().is_empty() {
                handle.clone()
            } else {
                user.name.clone()
            },
            handle,
            bio: user.description.clone().unwrap_or_default(),
            profile_image: user.profile_image_url_https.as_deref().map(good_twitter_image),
            cover_image: user.profile_banner_url.clone(),
            follower_count: user.followers_count,
            following_count: user.friends_count,
        }
    }
}

impl TrainingDataset {
    pub fn from_parts(handle: &str, user: &TwitterUser, tweets: Vec<FetchedTweet>) -> Self {
        let texts: Vec<String> = tweets.iter().map(|t| t.full_text.clone()).collect();
        Self {
            profile: ProfileInfo::from_user(handle, user),
            writing_style: analyze_writing_style(&texts),
            engagement: engagement_metrics(&tweets),
            content_samples: texts.into_iter().take(CONTENT_SAMPLE_SIZE).collect(),
            tweets,
        }
    }

    /// Fetch profile and tweets for `handle` and analyze them.
    ///
    /// Fails when the profile cannot be read or no tweets come back.
    pub async fn collect(
        source: &dyn TwitterSource,
        handle: &str,
        max_tweets: usize,
        max_pages: usize,
    ) -> Result<Self> {
        let handle = clean_handle(handle);
        let user = source.user_info(&handle).await?;
        let tweets = fetch_user_tweets(source, &handle, max_tweets, max_pages).await;
        if tweets.is_empty() {
            bail!("No tweets found for user {handle}");
        }
        Ok(Self::from_parts(&handle, &user, tweets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tweet(text: &str, likes: u64, rts: u64) -> FetchedTweet {
        FetchedTweet {
            id_str: text.len().to_string(),
            full_text: text.into(),
            favorite_count: likes,
            retweet_count: rts,
            ..FetchedTweet::default()
        }
    }

    #[test]
    fn writing_style_counts_tags() {
        let texts = vec![
            "gm #web3 #rust @alice".to_string(),
            "shipping today 🚀".to_string(),
            "price is # not a tag, email a@b".to_string(),
        ];
        let style = analyze_writing_style(&texts).unwrap();
        assert!((style.hashtags_per_tweet - 2.0 / 3.0).abs() < 1e-9);
        // "@alice" and the "@b" in the email address.
        assert!((style.mentions_per_tweet - 2.0 / 3.0).abs() < 1e-9);
        assert!(style.uses_emojis);
        assert!(style.uses_hashtags);
        assert!(analyze_writing_style(&[]).is_none());
    }

    #[test]
    fn engagement_rate_is_total_over_count() {
        let tweets = vec![tweet("a", 10, 2), tweet("b", 0, 0)];
        let metrics = engagement_metrics(&tweets).unwrap();
        assert_eq!(metrics.total_engagement, 12);
        assert_eq!(metrics.engagement_rate, 6.0);
        assert_eq!(metrics.average_likes, 5.0);
        assert!(engagement_metrics(&[]).is_none());
    }

    #[test]
    fn profile_upgrades_avatar_and_defaults_name() {
        let user = TwitterUser {
            profile_image_url_https: Some("https://pbs.twimg.com/a_normal.png".into()),
            followers_count: 7,
            ..TwitterUser::default()
        };
        let info = ProfileInfo::from_user("@Bob", &user);
        assert_eq!(info.display_name, "bob");
        assert_eq!(info.profile_image.as_deref(), Some("https://pbs.twimg.com/a_400x400.png"));
        assert_eq!(info.follower_count, 7);
        assert_eq!(info.bio, "");
    }

    #[test]
    fn dataset_limits_samples() {
        let tweets: Vec<FetchedTweet> = (0..60).map(|i| tweet(&format!("t{i}"), 1, 0)).collect();
        let dataset = TrainingDataset::from_parts("x", &TwitterUser::default(), tweets);
        assert_eq!(dataset.content_samples.len(), 50);
        assert_eq!(dataset.tweets.len(), 60);
    }
}
