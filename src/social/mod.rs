//! Twitter data ingestion.

pub mod analysis;
pub mod client;

pub use analysis::{TrainingDataset, WritingStyle};
pub use client::{fetch_user_tweets, FetchedTweet, SocialDataClient, TweetPage, TwitterSource, TwitterUser};
