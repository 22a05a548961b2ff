//! Discord webhook relay.

use crate::notify::Notifier;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

const BOT_NAME: &str = "Agent Chain Error Bot";
const BOT_AVATAR: &str = "https://i.imgur.com/4M34hi2.png";
/// Discord rejects message content above this many characters.
const MAX_CONTENT: usize = 2000;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
    username: &'a str,
    avatar_url: &'a str,
}

/// Posts messages to a Discord webhook. Without a URL it only logs.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    webhook_url: Option<String>,
    http: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            webhook_url: webhook_url.filter(|u| !u.trim().is_empty()),
            http: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn post(&self, url: &str, message: &str) -> Result<()> {
        let content: String = message.chars().take(MAX_CONTENT).collect();
        let resp = self
            .http
            .post(url)
            .json(&WebhookPayload {
                content: &content,
                username: BOT_NAME,
                avatar_url: BOT_AVATAR,
            })
            .send()
            .await
            .context("Failed to reach Discord webhook")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Discord webhook failed ({}): {}", status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, message: &str) {
        let Some(url) = self.webhook_url.as_deref() else {
            debug!("Discord disabled, dropping: {}", message);
            return;
        };
        if let Err(e) = self.post(url, message).await {
            warn!("Discord notification failed: {:#}", e);
        }
    }
}
