//! Fakes shared by the integration tests.

#![allow(dead_code)]

use agent_chain::chain::{SignedPermit, TokenChain, TxOutcome};
use agent_chain::error::ChainError;
use agent_chain::llm::{GenerationRequest, TextGenerator};
use agent_chain::social::{FetchedTweet, TweetPage, TwitterSource, TwitterUser};
use agent_chain::state::AgentStore;
use agent_chain::types::WalletRow;
use alloy::primitives::{address, Address, B256, U256};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

pub const TOKEN: Address = address!("419cFe85e77a0A26B9989059057318F59764F7C5");
pub const RELAYER: Address = address!("1B4AcaBA13f8B3B858c0796A7d62FC35A5ED3BA5");
pub const CHAIN_ID: u64 = 8453;
pub const TOKEN_NAME: &str = "Agent Coin";

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// In-memory token chain recording every call in order.
#[derive(Default)]
pub struct FakeChain {
    pub nonce: U256,
    pub fail_nonce: bool,
    pub fail_permit: bool,
    pub fail_transfer: bool,
    pub fail_balance: bool,
    /// Written to the store while the permit nonce is read, as if another
    /// writer created the wallet first.
    pub competing_wallet: Option<(Arc<dyn AgentStore>, WalletRow)>,
    pub calls: Mutex<Vec<String>>,
    pub permits: Mutex<Vec<SignedPermit>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn permits(&self) -> Vec<SignedPermit> {
        self.permits.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) -> TxOutcome {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call.into());
        TxOutcome {
            hash: B256::repeat_byte(calls.len() as u8),
            block_number: Some(calls.len() as u64),
        }
    }
}

#[async_trait]
impl TokenChain for FakeChain {
    fn token_address(&self) -> Address {
        TOKEN
    }

    fn relayer_address(&self) -> Address {
        RELAYER
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(CHAIN_ID)
    }

    async fn token_name(&self) -> Result<String, ChainError> {
        Ok(TOKEN_NAME.to_string())
    }

    async fn permit_nonce(&self, _owner: Address) -> Result<U256, ChainError> {
        if let Some((store, row)) = &self.competing_wallet {
            store.insert_wallet_if_absent(row).await.unwrap();
        }
        if self.fail_nonce {
            return Err(ChainError::Rpc("nonce unavailable".into()));
        }
        Ok(self.nonce)
    }

    async fn token_balance(&self, _owner: Address) -> Result<U256, ChainError> {
        if self.fail_balance {
            return Err(ChainError::Rpc("connection reset".into()));
        }
        Ok(U256::from(42u64))
    }

    async fn submit_permit(&self, permit: &SignedPermit) -> Result<TxOutcome, ChainError> {
        let tx = self.record("permit");
        if self.fail_permit {
            return Err(ChainError::Reverted {
                label: "permit".into(),
                hash: format!("{:#x}", tx.hash),
            });
        }
        self.permits.lock().unwrap().push(permit.clone());
        Ok(tx)
    }

    async fn transfer_from(&self, from: Address, to: Address, amount: U256) -> Result<TxOutcome, ChainError> {
        Ok(self.record(format!("transferFrom {from:#x} {to:#x} {amount}")))
    }

    async fn transfer(&self, to: Address, amount: U256) -> Result<TxOutcome, ChainError> {
        let tx = self.record(format!("transfer {to:#x} {amount}"));
        if self.fail_transfer {
            return Err(ChainError::Rpc("insufficient funds".into()));
        }
        Ok(tx)
    }

    async fn mint_nft(&self, to: Address, token_uri: &str, _title: &str) -> Result<TxOutcome, ChainError> {
        Ok(self.record(format!("mint {to:#x} {token_uri}")))
    }

    async fn nft_balance(&self, _owner: Address) -> Result<U256, ChainError> {
        Ok(U256::from(2u64))
    }
}

// ---------------------------------------------------------------------------
// LLM
// ---------------------------------------------------------------------------

/// Answers every request with a canned reply derived from its use case.
#[derive(Default)]
pub struct CannedLlm {
    requests: Mutex<Vec<GenerationRequest>>,
}

impl CannedLlm {
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for CannedLlm {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(format!("output for {}", request.use_case))
    }
}

/// Always fails.
pub struct BrokenLlm;

#[async_trait]
impl TextGenerator for BrokenLlm {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        bail!("model overloaded")
    }
}

// ---------------------------------------------------------------------------
// Twitter
// ---------------------------------------------------------------------------

/// One profile with a fixed set of tweets served in pages of `page_size`.
pub struct FakeTwitter {
    pub user: TwitterUser,
    pub tweets: Vec<FetchedTweet>,
    pub page_size: usize,
}

impl FakeTwitter {
    pub fn with_tweets(handle: &str, count: usize) -> Self {
        Self {
            user: TwitterUser {
                id_str: Some("1".into()),
                name: "Alice Builder".into(),
                screen_name: Some(handle.into()),
                description: Some("Building agents".into()),
                profile_image_url_https: Some("https://pbs.twimg.com/p/a_normal.jpg".into()),
                profile_banner_url: None,
                followers_count: 1200,
                friends_count: 300,
            },
            tweets: (0..count)
                .map(|i| FetchedTweet {
                    id_str: format!("{}", 1000 + i),
                    full_text: format!("tweet number {i} #agents"),
                    favorite_count: i as u64,
                    ..FetchedTweet::default()
                })
                .collect(),
            page_size: 20,
        }
    }
}

#[async_trait]
impl TwitterSource for FakeTwitter {
    async fn user_info(&self, _handle: &str) -> Result<TwitterUser> {
        Ok(self.user.clone())
    }

    async fn search_page(&self, _query: &str, cursor: Option<&str>) -> Result<TweetPage> {
        let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size).min(self.tweets.len());
        Ok(TweetPage {
            tweets: self.tweets[start..end].to_vec(),
            next_cursor: (end < self.tweets.len()).then(|| end.to_string()),
        })
    }
}
