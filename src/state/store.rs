//! Backend-agnostic persistence interface.

use crate::state::Database;
use crate::types::*;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Persistence used by every agent-chain workflow.
///
/// Implementations normalize handles with [`clean_handle`] before lookups
/// and inserts.
#[async_trait]
pub trait AgentStore: Send + Sync {
    // Agents
    async fn get_agent(&self, handle: &str) -> Result<Option<Agent>>;
    async fn insert_agent(&self, agent: &Agent) -> Result<Agent>;
    async fn update_agent(&self, handle: &str, patch: &AgentPatch) -> Result<Option<Agent>>;
    async fn list_agents(&self, limit: usize) -> Result<Vec<Agent>>;

    // Wallets
    async fn get_wallet(&self, handle: &str) -> Result<Option<WalletRow>>;
    /// Insert unless a wallet exists; returns the stored row and whether it was created.
    async fn insert_wallet_if_absent(&self, wallet: &WalletRow) -> Result<(WalletRow, bool)>;

    // Actions and posts
    async fn insert_action_event(&self, event: &NewActionEvent) -> Result<ActionEvent>;
    async fn recent_action_events(&self, handle: &str, limit: usize) -> Result<Vec<ActionEvent>>;
    async fn insert_smol_tweet(&self, tweet: &NewSmolTweet) -> Result<SmolTweet>;
    async fn recent_smol_tweets(&self, handle: Option<&str>, limit: usize) -> Result<Vec<SmolTweet>>;
    async fn save_tweets(&self, tweets: &[SavedTweet]) -> Result<usize>;

    // End users
    async fn get_or_create_end_user(&self, address: &str) -> Result<EndUser>;
    async fn get_end_user(&self, address: &str) -> Result<Option<EndUser>>;
    async fn set_agent_created(&self, address: &str) -> Result<()>;

    // Character agents
    async fn get_general_agent(&self, handle: &str) -> Result<Option<GeneralAgent>>;
    async fn insert_general_agent(&self, agent: &GeneralAgent) -> Result<GeneralAgent>;

    // Trait evolution
    async fn insert_trait_update(&self, kind: TraitKind, update: &TraitUpdate) -> Result<()>;
    async fn trait_history(&self, kind: TraitKind, handle: &str, limit: usize) -> Result<Vec<TraitUpdate>>;
}

/// [`AgentStore`] over the local SQLite [`Database`].
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
}

impl LocalStore {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Fresh in-memory store.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Arc::new(Mutex::new(Database::open_memory()?))))
    }

    /// Shared handle to the underlying database.
    pub fn database(&self) -> Arc<Mutex<Database>> {
        self.db.clone()
    }
}

#[async_trait]
impl AgentStore for LocalStore {
    async fn get_agent(&self, handle: &str) -> Result<Option<Agent>> {
        self.db.lock().await.get_agent(handle)
    }

    async fn insert_agent(&self, agent: &Agent) -> Result<Agent> {
        self.db.lock().await.insert_agent(agent)
    }

    async fn update_agent(&self, handle: &str, patch: &AgentPatch) -> Result<Option<Agent>> {
        self.db.lock().await.update_agent(handle, patch)
    }

    async fn list_agents(&self, limit: usize) -> Result<Vec<Agent>> {
        self.db.lock().await.list_agents(limit)
    }

    async fn get_wallet(&self, handle: &str) -> Result<Option<WalletRow>> {
        self.db.lock().await.get_wallet(handle)
    }

    async fn insert_wallet_if_absent(&self, wallet: &WalletRow) -> Result<(WalletRow, bool)> {
        self.db.lock().await.insert_wallet_if_absent(wallet)
    }

    async fn insert_action_event(&self, event: &NewActionEvent) -> Result<ActionEvent> {
        self.db.lock().await.insert_action_event(event)
    }

    async fn recent_action_events(&self, handle: &str, limit: usize) -> Result<Vec<ActionEvent>> {
        self.db.lock().await.recent_action_events(handle, limit)
    }

    async fn insert_smol_tweet(&self, tweet: &NewSmolTweet) -> Result<SmolTweet> {
        self.db.lock().await.insert_smol_tweet(tweet)
    }

    async fn recent_smol_tweets(&self, handle: Option<&str>, limit: usize) -> Result<Vec<SmolTweet>> {
        self.db.lock().await.recent_smol_tweets(handle, limit)
    }

    async fn save_tweets(&self, tweets: &[SavedTweet]) -> Result<usize> {
        self.db.lock().await.save_tweets(tweets)
    }

    async fn get_or_create_end_user(&self, address: &str) -> Result<EndUser> {
        self.db.lock().await.get_or_create_end_user(address)
    }

    async fn get_end_user(&self, address: &str) -> Result<Option<EndUser>> {
        self.db.lock().await.get_end_user(address)
    }

    async fn set_agent_created(&self, address: &str) -> Result<()> {
        self.db.lock().await.set_agent_created(address)
    }

    async fn get_general_agent(&self, handle: &str) -> Result<Option<GeneralAgent>> {
        self.db.lock().await.get_general_agent(handle)
    }

    async fn insert_general_agent(&self, agent: &GeneralAgent) -> Result<GeneralAgent> {
        self.db.lock().await.insert_general_agent(agent)
    }

    async fn insert_trait_update(&self, kind: TraitKind, update: &TraitUpdate) -> Result<()> {
        self.db.lock().await.insert_trait_update(kind, update)
    }

    async fn trait_history(&self, kind: TraitKind, handle: &str, limit: usize) -> Result<Vec<TraitUpdate>> {
        self.db.lock().await.trait_history(kind, handle, limit)
    }
}
