//! Wiring of stores, clients and services from the loaded config.

use crate::agent::{ActionEngine, AgentChat, AgentTrainer, TraitEvolver};
use crate::chain::{parse_address, InitialFunder, OfflineChain, RpcChain, TokenChain, Treasury};
use crate::config::{AgentChainConfig, StorageBackend};
use crate::identity::WalletProvisioner;
use crate::llm::gemini::GeminiClient;
use crate::llm::TextGenerator;
use crate::notify::discord::DiscordNotifier;
use crate::notify::Notifier;
use crate::social::{SocialDataClient, TwitterSource};
use crate::state::{AgentStore, Database, LocalStore, SupabaseStore};
use crate::users::EndUsers;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Everything a command or heartbeat task needs.
pub struct AppContext {
    pub config: AgentChainConfig,
    /// Local database. Always open: it also holds heartbeat bookkeeping.
    pub db: Arc<Mutex<Database>>,
    pub store: Arc<dyn AgentStore>,
    pub chain: Arc<dyn TokenChain>,
    pub notifier: Arc<dyn Notifier>,
    pub llm: Arc<dyn TextGenerator>,
    pub twitter: Arc<dyn TwitterSource>,
    pub provisioner: WalletProvisioner,
    pub treasury: Treasury,
    pub actions: ActionEngine,
    pub chat: AgentChat,
    pub trainer: AgentTrainer,
    pub evolver: TraitEvolver,
    pub users: EndUsers,
}

impl AppContext {
    pub fn from_config(config: AgentChainConfig) -> Result<Self> {
        let db_path = config.resolved_db_path();
        if let Some(parent) = Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        let db = Arc::new(Mutex::new(Database::open(Path::new(&db_path))?));

        let store: Arc<dyn AgentStore> = match config.storage_backend {
            StorageBackend::Sqlite => Arc::new(LocalStore::new(db.clone())),
            StorageBackend::Supabase => {
                if config.supabase_url.is_empty() || config.supabase_service_key.is_empty() {
                    anyhow::bail!("storage_backend = \"supabase\" needs supabase_url and supabase_service_key");
                }
                info!("Using Supabase store at {}", config.supabase_url);
                Arc::new(SupabaseStore::new(&config.supabase_url, &config.supabase_service_key))
            }
        };

        let notifier: Arc<dyn Notifier> = Arc::new(DiscordNotifier::new(Some(config.discord_webhook_url.clone())));
        let chain = build_chain(&config)?;

        let llm: Arc<dyn TextGenerator> = Arc::new(GeminiClient::new(
            &config.gemini_api_url,
            config.gemini_api_keys.clone(),
            &config.gemini_model,
            &config.gemini_thinking_model,
        ));
        let twitter: Arc<dyn TwitterSource> = Arc::new(SocialDataClient::new(
            &config.social_data_api_url,
            &config.social_data_api_key,
        ));

        Self::assemble(config, db, store, chain, notifier, llm, twitter)
    }

    /// Build the services over explicit backends.
    pub fn assemble(
        config: AgentChainConfig,
        db: Arc<Mutex<Database>>,
        store: Arc<dyn AgentStore>,
        chain: Arc<dyn TokenChain>,
        notifier: Arc<dyn Notifier>,
        llm: Arc<dyn TextGenerator>,
        twitter: Arc<dyn TwitterSource>,
    ) -> Result<Self> {
        let funder = InitialFunder::new(chain.clone(), notifier.clone(), &config.initial_grant_tokens)?;
        let provisioner = WalletProvisioner::new(chain.clone(), store.clone(), notifier.clone(), funder);
        let trainer = AgentTrainer::new(
            store.clone(),
            llm.clone(),
            twitter.clone(),
            provisioner.clone(),
            notifier.clone(),
        )
        .with_tweet_limits(config.max_profile_tweets, config.max_tweet_pages);

        Ok(Self {
            treasury: Treasury::new(chain.clone(), store.clone(), notifier.clone()),
            actions: ActionEngine::new(store.clone(), llm.clone()),
            chat: AgentChat::new(store.clone(), llm.clone()),
            evolver: TraitEvolver::new(store.clone(), llm.clone()),
            users: EndUsers::new(store.clone()),
            trainer,
            provisioner,
            config,
            db,
            store,
            chain,
            notifier,
            llm,
            twitter,
        })
    }
}

fn build_chain(config: &AgentChainConfig) -> Result<Arc<dyn TokenChain>> {
    let token = parse_address(&config.token_contract).context("Invalid token_contract")?;
    let nft = parse_address(&config.nft_contract).context("Invalid nft_contract")?;

    if config.chain_enabled() {
        let chain = RpcChain::connect(&config.rpc_url, &config.deployer_private_key, token, nft)
            .context("Failed to connect to chain")?;
        return Ok(Arc::new(chain));
    }

    warn!("No rpc_url or deployer key configured; chain calls are disabled");
    let relayer = parse_address(&config.deployer_address).context("Invalid deployer_address")?;
    Ok(Arc::new(OfflineChain::new(token, relayer)))
}
