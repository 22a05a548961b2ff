//! Configuration schema for agent-chain.toml.

use serde::{Deserialize, Serialize};

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local SQLite file at `db_path`.
    Sqlite,
    /// Hosted Supabase (PostgREST) project.
    Supabase,
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentChainConfig {
    /// Persistence backend.
    pub storage_backend: StorageBackend,

    /// Path to SQLite database.
    pub db_path: String,

    /// Supabase project URL.
    pub supabase_url: String,

    /// Supabase service-role key.
    pub supabase_service_key: String,

    /// EVM JSON-RPC endpoint. Empty disables chain access.
    pub rpc_url: String,

    /// ERC20 token contract (supports ERC-2612 permit).
    pub token_contract: String,

    /// Agent NFT collection contract.
    pub nft_contract: String,

    /// Relayer / deployer wallet address.
    pub deployer_address: String,

    /// Relayer / deployer private key (hex).
    pub deployer_private_key: String,

    /// Tokens granted to a freshly provisioned wallet (decimal, 18 dp).
    pub initial_grant_tokens: String,

    /// Gemini API keys; one is picked at random per call.
    pub gemini_api_keys: Vec<String>,

    /// Gemini REST base URL.
    pub gemini_api_url: String,

    /// Default generation model.
    pub gemini_model: String,

    /// Model used for longer reasoning prompts.
    pub gemini_thinking_model: String,

    /// SocialData API base URL.
    pub social_data_api_url: String,

    /// SocialData API key.
    pub social_data_api_key: String,

    /// Stop ingesting tweets past this count.
    pub max_profile_tweets: usize,

    /// Maximum search pages fetched per profile.
    pub max_tweet_pages: usize,

    /// Discord webhook for error and money notifications.
    pub discord_webhook_url: String,

    /// Path to heartbeat YAML config.
    pub heartbeat_config_path: String,

    /// Log level (debug, info, warn, error).
    pub log_level: String,
}

impl Default for AgentChainConfig {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Sqlite,
            db_path: "~/.agent-chain/state.db".into(),
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            rpc_url: String::new(),
            token_contract: "0x419cFe85e77a0A26B9989059057318F59764F7C5".into(),
            nft_contract: "0x1B4AcaBA13f8B3B858c0796A7d62FC35A5ED3BA5".into(),
            deployer_address: "0x1B4AcaBA13f8B3B858c0796A7d62FC35A5ED3BA5".into(),
            deployer_private_key: String::new(),
            initial_grant_tokens: "100".into(),
            gemini_api_keys: Vec::new(),
            gemini_api_url: "https://generativelanguage.googleapis.com".into(),
            gemini_model: "gemini-2.0-flash-exp".into(),
            gemini_thinking_model: "gemini-2.0-flash-thinking-exp".into(),
            social_data_api_url: "https://api.socialdata.tools".into(),
            social_data_api_key: String::new(),
            max_profile_tweets: 92,
            max_tweet_pages: 2,
            discord_webhook_url: String::new(),
            heartbeat_config_path: "~/.agent-chain/heartbeat.yml".into(),
            log_level: "info".into(),
        }
    }
}

impl AgentChainConfig {
    /// Resolve a path that may contain `~` to an absolute path.
    pub fn resolve_path(&self, path: &str) -> String {
        shellexpand::tilde(path).into_owned()
    }

    /// Resolved database path.
    pub fn resolved_db_path(&self) -> String {
        self.resolve_path(&self.db_path)
    }

    /// Resolved heartbeat config path.
    pub fn resolved_heartbeat_path(&self) -> String {
        self.resolve_path(&self.heartbeat_config_path)
    }

    /// Whether on-chain calls can be made at all.
    pub fn chain_enabled(&self) -> bool {
        !self.rpc_url.is_empty() && !self.deployer_private_key.is_empty()
    }

    /// Overlay secrets and endpoints from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values using a lookup function (non-empty values win).
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DEPLOYER_WALLET_PRIVATE_KEY") {
            self.deployer_private_key = v;
        }
        if let Some(v) = get("RPC_URL") {
            self.rpc_url = v;
        }
        if let Some(v) = get("SOCIAL_DATA_TOOLS_API_KEY") {
            self.social_data_api_key = v;
        }
        if let Some(v) = get("DISCORD_ERROR_WEBHOOK_URL") {
            self.discord_webhook_url = v;
        }
        if let Some(v) = get("SUPABASE_URL") {
            self.supabase_url = v;
        }
        if let Some(v) = get("SUPABASE_SERVICE_ROLE_KEY") {
            self.supabase_service_key = v;
        }

        let env_keys: Vec<String> = (1..=3)
            .filter_map(|i| get(&format!("GOOGLE_GEMINI_API_KEY_{i}")))
            .collect();
        if !env_keys.is_empty() {
            self.gemini_api_keys = env_keys;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_deployed_contracts() {
        let cfg = AgentChainConfig::default();
        assert_eq!(cfg.storage_backend, StorageBackend::Sqlite);
        assert_eq!(cfg.initial_grant_tokens, "100");
        assert_eq!(cfg.max_profile_tweets, 92);
        assert_eq!(cfg.max_tweet_pages, 2);
        assert!(!cfg.chain_enabled());
    }

    #[test]
    fn env_overrides_secrets() {
        let env: HashMap<&str, &str> = [
            ("RPC_URL", "http://localhost:8545"),
            ("DEPLOYER_WALLET_PRIVATE_KEY", "0xabc"),
            ("GOOGLE_GEMINI_API_KEY_1", "k1"),
            ("GOOGLE_GEMINI_API_KEY_3", "k3"),
            ("SUPABASE_URL", "  "),
        ]
        .into_iter()
        .collect();

        let mut cfg = AgentChainConfig::default();
        cfg.apply_env_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.rpc_url, "http://localhost:8545");
        assert_eq!(cfg.deployer_private_key, "0xabc");
        assert_eq!(cfg.gemini_api_keys, vec!["k1", "k3"]);
        assert!(cfg.supabase_url.is_empty());
        assert!(cfg.chain_enabled());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: AgentChainConfig = toml::from_str(
            r#"
            storage_backend = "supabase"
            gemini_api_keys = ["a", "b"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.storage_backend, StorageBackend::Supabase);
        assert_eq!(cfg.gemini_api_keys.len(), 2);
        assert_eq!(cfg.gemini_model, "gemini-2.0-flash-exp");
    }
}
