//! First-run interactive setup wizard.
//!
//! Steps:
//! 1. Display banner
//! 2. Storage backend
//! 3. Chain endpoint and relayer key
//! 4. Gemini and SocialData keys
//! 5. Discord webhook
//! 6. Write config and heartbeat.yml

use crate::config::{self, AgentChainConfig, StorageBackend, CONFIG_FILE};
use crate::identity::AgentKeypair;
use anyhow::{bail, Result};
use std::io::{self, BufRead, Write};
use std::path::Path;

/// ASCII banner displayed during setup.
const BANNER: &str = r#"
     _                    _      ____ _           _
    / \   __ _  ___ _ __ | |_   / ___| |__   __ _(_)_ __
   / _ \ / _` |/ _ \ '_ \| __| | |   | '_ \ / _` | | '_ \
  / ___ \ (_| |  __/ | | | |_  | |___| | | | (_| | | | | |
 /_/   \_\__, |\___|_| |_|\__|  \____|_| |_|\__,_|_|_| |_|
         |___/
                 Agents with wallets
"#;

/// Run the interactive setup wizard on stdin.
pub fn run_setup_wizard(home: &Path) -> Result<AgentChainConfig> {
    println!("{}", BANNER);
    println!("Welcome to agent-chain setup.\n");

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    run_with_reader(&mut reader, home)
}

/// Wizard body over any line source.
pub fn run_with_reader(reader: &mut impl BufRead, home: &Path) -> Result<AgentChainConfig> {
    let defaults = AgentChainConfig::default();

    // Step 1: Storage
    println!("[1/5] Storage");
    let backend = prompt_with_default(reader, "  Backend (sqlite/supabase)", "sqlite")?;
    let (storage_backend, supabase_url, supabase_service_key) = match backend.to_lowercase().as_str() {
        "sqlite" => (StorageBackend::Sqlite, String::new(), String::new()),
        "supabase" => {
            let url = prompt(reader, "  Supabase URL")?;
            let key = prompt(reader, "  Supabase service-role key")?;
            (StorageBackend::Supabase, url, key)
        }
        other => bail!("Unknown storage backend: {other}"),
    };

    // Step 2: Chain
    println!("\n[2/5] Chain");
    let rpc_url = prompt(reader, "  RPC URL (or press Enter to run offline)")?;
    let token_contract = prompt_with_default(reader, "  Token contract", &defaults.token_contract)?;
    let nft_contract = prompt_with_default(reader, "  NFT contract", &defaults.nft_contract)?;
    let deployer_private_key = prompt(reader, "  Relayer private key (or press Enter to skip)")?;
    let deployer_address = if deployer_private_key.is_empty() {
        prompt_with_default(reader, "  Relayer address", &defaults.deployer_address)?
    } else {
        let relayer = AgentKeypair::from_hex(&deployer_private_key)?;
        println!("  Relayer: {}", relayer.address_string());
        relayer.address_string()
    };

    // Step 3: APIs
    println!("\n[3/5] APIs");
    let gemini = prompt(reader, "  Gemini API keys (comma-separated)")?;
    let gemini_api_keys: Vec<String> = gemini
        .split(',')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    let social_data_api_key = prompt(reader, "  SocialData API key")?;

    // Step 4: Notifications
    println!("\n[4/5] Notifications");
    let discord_webhook_url = prompt(reader, "  Discord webhook URL (or press Enter to skip)")?;

    // Step 5: Write files
    println!("\n[5/5] Writing configuration...");
    std::fs::create_dir_all(home)?;

    let home_str = home.display().to_string();
    let config = AgentChainConfig {
        storage_backend,
        supabase_url,
        supabase_service_key,
        rpc_url,
        token_contract,
        nft_contract,
        deployer_address,
        deployer_private_key,
        gemini_api_keys,
        social_data_api_key,
        discord_webhook_url,
        db_path: format!("{home_str}/state.db"),
        heartbeat_config_path: format!("{home_str}/heartbeat.yml"),
        ..defaults
    };

    config::save_config(&config, &home.join(CONFIG_FILE))?;
    println!("  Written: {CONFIG_FILE}");

    let heartbeat_path = home.join("heartbeat.yml");
    if !heartbeat_path.exists() {
        std::fs::write(&heartbeat_path, DEFAULT_HEARTBEAT)?;
        println!("  Written: heartbeat.yml");
    }

    println!("\nSetup complete! Run `agent-chain status` to check it.\n");

    Ok(config)
}

/// Prompt the user for input with a label.
fn prompt(reader: &mut impl BufRead, label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    reader.read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Prompt with a default value.
fn prompt_with_default(reader: &mut impl BufRead, label: &str, default: &str) -> Result<String> {
    print!("{} [{}]: ", label, default);
    io::stdout().flush()?;
    let mut input = String::new();
    reader.read_line(&mut input)?;
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

const DEFAULT_HEARTBEAT: &str = r#"# agent-chain heartbeat configuration
# Each entry runs on a cron schedule (sec min hour day month weekday)

- name: heartbeat_ping
  schedule: "0 */5 * * * *"
  task: heartbeat_ping
  enabled: true
  params: {}

- name: agent_actions
  schedule: "0 0 * * * *"
  task: random_action
  enabled: true
  params: {}

- name: evolve_traits
  schedule: "0 30 */6 * * *"
  task: evolve_traits
  enabled: true
  params: {}

- name: refresh_twitter
  schedule: "0 15 3 * * *"
  task: refresh_twitter
  enabled: false
  params: {}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HeartbeatEntry;
    use std::io::Cursor;

    #[test]
    fn offline_sqlite_setup_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        // backend, rpc, token, nft, key, relayer address, gemini, socialdata, discord
        let answers = "\n\n\n\n\n\nk1, k2 ,\nsd-key\n\n";
        let config = run_with_reader(&mut Cursor::new(answers), dir.path()).unwrap();

        assert_eq!(config.storage_backend, StorageBackend::Sqlite);
        assert_eq!(config.gemini_api_keys, vec!["k1", "k2"]);
        assert!(!config.chain_enabled());

        let saved = config::load_config(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(saved.social_data_api_key, "sd-key");

        let yaml = std::fs::read_to_string(dir.path().join("heartbeat.yml")).unwrap();
        let entries: Vec<HeartbeatEntry> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(entries.len(), 4);
    }

    #[test]
    fn relayer_address_derives_from_key() {
        let dir = tempfile::tempdir().unwrap();
        let key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let answers = format!("sqlite\nhttp://127.0.0.1:8545\n\n\n{key}\n\n\n\n");
        let config = run_with_reader(&mut Cursor::new(answers), dir.path()).unwrap();
        assert_eq!(config.deployer_address, "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert!(config.chain_enabled());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_with_reader(&mut Cursor::new("mongo\n"), dir.path()).is_err());
    }
}
