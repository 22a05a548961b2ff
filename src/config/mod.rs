pub mod schema;

pub use schema::{AgentChainConfig, StorageBackend};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Config file name inside the home directory.
pub const CONFIG_FILE: &str = "agent-chain.toml";

/// Default agent-chain home directory (~/.agent-chain).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".agent-chain"))
        .unwrap_or_else(|| PathBuf::from(".agent-chain"))
}

/// Load config from the given path, or return defaults.
///
/// Environment overrides are not applied here; see [`AgentChainConfig::apply_env`].
pub fn load_config(path: &Path) -> Result<AgentChainConfig> {
    if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read agent-chain config file")?;
        let config: AgentChainConfig =
            toml::from_str(&contents).context("Failed to parse agent-chain config (TOML)")?;
        Ok(config)
    } else {
        Ok(AgentChainConfig::default())
    }
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &AgentChainConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).context("Failed to write config file")?;

    // The file may hold the relayer key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
