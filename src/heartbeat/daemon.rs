//! Cron-based heartbeat daemon that drives agents in the background.
//!
//! Reads heartbeat.yml for task definitions and executes them on their
//! cron schedules.

use crate::config::AgentChainConfig;
use crate::context::AppContext;
use crate::heartbeat::tasks;
use crate::types::HeartbeatEntry;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Background heartbeat daemon.
pub struct HeartbeatDaemon {
    ctx: Arc<AppContext>,
    entries: Vec<HeartbeatEntry>,
    last_run: HashMap<String, DateTime<Utc>>,
}

impl HeartbeatDaemon {
    /// Create a daemon, loading entries from the configured heartbeat.yml.
    pub fn new(ctx: Arc<AppContext>) -> Result<Self> {
        let entries = load_heartbeat_config(&ctx.config)?;
        info!("Loaded {} heartbeat entries", entries.len());
        Ok(Self::with_entries(ctx, entries))
    }

    pub fn with_entries(ctx: Arc<AppContext>, entries: Vec<HeartbeatEntry>) -> Self {
        Self {
            ctx,
            entries,
            last_run: HashMap::new(),
        }
    }

    /// Run the heartbeat loop (call from a tokio::spawn).
    ///
    /// The loop exits cooperatively when `cancel` is triggered.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        info!("Heartbeat daemon started");

        let tick_interval = tokio::time::Duration::from_secs(60);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(tick_interval) => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!("Heartbeat tick failed: {e:#}");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("Heartbeat daemon shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Run every entry that is due at `now`.
    ///
    /// Task failures are logged and do not stop other tasks. Failing to
    /// record a run is propagated.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let mut ran = 0;

        for entry in &self.entries {
            if !entry.enabled {
                continue;
            }

            let schedule = match Schedule::from_str(&entry.schedule) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Invalid cron schedule '{}' for '{}': {}", entry.schedule, entry.name, e);
                    continue;
                }
            };

            let last = self
                .last_run
                .get(&entry.name)
                .copied()
                .unwrap_or(now - chrono::Duration::hours(1));

            let due = schedule.after(&last).next().is_some_and(|next| next <= now);
            if !due {
                continue;
            }

            debug!("Running heartbeat task: {}", entry.name);
            let result = tasks::execute_task(&entry.task, &entry.params, &self.ctx).await;

            let (result_str, success) = match &result {
                Ok(msg) => (msg.clone(), true),
                Err(e) => (format!("Error: {e:#}"), false),
            };

            {
                let db = self.ctx.db.lock().await;
                db.log_heartbeat(&entry.name, &result_str, success)
                    .context("Failed to log heartbeat to database")?;
            }

            self.last_run.insert(entry.name.clone(), now);
            ran += 1;

            if success {
                info!("Heartbeat '{}': {}", entry.name, result_str);
            } else {
                warn!("Heartbeat task '{}' failed: {}", entry.name, result_str);
            }
        }

        Ok(ran)
    }
}

/// Load heartbeat entries from the YAML config file.
pub fn load_heartbeat_config(config: &AgentChainConfig) -> Result<Vec<HeartbeatEntry>> {
    let path = config.resolved_heartbeat_path();
    let path = std::path::Path::new(&path);

    if !path.exists() {
        debug!("No heartbeat config at {:?}, using defaults", path);
        return Ok(default_heartbeat_entries());
    }

    let contents = std::fs::read_to_string(path).context("Failed to read heartbeat.yml")?;
    let entries: Vec<HeartbeatEntry> =
        serde_yaml::from_str(&contents).context("Failed to parse heartbeat.yml")?;

    Ok(entries)
}

/// Default heartbeat entries if no config file exists.
///
/// Schedules use the seconds-first syntax of the `cron` crate.
pub fn default_heartbeat_entries() -> Vec<HeartbeatEntry> {
    vec![
        HeartbeatEntry {
            name: "heartbeat_ping".into(),
            schedule: "0 */5 * * * *".into(),
            task: "heartbeat_ping".into(),
            enabled: true,
            params: serde_json::Value::Null,
        },
        HeartbeatEntry {
            name: "agent_actions".into(),
            schedule: "0 0 * * * *".into(),
            task: "random_action".into(),
            enabled: true,
            params: serde_json::Value::Null,
        },
        HeartbeatEntry {
            name: "evolve_traits".into(),
            schedule: "0 30 */6 * * *".into(),
            task: "evolve_traits".into(),
            enabled: true,
            params: serde_json::Value::Null,
        },
        HeartbeatEntry {
            name: "refresh_twitter".into(),
            schedule: "0 15 3 * * *".into(),
            task: "refresh_twitter".into(),
            enabled: false,
            params: serde_json::Value::Null,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedules_parse() {
        for entry in default_heartbeat_entries() {
            assert!(Schedule::from_str(&entry.schedule).is_ok(), "{}", entry.schedule);
            assert!(tasks::TASK_NAMES.contains(&entry.task.as_str()));
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentChainConfig {
            heartbeat_config_path: dir.path().join("absent.yml").display().to_string(),
            ..AgentChainConfig::default()
        };
        assert_eq!(load_heartbeat_config(&config).unwrap().len(), 4);
    }

    #[test]
    fn yaml_entries_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heartbeat.yml");
        std::fs::write(
            &path,
            "- name: act\n  schedule: \"0 0 * * * *\"\n  task: random_action\n  params:\n    category: social\n",
        )
        .unwrap();
        let config = AgentChainConfig {
            heartbeat_config_path: path.display().to_string(),
            ..AgentChainConfig::default()
        };
        let entries = load_heartbeat_config(&config).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].enabled);
        assert_eq!(entries[0].params["category"], "social");
    }
}
