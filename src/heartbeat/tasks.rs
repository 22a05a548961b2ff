//! Built-in heartbeat task implementations.

use crate::context::AppContext;
use crate::types::{ActionCategory, Agent, TraitKind};
use anyhow::{anyhow, bail, Result};
use rand::seq::SliceRandom;

/// Tasks `execute_task` understands.
pub const TASK_NAMES: &[&str] = &["heartbeat_ping", "random_action", "evolve_traits", "refresh_twitter"];

/// Agents considered when a task picks one at random.
const AGENT_POOL: usize = 200;

/// Execute a named heartbeat task.
pub async fn execute_task(task_name: &str, params: &serde_json::Value, ctx: &AppContext) -> Result<String> {
    match task_name {
        "heartbeat_ping" => task_heartbeat_ping(ctx).await,
        "random_action" => task_random_action(params, ctx).await,
        "evolve_traits" => task_evolve_traits(params, ctx).await,
        "refresh_twitter" => task_refresh_twitter(params, ctx).await,
        _ => bail!("Unknown heartbeat task: {}", task_name),
    }
}

/// Record that the daemon is alive.
async fn task_heartbeat_ping(ctx: &AppContext) -> Result<String> {
    let db = ctx.db.lock().await;
    db.kv_set("last_heartbeat", &chrono::Utc::now().to_rfc3339())?;
    Ok("pong".into())
}

/// Run one random action for `params.handle`, or a random agent.
async fn task_random_action(params: &serde_json::Value, ctx: &AppContext) -> Result<String> {
    let category = match params.get("category").and_then(|c| c.as_str()) {
        Some(c) => Some(c.parse::<ActionCategory>().map_err(|e| anyhow!(e))?),
        None => None,
    };
    let Some(handle) = pick_handle(params, ctx, |_| true).await? else {
        return Ok("Skipped: no agents".into());
    };

    let outcome = ctx.actions.execute_random(&handle, category).await?;
    Ok(format!(
        "{} ran {} ({})",
        handle,
        outcome.template.id,
        if outcome.tweet.is_some() { "posted" } else { "not posted" }
    ))
}

/// Evolve one trait of `params.handle`, or a random agent.
async fn task_evolve_traits(params: &serde_json::Value, ctx: &AppContext) -> Result<String> {
    let kind = match params.get("trait").and_then(|t| t.as_str()) {
        Some(t) => t.parse::<TraitKind>().map_err(|e| anyhow!(e))?,
        None => *[TraitKind::LifeGoals, TraitKind::Skills, TraitKind::LifeContext]
            .choose(&mut rand::thread_rng())
            .unwrap_or(&TraitKind::LifeGoals),
    };
    let Some(handle) = pick_handle(params, ctx, |_| true).await? else {
        return Ok("Skipped: no agents".into());
    };

    let update = ctx.evolver.evolve(&handle, kind).await?;
    Ok(format!("{} evolved {}: {}", handle, kind, update.summary_of_the_changes.lines().next().unwrap_or("")))
}

/// Refresh the profile of `params.handle`, or a random Twitter-backed agent.
async fn task_refresh_twitter(params: &serde_json::Value, ctx: &AppContext) -> Result<String> {
    if ctx.config.social_data_api_key.is_empty() {
        return Ok("Skipped: no SocialData API key configured".into());
    }
    let Some(handle) = pick_handle(params, ctx, |a| a.twitter_id.is_some()).await? else {
        return Ok("Skipped: no Twitter agents".into());
    };
    ctx.trainer.refresh(&handle).await?;
    Ok(format!("refreshed {handle}"))
}

async fn pick_handle(
    params: &serde_json::Value,
    ctx: &AppContext,
    filter: impl Fn(&Agent) -> bool,
) -> Result<Option<String>> {
    if let Some(handle) = params.get("handle").and_then(|h| h.as_str()) {
        return Ok(Some(handle.to_string()));
    }
    let agents: Vec<Agent> = ctx
        .store
        .list_agents(AGENT_POOL)
        .await?
        .into_iter()
        .filter(|a| filter(a))
        .collect();
    Ok(agents.choose(&mut rand::thread_rng()).map(|a| a.handle.clone()))
}
