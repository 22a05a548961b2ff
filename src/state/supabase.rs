//! Hosted Supabase backend over the PostgREST API.
//!
//! Remote column names differ slightly from the local schema (trait history
//! tables use `previous_<trait>` / `new_<trait>`, end-user ids are numeric);
//! the row structs below absorb those differences.

use crate::state::AgentStore;
use crate::types::*;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// PostgREST client authenticated with the service-role key.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    base_url: String,
    service_key: String,
    http: reqwest::Client,
}

// -- Remote row shapes ---------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct UserRow {
    handle: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    life_goals: Option<String>,
    #[serde(default)]
    skills: Option<String>,
    #[serde(default)]
    life_context: Option<String>,
    #[serde(default)]
    profile_picture: Option<String>,
    #[serde(default)]
    cover_picture: Option<String>,
    #[serde(default)]
    twitter_id: Option<String>,
    #[serde(default)]
    creator: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<UserRow> for Agent {
    fn from(row: UserRow) -> Self {
        Agent {
            handle: row.handle,
            display_name: row.display_name,
            bio: row.bio,
            life_goals: row.life_goals.unwrap_or_default(),
            skills: row.skills.unwrap_or_default(),
            life_context: row.life_context.filter(|c| !c.is_empty()),
            profile_picture: row.profile_picture,
            cover_picture: row.cover_picture,
            twitter_id: row.twitter_id,
            creator: row.creator,
            created_at: timestamp_or_now(row.created_at.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WalletRemote {
    handle: String,
    address: String,
    private_key: String,
    permit_signature: String,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<WalletRemote> for WalletRow {
    fn from(row: WalletRemote) -> Self {
        WalletRow {
            handle: row.handle,
            address: row.address,
            private_key: row.private_key,
            permit_signature: row.permit_signature,
            created_at: timestamp_or_now(row.created_at.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ActionRemote {
    id: String,
    #[serde(default)]
    from_handle: Option<String>,
    #[serde(default)]
    to_handle: Option<String>,
    action_type: String,
    top_level_type: String,
    main_output: String,
    #[serde(default)]
    story_context: Option<String>,
    #[serde(default)]
    extra_data: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<ActionRemote> for ActionEvent {
    fn from(row: ActionRemote) -> Self {
        ActionEvent {
            id: row.id,
            from_handle: row.from_handle.unwrap_or_default(),
            to_handle: row.to_handle,
            action_type: row.action_type,
            top_level_type: row.top_level_type,
            main_output: row.main_output,
            story_context: row.story_context.unwrap_or_else(|| "{}".into()),
            extra_data: row.extra_data.unwrap_or_else(|| "{}".into()),
            created_at: timestamp_or_now(row.created_at.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SmolRemote {
    id: String,
    handle: String,
    content: String,
    action_type: String,
    #[serde(default)]
    action_id: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    link_title: Option<String>,
    #[serde(default)]
    link_preview_img_url: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<SmolRemote> for SmolTweet {
    fn from(row: SmolRemote) -> Self {
        SmolTweet {
            id: row.id,
            handle: row.handle,
            content: row.content,
            action_type: row.action_type,
            action_id: row.action_id,
            image_url: row.image_url,
            link: row.link,
            link_title: row.link_title,
            link_preview_img_url: row.link_preview_img_url,
            created_at: timestamp_or_now(row.created_at.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EndUserRemote {
    id: Value,
    address: String,
    #[serde(rename = "agentCreated", default)]
    agent_created: Option<bool>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<EndUserRemote> for EndUser {
    fn from(row: EndUserRemote) -> Self {
        let id = match row.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        EndUser {
            id,
            address: row.address,
            agent_created: row.agent_created.unwrap_or(false),
            created_at: timestamp_or_now(row.created_at.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeneralAgentRemote {
    handle: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    agent_type: String,
    #[serde(default)]
    traits: Option<Value>,
    #[serde(default)]
    background: Option<String>,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    is_public: Option<bool>,
    #[serde(default)]
    profile_picture: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<GeneralAgentRemote> for GeneralAgent {
    fn from(row: GeneralAgentRemote) -> Self {
        let traits = row
            .traits
            .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok())
            .unwrap_or_default();
        GeneralAgent {
            handle: row.handle,
            name: row.name,
            description: row.description.unwrap_or_default(),
            agent_type: row.agent_type,
            traits,
            background: row.background,
            system_prompt: row.system_prompt.unwrap_or_default(),
            is_public: row.is_public.unwrap_or(true),
            profile_picture: row.profile_picture,
            created_at: timestamp_or_now(row.created_at.as_deref()),
        }
    }
}

fn timestamp_or_now(s: Option<&str>) -> chrono::DateTime<chrono::Utc> {
    s.map(parse_timestamp).unwrap_or_else(chrono::Utc::now)
}

/// Map a remote trait-history row (`previous_<trait>` / `new_<trait>`).
fn trait_update_from_json(kind: TraitKind, row: &Value) -> Option<TraitUpdate> {
    let text = |key: &str| row.get(key).and_then(Value::as_str).map(str::to_string);
    Some(TraitUpdate {
        id: text("id")?,
        handle: text("handle")?,
        action_id: text("action_id"),
        previous: text(&format!("previous_{kind}")).unwrap_or_default(),
        new: text(&format!("new_{kind}")).unwrap_or_default(),
        summary_of_the_changes: text("summary_of_the_changes").unwrap_or_default(),
        created_at: timestamp_or_now(text("created_at").as_deref()),
    })
}

fn trait_update_to_json(kind: TraitKind, update: &TraitUpdate) -> Value {
    let mut body = json!({
        "handle": clean_handle(&update.handle),
        "action_id": update.action_id,
        "summary_of_the_changes": update.summary_of_the_changes,
        "created_at": update.created_at.to_rfc3339(),
    });
    body[format!("previous_{kind}")] = json!(update.previous);
    body[format!("new_{kind}")] = json!(update.new);
    body
}

// -- Client ------------------------------------------------------------------

impl SupabaseStore {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Accept", "application/json")
    }

    /// `GET /rest/v1/{table}` with PostgREST query parameters.
    async fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        debug!("Supabase select {} {:?}", table, query);
        let resp = self
            .authed(self.http.get(self.table_url(table)))
            .query(query)
            .send()
            .await
            .with_context(|| format!("Supabase select on {table} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Supabase select on {} failed ({}): {}", table, status, body);
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse {table} rows"))
    }

    /// `POST /rest/v1/{table}` returning the written rows.
    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
        prefer: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let resp = self
            .authed(self.http.post(self.table_url(table)))
            .header("Prefer", prefer)
            .query(query)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Supabase insert into {table} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Supabase insert into {} failed ({}): {}", table, status, body);
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse inserted {table} rows"))
    }

    /// `PATCH /rest/v1/{table}` returning the updated rows.
    async fn update<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let resp = self
            .authed(self.http.patch(self.table_url(table)))
            .header("Prefer", "return=representation")
            .query(query)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Supabase update on {table} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Supabase update on {} failed ({}): {}", table, status, body);
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse updated {table} rows"))
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn first<T>(rows: Vec<T>, what: &str) -> Result<T> {
    match rows.into_iter().next() {
        Some(row) => Ok(row),
        None => bail!("Supabase returned no row for {}", what),
    }
}

#[async_trait]
impl AgentStore for SupabaseStore {
    async fn get_agent(&self, handle: &str) -> Result<Option<Agent>> {
        let rows: Vec<UserRow> = self
            .select(
                "agent_chain_users",
                &[("select", "*".into()), ("handle", eq(&clean_handle(handle))), ("limit", "1".into())],
            )
            .await?;
        Ok(rows.into_iter().next().map(Agent::from))
    }

    async fn insert_agent(&self, agent: &Agent) -> Result<Agent> {
        let row = UserRow {
            handle: clean_handle(&agent.handle),
            display_name: Some(agent.name().to_string()),
            bio: agent.bio.clone(),
            life_goals: Some(agent.life_goals.clone()),
            skills: Some(agent.skills.clone()),
            life_context: Some(agent.life_context.clone().unwrap_or_default()),
            profile_picture: agent.profile_picture.clone(),
            cover_picture: agent.cover_picture.clone(),
            twitter_id: agent.twitter_id.clone(),
            creator: agent.creator.clone(),
            created_at: Some(agent.created_at.to_rfc3339()),
        };
        let rows: Vec<UserRow> = self
            .insert("agent_chain_users", &row, "return=representation", &[])
            .await?;
        first(rows, "agent_chain_users").map(Agent::from)
    }

    async fn update_agent(&self, handle: &str, patch: &AgentPatch) -> Result<Option<Agent>> {
        let rows: Vec<UserRow> = self
            .update("agent_chain_users", patch, &[("handle", eq(&clean_handle(handle)))])
            .await?;
        Ok(rows.into_iter().next().map(Agent::from))
    }

    async fn list_agents(&self, limit: usize) -> Result<Vec<Agent>> {
        let rows: Vec<UserRow> = self
            .select(
                "agent_chain_users",
                &[
                    ("select", "*".into()),
                    ("order", "created_at.desc".into()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(Agent::from).collect())
    }

    async fn get_wallet(&self, handle: &str) -> Result<Option<WalletRow>> {
        let rows: Vec<WalletRemote> = self
            .select(
                "agent_chain_wallets",
                &[("select", "*".into()), ("handle", eq(&clean_handle(handle))), ("limit", "1".into())],
            )
            .await?;
        Ok(rows.into_iter().next().map(WalletRow::from))
    }

    async fn insert_wallet_if_absent(&self, wallet: &WalletRow) -> Result<(WalletRow, bool)> {
        let handle = clean_handle(&wallet.handle);
        let body = json!({
            "handle": handle,
            "address": wallet.address,
            "private_key": wallet.private_key,
            "permit_signature": wallet.permit_signature,
            "created_at": wallet.created_at.to_rfc3339(),
        });
        // Ignored duplicates come back as an empty representation.
        let rows: Vec<WalletRemote> = self
            .insert(
                "agent_chain_wallets",
                &body,
                "resolution=ignore-duplicates,return=representation",
                &[("on_conflict", "handle".into())],
            )
            .await?;

        match rows.into_iter().next() {
            Some(row) => Ok((row.into(), true)),
            None => {
                let existing = self
                    .get_wallet(&handle)
                    .await?
                    .with_context(|| format!("Wallet for '{handle}' missing after insert"))?;
                Ok((existing, false))
            }
        }
    }

    async fn insert_action_event(&self, event: &NewActionEvent) -> Result<ActionEvent> {
        let mut body = serde_json::to_value(event)?;
        body["from_handle"] = json!(clean_handle(&event.from_handle));
        body["created_at"] = json!(chrono::Utc::now().to_rfc3339());
        let rows: Vec<ActionRemote> = self
            .insert("agent_chain_action_events", &body, "return=representation", &[])
            .await?;
        first(rows, "agent_chain_action_events").map(ActionEvent::from)
    }

    async fn recent_action_events(&self, handle: &str, limit: usize) -> Result<Vec<ActionEvent>> {
        let rows: Vec<ActionRemote> = self
            .select(
                "agent_chain_action_events",
                &[
                    ("select", "*".into()),
                    ("from_handle", eq(&clean_handle(handle))),
                    ("order", "created_at.desc".into()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(ActionEvent::from).collect())
    }

    async fn insert_smol_tweet(&self, tweet: &NewSmolTweet) -> Result<SmolTweet> {
        let mut body = serde_json::to_value(tweet)?;
        body["handle"] = json!(clean_handle(&tweet.handle));
        let rows: Vec<SmolRemote> = self
            .insert("agent_chain_smol_tweets", &body, "return=representation", &[])
            .await?;
        first(rows, "agent_chain_smol_tweets").map(SmolTweet::from)
    }

    async fn recent_smol_tweets(&self, handle: Option<&str>, limit: usize) -> Result<Vec<SmolTweet>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(h) = handle {
            query.push(("handle", eq(&clean_handle(h))));
        }
        let rows: Vec<SmolRemote> = self.select("agent_chain_smol_tweets", &query).await?;
        Ok(rows.into_iter().map(SmolTweet::from).collect())
    }

    async fn save_tweets(&self, tweets: &[SavedTweet]) -> Result<usize> {
        if tweets.is_empty() {
            return Ok(0);
        }
        let body: Vec<Value> = tweets
            .iter()
            .map(|t| {
                json!({
                    "id": t.id,
                    "handle": clean_handle(&t.handle),
                    "content": t.content,
                    "posted_at": t.posted_at,
                })
            })
            .collect();
        let rows: Vec<Value> = self
            .insert(
                "agent_chain_saved_tweets",
                &body,
                "resolution=ignore-duplicates,return=representation",
                &[("on_conflict", "id".into())],
            )
            .await?;
        Ok(rows.len())
    }

    async fn get_or_create_end_user(&self, address: &str) -> Result<EndUser> {
        if let Some(user) = self.get_end_user(address).await? {
            return Ok(user);
        }
        let rows: Vec<EndUserRemote> = self
            .insert(
                "agent_chain_end_users",
                &json!({ "address": address.to_lowercase(), "agentCreated": false }),
                "return=representation",
                &[],
            )
            .await?;
        first(rows, "agent_chain_end_users").map(EndUser::from)
    }

    async fn get_end_user(&self, address: &str) -> Result<Option<EndUser>> {
        let rows: Vec<EndUserRemote> = self
            .select(
                "agent_chain_end_users",
                &[("select", "*".into()), ("address", eq(&address.to_lowercase())), ("limit", "1".into())],
            )
            .await?;
        Ok(rows.into_iter().next().map(EndUser::from))
    }

    async fn set_agent_created(&self, address: &str) -> Result<()> {
        let _: Vec<Value> = self
            .update(
                "agent_chain_end_users",
                &json!({ "agentCreated": true }),
                &[("address", eq(&address.to_lowercase()))],
            )
            .await?;
        Ok(())
    }

    async fn get_general_agent(&self, handle: &str) -> Result<Option<GeneralAgent>> {
        let rows: Vec<GeneralAgentRemote> = self
            .select(
                "agent_chain_general_agents",
                &[("select", "*".into()), ("handle", eq(&clean_handle(handle))), ("limit", "1".into())],
            )
            .await?;
        Ok(rows.into_iter().next().map(GeneralAgent::from))
    }

    async fn insert_general_agent(&self, agent: &GeneralAgent) -> Result<GeneralAgent> {
        let body = json!({
            "handle": clean_handle(&agent.handle),
            "name": agent.name,
            "description": agent.description,
            "agent_type": agent.agent_type,
            "traits": agent.traits,
            "background": agent.background,
            "system_prompt": agent.system_prompt,
            "is_public": agent.is_public,
            "profile_picture": agent.profile_picture,
            "created_at": agent.created_at.to_rfc3339(),
        });
        let rows: Vec<GeneralAgentRemote> = self
            .insert("agent_chain_general_agents", &body, "return=representation", &[])
            .await?;
        first(rows, "agent_chain_general_agents").map(GeneralAgent::from)
    }

    async fn insert_trait_update(&self, kind: TraitKind, update: &TraitUpdate) -> Result<()> {
        let _: Vec<Value> = self
            .insert(
                kind.table(),
                &trait_update_to_json(kind, update),
                "return=representation",
                &[],
            )
            .await?;
        Ok(())
    }

    async fn trait_history(&self, kind: TraitKind, handle: &str, limit: usize) -> Result<Vec<TraitUpdate>> {
        let rows: Vec<Value> = self
            .select(
                kind.table(),
                &[
                    ("select", "*".into()),
                    ("handle", eq(&clean_handle(handle))),
                    ("order", "created_at.desc".into()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| trait_update_from_json(kind, row))
            .collect())
    }
}
