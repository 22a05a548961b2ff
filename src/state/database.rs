//! SQLite database wrapper with WAL mode and migration support.

use crate::state::schema;
use crate::types::*;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::info;

const AGENT_COLUMNS: &str = "handle, display_name, bio, life_goals, skills, life_context, \
     profile_picture, cover_picture, twitter_id, creator, created_at";

const ACTION_COLUMNS: &str = "id, from_handle, to_handle, action_type, top_level_type, \
     main_output, story_context, extra_data, created_at";

const SMOL_COLUMNS: &str = "id, handle, content, action_type, action_id, image_url, link, \
     link_title, link_preview_img_url, created_at";

/// The agent-chain state database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;

        // Enable WAL mode for better concurrency
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Run schema creation and migrations.
    fn migrate(&mut self) -> Result<()> {
        let version = self.schema_version();

        if version == 0 {
            info!("Creating database schema v{}", schema::SCHEMA_VERSION);
            self.conn
                .execute_batch(schema::CREATE_SCHEMA)
                .context("Failed to create schema")?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::SCHEMA_VERSION],
            )?;
        } else {
            if version < 2 {
                info!("Migrating database v1 -> v2");
                self.conn.execute_batch(schema::MIGRATE_V1_TO_V2)?;
            }
            if version < schema::SCHEMA_VERSION {
                self.conn.execute(
                    "UPDATE schema_version SET version = ?1",
                    params![schema::SCHEMA_VERSION],
                )?;
            }
        }

        Ok(())
    }

    /// Get the current schema version (0 if uninitialized).
    fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Key-value store
    // -----------------------------------------------------------------------

    /// Get a value from the KV store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the KV store (upsert).
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Heartbeat
    // -----------------------------------------------------------------------

    /// Log a heartbeat task execution.
    pub fn log_heartbeat(&self, task_name: &str, result: &str, success: bool) -> Result<()> {
        let id = ulid::Ulid::new().to_string();
        self.conn.execute(
            "INSERT INTO heartbeat_entries (id, task_name, result, success)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, task_name, result, success as i32],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Agents
    // -----------------------------------------------------------------------

    /// Insert a new agent. Fails if the handle is taken.
    pub fn insert_agent(&self, agent: &Agent) -> Result<Agent> {
        let handle = clean_handle(&agent.handle);
        self.conn
            .execute(
                &format!(
                    "INSERT INTO agent_chain_users ({AGENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    handle,
                    agent.display_name,
                    agent.bio,
                    agent.life_goals,
                    agent.skills,
                    agent.life_context,
                    agent.profile_picture,
                    agent.cover_picture,
                    agent.twitter_id,
                    agent.creator,
                    agent.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| format!("Failed to insert agent '{handle}'"))?;
        Ok(Agent {
            handle,
            ..agent.clone()
        })
    }

    /// Look up an agent by handle.
    pub fn get_agent(&self, handle: &str) -> Result<Option<Agent>> {
        let agent = self
            .conn
            .query_row(
                &format!("SELECT {AGENT_COLUMNS} FROM agent_chain_users WHERE handle = ?1"),
                params![clean_handle(handle)],
                agent_from_row,
            )
            .optional()?;
        Ok(agent)
    }

    /// Newest agents first.
    pub fn list_agents(&self, limit: usize) -> Result<Vec<Agent>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {AGENT_COLUMNS} FROM agent_chain_users ORDER BY created_at DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], agent_from_row)?;
        collect_rows(rows)
    }

    /// Apply a partial update and return the updated agent.
    pub fn update_agent(&self, handle: &str, patch: &AgentPatch) -> Result<Option<Agent>> {
        let handle = clean_handle(handle);
        self.conn.execute(
            "UPDATE agent_chain_users SET
                bio = COALESCE(?2, bio),
                profile_picture = COALESCE(?3, profile_picture),
                life_goals = COALESCE(?4, life_goals),
                skills = COALESCE(?5, skills),
                life_context = COALESCE(?6, life_context)
             WHERE handle = ?1",
            params![
                handle,
                patch.bio,
                patch.profile_picture,
                patch.life_goals,
                patch.skills,
                patch.life_context,
            ],
        )?;
        self.get_agent(&handle)
    }

    pub fn count_agents(&self) -> Result<u64> {
        let count: u64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM agent_chain_users", [], |row| row.get(0))?;
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Wallets
    // -----------------------------------------------------------------------

    /// Look up the wallet for a handle.
    pub fn get_wallet(&self, handle: &str) -> Result<Option<WalletRow>> {
        let wallet = self
            .conn
            .query_row(
                "SELECT handle, address, private_key, permit_signature, created_at
                 FROM agent_chain_wallets WHERE handle = ?1",
                params![clean_handle(handle)],
                wallet_from_row,
            )
            .optional()?;
        Ok(wallet)
    }

    /// Insert a wallet unless one already exists for the handle.
    ///
    /// Returns the stored row and whether this call created it.
    pub fn insert_wallet_if_absent(&self, wallet: &WalletRow) -> Result<(WalletRow, bool)> {
        let handle = clean_handle(&wallet.handle);
        let inserted = self.conn.execute(
            "INSERT INTO agent_chain_wallets (handle, address, private_key, permit_signature, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(handle) DO NOTHING",
            params![
                handle,
                wallet.address,
                wallet.private_key,
                wallet.permit_signature,
                wallet.created_at.to_rfc3339(),
            ],
        )?;

        let stored = self
            .get_wallet(&handle)?
            .with_context(|| format!("Wallet for '{handle}' missing after insert"))?;
        Ok((stored, inserted == 1))
    }

    pub fn count_wallets(&self) -> Result<u64> {
        let count: u64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM agent_chain_wallets", [], |row| row.get(0))?;
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Action events
    // -----------------------------------------------------------------------

    /// Record an action event.
    pub fn insert_action_event(&self, event: &NewActionEvent) -> Result<ActionEvent> {
        let stored = ActionEvent {
            id: ulid::Ulid::new().to_string(),
            from_handle: clean_handle(&event.from_handle),
            to_handle: event.to_handle.as_deref().map(clean_handle),
            action_type: event.action_type.clone(),
            top_level_type: event.top_level_type.clone(),
            main_output: event.main_output.clone(),
            story_context: event.story_context.clone(),
            extra_data: event.extra_data.clone(),
            created_at: Utc::now(),
        };

        self.conn
            .execute(
                &format!(
                    "INSERT INTO agent_chain_action_events ({ACTION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    stored.id,
                    stored.from_handle,
                    stored.to_handle,
                    stored.action_type,
                    stored.top_level_type,
                    stored.main_output,
                    stored.story_context,
                    stored.extra_data,
                    stored.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| {
                format!("Failed to record action for '{}'", stored.from_handle)
            })?;
        Ok(stored)
    }

    /// Newest actions by an agent.
    pub fn recent_action_events(&self, handle: &str, limit: usize) -> Result<Vec<ActionEvent>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ACTION_COLUMNS} FROM agent_chain_action_events
             WHERE from_handle = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![clean_handle(handle), limit as i64], action_from_row)?;
        collect_rows(rows)
    }

    pub fn count_action_events(&self) -> Result<u64> {
        let count: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM agent_chain_action_events",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Smol tweets
    // -----------------------------------------------------------------------

    /// Store a generated post.
    pub fn insert_smol_tweet(&self, tweet: &NewSmolTweet) -> Result<SmolTweet> {
        let stored = SmolTweet {
            id: ulid::Ulid::new().to_string(),
            handle: clean_handle(&tweet.handle),
            content: tweet.content.clone(),
            action_type: tweet.action_type.clone(),
            action_id: tweet.action_id.clone(),
            image_url: tweet.image_url.clone(),
            link: tweet.link.clone(),
            link_title: tweet.link_title.clone(),
            link_preview_img_url: tweet.link_preview_img_url.clone(),
            created_at: Utc::now(),
        };

        self.conn.execute(
            &format!(
                "INSERT INTO agent_chain_smol_tweets ({SMOL_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                stored.id,
                stored.handle,
                stored.content,
                stored.action_type,
                stored.action_id,
                stored.image_url,
                stored.link,
                stored.link_title,
                stored.link_preview_img_url,
                stored.created_at.to_rfc3339(),
            ],
        )?;
        Ok(stored)
    }

    /// Newest posts, optionally restricted to one handle.
    pub fn recent_smol_tweets(&self, handle: Option<&str>, limit: usize) -> Result<Vec<SmolTweet>> {
        match handle {
            Some(h) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {SMOL_COLUMNS} FROM agent_chain_smol_tweets
                     WHERE handle = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
                ))?;
                let rows = stmt.query_map(params![clean_handle(h), limit as i64], smol_from_row)?;
                collect_rows(rows)
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {SMOL_COLUMNS} FROM agent_chain_smol_tweets
                     ORDER BY created_at DESC, id DESC LIMIT ?1"
                ))?;
                let rows = stmt.query_map(params![limit as i64], smol_from_row)?;
                collect_rows(rows)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Saved tweets
    // -----------------------------------------------------------------------

    /// Store ingested tweets, skipping ids already present. Returns the number added.
    pub fn save_tweets(&self, tweets: &[SavedTweet]) -> Result<usize> {
        let mut added = 0;
        for t in tweets {
            added += self.conn.execute(
                "INSERT OR IGNORE INTO agent_chain_saved_tweets
                 (id, handle, content, posted_at, favorite_count, retweet_count, reply_count, quote_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    t.id,
                    clean_handle(&t.handle),
                    t.content,
                    t.posted_at,
                    t.favorite_count as i64,
                    t.retweet_count as i64,
                    t.reply_count as i64,
                    t.quote_count as i64,
                ],
            )?;
        }
        Ok(added)
    }

    pub fn saved_tweets(&self, handle: &str, limit: usize) -> Result<Vec<SavedTweet>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, handle, content, posted_at, favorite_count, retweet_count, reply_count, quote_count
             FROM agent_chain_saved_tweets WHERE handle = ?1
             ORDER BY posted_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![clean_handle(handle), limit as i64], |row| {
            Ok(SavedTweet {
                id: row.get(0)?,
                handle: row.get(1)?,
                content: row.get(2)?,
                posted_at: row.get(3)?,
                favorite_count: row.get::<_, i64>(4)? as u64,
                retweet_count: row.get::<_, i64>(5)? as u64,
                reply_count: row.get::<_, i64>(6)? as u64,
                quote_count: row.get::<_, i64>(7)? as u64,
            })
        })?;
        collect_rows(rows)
    }

    // -----------------------------------------------------------------------
    // End users
    // -----------------------------------------------------------------------

    pub fn get_end_user(&self, address: &str) -> Result<Option<EndUser>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, address, agent_created, created_at
                 FROM agent_chain_end_users WHERE address = ?1",
                params![address.to_lowercase()],
                |row| {
                    Ok(EndUser {
                        id: row.get(0)?,
                        address: row.get(1)?,
                        agent_created: row.get::<_, i32>(2)? != 0,
                        created_at: parse_timestamp(&row.get::<_, String>(3)?),
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    /// Return the end user for an address, creating it on first sight.
    pub fn get_or_create_end_user(&self, address: &str) -> Result<EndUser> {
        self.conn.execute(
            "INSERT INTO agent_chain_end_users (id, address, agent_created, created_at)
             VALUES (?1, ?2, 0, ?3)
             ON CONFLICT(address) DO NOTHING",
            params![
                ulid::Ulid::new().to_string(),
                address.to_lowercase(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        self.get_end_user(address)?
            .with_context(|| format!("End user '{address}' missing after insert"))
    }

    pub fn set_agent_created(&self, address: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE agent_chain_end_users SET agent_created = 1 WHERE address = ?1",
            params![address.to_lowercase()],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // General agents
    // -----------------------------------------------------------------------

    pub fn insert_general_agent(&self, agent: &GeneralAgent) -> Result<GeneralAgent> {
        let handle = clean_handle(&agent.handle);
        self.conn.execute(
            "INSERT INTO agent_chain_general_agents
             (handle, name, description, agent_type, traits_json, background, system_prompt,
              is_public, profile_picture, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                handle,
                agent.name,
                agent.description,
                agent.agent_type,
                serde_json::to_string(&agent.traits)?,
                agent.background,
                agent.system_prompt,
                agent.is_public as i32,
                agent.profile_picture,
                agent.created_at.to_rfc3339(),
            ],
        )?;
        Ok(GeneralAgent {
            handle,
            ..agent.clone()
        })
    }

    pub fn get_general_agent(&self, handle: &str) -> Result<Option<GeneralAgent>> {
        let agent = self
            .conn
            .query_row(
                "SELECT handle, name, description, agent_type, traits_json, background,
                        system_prompt, is_public, profile_picture, created_at
                 FROM agent_chain_general_agents WHERE handle = ?1",
                params![clean_handle(handle)],
                |row| {
                    let traits_json: String = row.get(4)?;
                    Ok(GeneralAgent {
                        handle: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        agent_type: row.get(3)?,
                        traits: serde_json::from_str(&traits_json).unwrap_or_default(),
                        background: row.get(5)?,
                        system_prompt: row.get(6)?,
                        is_public: row.get::<_, i32>(7)? != 0,
                        profile_picture: row.get(8)?,
                        created_at: parse_timestamp(&row.get::<_, String>(9)?),
                    })
                },
            )
            .optional()?;
        Ok(agent)
    }

    // -----------------------------------------------------------------------
    // Trait updates
    // -----------------------------------------------------------------------

    pub fn insert_trait_update(&self, kind: TraitKind, update: &TraitUpdate) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} (id, handle, action_id, previous, new, summary_of_the_changes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                kind.table()
            ),
            params![
                update.id,
                clean_handle(&update.handle),
                update.action_id,
                update.previous,
                update.new,
                update.summary_of_the_changes,
                update.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn trait_history(&self, kind: TraitKind, handle: &str, limit: usize) -> Result<Vec<TraitUpdate>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, handle, action_id, previous, new, summary_of_the_changes, created_at
             FROM {} WHERE handle = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
            kind.table()
        ))?;
        let rows = stmt.query_map(params![clean_handle(handle), limit as i64], |row| {
            Ok(TraitUpdate {
                id: row.get(0)?,
                handle: row.get(1)?,
                action_id: row.get(2)?,
                previous: row.get(3)?,
                new: row.get(4)?,
                summary_of_the_changes: row.get(5)?,
                created_at: parse_timestamp(&row.get::<_, String>(6)?),
            })
        })?;
        collect_rows(rows)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        handle: row.get(0)?,
        display_name: row.get(1)?,
        bio: row.get(2)?,
        life_goals: row.get(3)?,
        skills: row.get(4)?,
        life_context: row.get(5)?,
        profile_picture: row.get(6)?,
        cover_picture: row.get(7)?,
        twitter_id: row.get(8)?,
        creator: row.get(9)?,
        created_at: parse_timestamp(&row.get::<_, String>(10)?),
    })
}

fn wallet_from_row(row: &Row<'_>) -> rusqlite::Result<WalletRow> {
    Ok(WalletRow {
        handle: row.get(0)?,
        address: row.get(1)?,
        private_key: row.get(2)?,
        permit_signature: row.get(3)?,
        created_at: parse_timestamp(&row.get::<_, String>(4)?),
    })
}

fn action_from_row(row: &Row<'_>) -> rusqlite::Result<ActionEvent> {
    Ok(ActionEvent {
        id: row.get(0)?,
        from_handle: row.get(1)?,
        to_handle: row.get(2)?,
        action_type: row.get(3)?,
        top_level_type: row.get(4)?,
        main_output: row.get(5)?,
        story_context: row.get(6)?,
        extra_data: row.get(7)?,
        created_at: parse_timestamp(&row.get::<_, String>(8)?),
    })
}

fn smol_from_row(row: &Row<'_>) -> rusqlite::Result<SmolTweet> {
    Ok(SmolTweet {
        id: row.get(0)?,
        handle: row.get(1)?,
        content: row.get(2)?,
        action_type: row.get(3)?,
        action_id: row.get(4)?,
        image_url: row.get(5)?,
        link: row.get(6)?,
        link_title: row.get(7)?,
        link_preview_img_url: row.get(8)?,
        created_at: parse_timestamp(&row.get::<_, String>(9)?),
    })
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(handle: &str) -> Agent {
        Agent {
            handle: handle.into(),
            display_name: Some("Test Agent".into()),
            life_goals: "ship".into(),
            skills: "rust".into(),
            created_at: Utc::now(),
            ..Agent::default()
        }
    }

    fn wallet(handle: &str, address: &str) -> WalletRow {
        WalletRow {
            handle: handle.into(),
            address: address.into(),
            private_key: "0xkey".into(),
            permit_signature: SIGNATURE_ERROR_SENTINEL.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn agent_handles_are_normalized() {
        let db = Database::open_memory().unwrap();
        let stored = db.insert_agent(&agent("@Alice ")).unwrap();
        assert_eq!(stored.handle, "alice");
        assert!(db.get_agent("ALICE").unwrap().is_some());
        assert!(db.insert_agent(&agent("alice")).is_err());
        assert_eq!(db.count_agents().unwrap(), 1);
    }

    #[test]
    fn update_agent_only_touches_given_fields() {
        let db = Database::open_memory().unwrap();
        db.insert_agent(&agent("bob")).unwrap();
        let patch = AgentPatch {
            bio: Some("new bio".into()),
            ..AgentPatch::default()
        };
        let updated = db.update_agent("bob", &patch).unwrap().unwrap();
        assert_eq!(updated.bio.as_deref(), Some("new bio"));
        assert_eq!(updated.skills, "rust");
        assert!(db.update_agent("nobody", &patch).unwrap().is_none());
    }

    #[test]
    fn second_wallet_insert_keeps_first_row() {
        let db = Database::open_memory().unwrap();
        let (first, created) = db.insert_wallet_if_absent(&wallet("carol", "0xaaa")).unwrap();
        assert!(created);
        let (second, created) = db.insert_wallet_if_absent(&wallet("@Carol", "0xbbb")).unwrap();
        assert!(!created);
        assert_eq!(first.address, second.address);
        assert_eq!(second.address, "0xaaa");
        assert_eq!(db.count_wallets().unwrap(), 1);
    }

    #[test]
    fn action_event_requires_existing_agent() {
        let db = Database::open_memory().unwrap();
        let event = NewActionEvent {
            from_handle: "ghost".into(),
            action_type: "generate-tweet".into(),
            top_level_type: "social".into(),
            main_output: "hi".into(),
            story_context: "{}".into(),
            extra_data: "{}".into(),
            ..NewActionEvent::default()
        };
        assert!(db.insert_action_event(&event).is_err());

        db.insert_agent(&agent("ghost")).unwrap();
        let stored = db.insert_action_event(&event).unwrap();
        let recent = db.recent_action_events("ghost", 5).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, stored.id);
    }

    #[test]
    fn smol_tweets_link_to_actions() {
        let db = Database::open_memory().unwrap();
        db.insert_agent(&agent("dave")).unwrap();
        let event = db
            .insert_action_event(&NewActionEvent {
                from_handle: "dave".into(),
                action_type: "creative-tweet".into(),
                top_level_type: "creative".into(),
                main_output: "moon".into(),
                story_context: "{}".into(),
                extra_data: "{}".into(),
                ..NewActionEvent::default()
            })
            .unwrap();
        db.insert_smol_tweet(&NewSmolTweet {
            handle: "dave".into(),
            content: "moon".into(),
            action_type: "agent_action".into(),
            action_id: Some(event.id.clone()),
            ..NewSmolTweet::default()
        })
        .unwrap();

        let bad = NewSmolTweet {
            handle: "dave".into(),
            content: "x".into(),
            action_type: "agent_action".into(),
            action_id: Some("missing".into()),
            ..NewSmolTweet::default()
        };
        assert!(db.insert_smol_tweet(&bad).is_err());

        let feed = db.recent_smol_tweets(None, 10).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].action_id.as_deref(), Some(event.id.as_str()));
    }

    #[test]
    fn saved_tweets_skip_duplicates() {
        let db = Database::open_memory().unwrap();
        let tweet = SavedTweet {
            id: "1".into(),
            handle: "erin".into(),
            content: "gm".into(),
            posted_at: Some("2024-01-01T00:00:00Z".into()),
            favorite_count: 3,
            retweet_count: 0,
            reply_count: 0,
            quote_count: 0,
        };
        assert_eq!(db.save_tweets(&[tweet.clone(), tweet]).unwrap(), 1);
        assert_eq!(db.saved_tweets("erin", 10).unwrap()[0].favorite_count, 3);
    }

    #[test]
    fn end_user_is_created_once() {
        let db = Database::open_memory().unwrap();
        let first = db.get_or_create_end_user("0xABC").unwrap();
        let again = db.get_or_create_end_user("0xabc").unwrap();
        assert_eq!(first.id, again.id);
        assert!(!again.agent_created);
        db.set_agent_created("0xAbC").unwrap();
        assert!(db.get_end_user("0xabc").unwrap().unwrap().agent_created);
    }

    #[test]
    fn trait_history_is_per_kind() {
        let db = Database::open_memory().unwrap();
        db.insert_agent(&agent("fay")).unwrap();
        let update = TraitUpdate {
            id: ulid::Ulid::new().to_string(),
            handle: "fay".into(),
            action_id: None,
            previous: "a".into(),
            new: "b".into(),
            summary_of_the_changes: "+b".into(),
            created_at: Utc::now(),
        };
        db.insert_trait_update(TraitKind::Skills, &update).unwrap();
        assert_eq!(db.trait_history(TraitKind::Skills, "fay", 5).unwrap().len(), 1);
        assert!(db.trait_history(TraitKind::LifeGoals, "fay", 5).unwrap().is_empty());
    }

    #[test]
    fn kv_round_trip() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("last_heartbeat").unwrap().is_none());
        db.kv_set("last_heartbeat", "now").unwrap();
        db.kv_set("last_heartbeat", "later").unwrap();
        assert_eq!(db.kv_get("last_heartbeat").unwrap().as_deref(), Some("later"));
    }
}
