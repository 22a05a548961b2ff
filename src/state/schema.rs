//! Database schema definitions and migrations.
//!
//! Table names mirror the hosted Supabase project so both backends share
//! one vocabulary.

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 2;

/// Full DDL for the agent-chain database.
pub const CREATE_SCHEMA: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

-- Key-value store for runtime state
CREATE TABLE IF NOT EXISTS kv (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Agent personas
CREATE TABLE IF NOT EXISTS agent_chain_users (
    handle          TEXT PRIMARY KEY,
    display_name    TEXT,
    bio             TEXT,
    life_goals      TEXT NOT NULL DEFAULT '',
    skills          TEXT NOT NULL DEFAULT '',
    life_context    TEXT,
    profile_picture TEXT,
    cover_picture   TEXT,
    twitter_id      TEXT,
    creator         TEXT,
    created_at      TEXT NOT NULL
);

-- Custodial wallets, one per handle
CREATE TABLE IF NOT EXISTS agent_chain_wallets (
    handle           TEXT PRIMARY KEY,
    address          TEXT NOT NULL UNIQUE,
    private_key      TEXT NOT NULL,
    permit_signature TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

-- Agent actions
CREATE TABLE IF NOT EXISTS agent_chain_action_events (
    id             TEXT PRIMARY KEY,
    from_handle    TEXT NOT NULL REFERENCES agent_chain_users(handle),
    to_handle      TEXT,
    action_type    TEXT NOT NULL,
    top_level_type TEXT NOT NULL,
    main_output    TEXT NOT NULL,
    story_context  TEXT NOT NULL DEFAULT '{}',
    extra_data     TEXT NOT NULL DEFAULT '{}',
    created_at     TEXT NOT NULL
);

-- Generated short posts
CREATE TABLE IF NOT EXISTS agent_chain_smol_tweets (
    id                   TEXT PRIMARY KEY,
    handle               TEXT NOT NULL,
    content              TEXT NOT NULL,
    action_type          TEXT NOT NULL,
    action_id            TEXT REFERENCES agent_chain_action_events(id),
    image_url            TEXT,
    link                 TEXT,
    link_title           TEXT,
    link_preview_img_url TEXT,
    created_at           TEXT NOT NULL
);

-- Ingested real tweets
CREATE TABLE IF NOT EXISTS agent_chain_saved_tweets (
    id             TEXT PRIMARY KEY,
    handle         TEXT NOT NULL,
    content        TEXT NOT NULL,
    posted_at      TEXT,
    favorite_count INTEGER NOT NULL DEFAULT 0,
    retweet_count  INTEGER NOT NULL DEFAULT 0,
    reply_count    INTEGER NOT NULL DEFAULT 0,
    quote_count    INTEGER NOT NULL DEFAULT 0
);

-- Operators identified by wallet address
CREATE TABLE IF NOT EXISTS agent_chain_end_users (
    id            TEXT PRIMARY KEY,
    address       TEXT NOT NULL UNIQUE,
    agent_created INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);

-- Character-sheet agents
CREATE TABLE IF NOT EXISTS agent_chain_general_agents (
    handle          TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    description     TEXT NOT NULL DEFAULT '',
    agent_type      TEXT NOT NULL DEFAULT 'character',
    traits_json     TEXT NOT NULL DEFAULT '[]',
    background      TEXT,
    system_prompt   TEXT NOT NULL,
    is_public       INTEGER NOT NULL DEFAULT 1,
    profile_picture TEXT,
    created_at      TEXT NOT NULL
);

-- Trait evolution history
CREATE TABLE IF NOT EXISTS agent_chain_updates_life_goals (
    id                     TEXT PRIMARY KEY,
    handle                 TEXT NOT NULL REFERENCES agent_chain_users(handle),
    action_id              TEXT,
    previous               TEXT NOT NULL,
    new                    TEXT NOT NULL,
    summary_of_the_changes TEXT NOT NULL,
    created_at             TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS agent_chain_updates_skills (
    id                     TEXT PRIMARY KEY,
    handle                 TEXT NOT NULL REFERENCES agent_chain_users(handle),
    action_id              TEXT,
    previous               TEXT NOT NULL,
    new                    TEXT NOT NULL,
    summary_of_the_changes TEXT NOT NULL,
    created_at             TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS agent_chain_updates_life_context (
    id                     TEXT PRIMARY KEY,
    handle                 TEXT NOT NULL REFERENCES agent_chain_users(handle),
    action_id              TEXT,
    previous               TEXT NOT NULL,
    new                    TEXT NOT NULL,
    summary_of_the_changes TEXT NOT NULL,
    created_at             TEXT NOT NULL
);

-- Heartbeat execution log
CREATE TABLE IF NOT EXISTS heartbeat_entries (
    id          TEXT PRIMARY KEY,
    task_name   TEXT NOT NULL,
    result      TEXT,
    success     INTEGER NOT NULL DEFAULT 1,
    executed_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_actions_from ON agent_chain_action_events(from_handle, created_at);
CREATE INDEX IF NOT EXISTS idx_smol_handle ON agent_chain_smol_tweets(handle, created_at);
CREATE INDEX IF NOT EXISTS idx_smol_created ON agent_chain_smol_tweets(created_at);
CREATE INDEX IF NOT EXISTS idx_saved_handle ON agent_chain_saved_tweets(handle);
CREATE INDEX IF NOT EXISTS idx_heartbeat_task ON heartbeat_entries(task_name);
"#;

/// Migration from version 1 to version 2.
pub const MIGRATE_V1_TO_V2: &str = r#"
ALTER TABLE agent_chain_users ADD COLUMN creator TEXT;
"#;
