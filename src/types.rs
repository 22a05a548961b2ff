//! Shared types used across agent-chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel stored in place of a permit signature when signing failed.
pub const SIGNATURE_ERROR_SENTINEL: &str = "error-generating-signature";

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// An agent persona, keyed by its normalized handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub handle: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub life_goals: String,
    pub skills: String,
    pub life_context: Option<String>,
    pub profile_picture: Option<String>,
    pub cover_picture: Option<String>,
    pub twitter_id: Option<String>,
    /// Address of the end user who created this agent, if any.
    pub creator: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Name used when addressing the agent: display name, else handle.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.handle)
    }
}

/// Partial update of an agent row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub life_goals: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub life_context: Option<String>,
}

/// A character-sheet agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralAgent {
    pub handle: String,
    pub name: String,
    pub description: String,
    pub agent_type: String,
    pub traits: Vec<String>,
    pub background: Option<String>,
    pub system_prompt: String,
    pub is_public: bool,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Wallets
// ---------------------------------------------------------------------------

/// Custodial wallet row, one per agent handle.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRow {
    pub handle: String,
    pub address: String,
    pub private_key: String,
    pub permit_signature: String,
    pub created_at: DateTime<Utc>,
}

impl WalletRow {
    /// Whether provisioning managed to store a real permit signature.
    pub fn has_permit(&self) -> bool {
        !self.permit_signature.is_empty() && self.permit_signature != SIGNATURE_ERROR_SENTINEL
    }
}

impl fmt::Debug for WalletRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRow")
            .field("handle", &self.handle)
            .field("address", &self.address)
            .field("has_permit", &self.has_permit())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Actions and tweets
// ---------------------------------------------------------------------------

/// Category an action template belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Social,
    Trading,
    Learning,
    Creative,
    Analysis,
}

impl ActionCategory {
    pub const ALL: [ActionCategory; 5] = [
        Self::Social,
        Self::Trading,
        Self::Learning,
        Self::Creative,
        Self::Analysis,
    ];
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Social => write!(f, "social"),
            Self::Trading => write!(f, "trading"),
            Self::Learning => write!(f, "learning"),
            Self::Creative => write!(f, "creative"),
            Self::Analysis => write!(f, "analysis"),
        }
    }
}

impl FromStr for ActionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "social" => Ok(Self::Social),
            "trading" => Ok(Self::Trading),
            "learning" => Ok(Self::Learning),
            "creative" => Ok(Self::Creative),
            "analysis" => Ok(Self::Analysis),
            other => Err(format!("unknown action category: {other}")),
        }
    }
}

/// Insert payload for an action event.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewActionEvent {
    pub from_handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_handle: Option<String>,
    pub action_type: String,
    pub top_level_type: String,
    pub main_output: String,
    /// JSON-encoded context describing the action.
    pub story_context: String,
    /// JSON-encoded free-form metadata.
    pub extra_data: String,
}

/// A recorded agent action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub id: String,
    pub from_handle: String,
    pub to_handle: Option<String>,
    pub action_type: String,
    pub top_level_type: String,
    pub main_output: String,
    pub story_context: String,
    pub extra_data: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a generated short post.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewSmolTweet {
    pub handle: String,
    pub content: String,
    pub action_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview_img_url: Option<String>,
}

/// A generated short post attributed to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmolTweet {
    pub id: String,
    pub handle: String,
    pub content: String,
    pub action_type: String,
    pub action_id: Option<String>,
    pub image_url: Option<String>,
    pub link: Option<String>,
    pub link_title: Option<String>,
    pub link_preview_img_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A real tweet ingested from the Twitter-data API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTweet {
    pub id: String,
    pub handle: String,
    pub content: String,
    pub posted_at: Option<String>,
    pub favorite_count: u64,
    pub retweet_count: u64,
    pub reply_count: u64,
    pub quote_count: u64,
}

// ---------------------------------------------------------------------------
// Trait evolution
// ---------------------------------------------------------------------------

/// Which evolving persona field an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    LifeGoals,
    Skills,
    LifeContext,
}

impl TraitKind {
    /// Backing history table.
    pub fn table(&self) -> &'static str {
        match self {
            Self::LifeGoals => "agent_chain_updates_life_goals",
            Self::Skills => "agent_chain_updates_skills",
            Self::LifeContext => "agent_chain_updates_life_context",
        }
    }

    /// Human label used in prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::LifeGoals => "life goals",
            Self::Skills => "skills",
            Self::LifeContext => "life context",
        }
    }

    /// Current value of this trait on an agent.
    pub fn current<'a>(&self, agent: &'a Agent) -> &'a str {
        match self {
            Self::LifeGoals => &agent.life_goals,
            Self::Skills => &agent.skills,
            Self::LifeContext => agent.life_context.as_deref().unwrap_or(""),
        }
    }

    /// Patch that sets this trait to `value`.
    pub fn patch(&self, value: String) -> AgentPatch {
        match self {
            Self::LifeGoals => AgentPatch {
                life_goals: Some(value),
                ..AgentPatch::default()
            },
            Self::Skills => AgentPatch {
                skills: Some(value),
                ..AgentPatch::default()
            },
            Self::LifeContext => AgentPatch {
                life_context: Some(value),
                ..AgentPatch::default()
            },
        }
    }
}

impl fmt::Display for TraitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LifeGoals => write!(f, "life_goals"),
            Self::Skills => write!(f, "skills"),
            Self::LifeContext => write!(f, "life_context"),
        }
    }
}

impl FromStr for TraitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "life_goals" | "goals" => Ok(Self::LifeGoals),
            "skills" => Ok(Self::Skills),
            "life_context" | "context" => Ok(Self::LifeContext),
            other => Err(format!("unknown trait: {other}")),
        }
    }
}

/// A recorded change to one persona trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitUpdate {
    pub id: String,
    pub handle: String,
    pub action_id: Option<String>,
    pub previous: String,
    pub new: String,
    pub summary_of_the_changes: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// End users
// ---------------------------------------------------------------------------

/// Operator identified by a connected wallet address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndUser {
    pub id: String,
    pub address: String,
    #[serde(rename = "agentCreated")]
    pub agent_created: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

/// A scheduled heartbeat entry loaded from heartbeat.yml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatEntry {
    pub name: String,
    pub schedule: String,
    pub task: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub params: serde_json::Value,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Normalize a handle: drop `@`, trim, lowercase.
pub fn clean_handle(handle: &str) -> String {
    handle.replace('@', "").trim().to_lowercase()
}

/// Upgrade a Twitter avatar URL to the 400x400 variant.
pub fn good_twitter_image(url: &str) -> String {
    url.replace("_normal", "_400x400")
}

/// Parse an RFC 3339 timestamp, falling back to now.
pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_handle_normalizes() {
        assert_eq!(clean_handle("  @ElonMusk "), "elonmusk");
        assert_eq!(clean_handle("vitalik"), "vitalik");
    }

    #[test]
    fn twitter_image_is_upgraded() {
        assert_eq!(
            good_twitter_image("https://pbs.twimg.com/p/abc_normal.jpg"),
            "https://pbs.twimg.com/p/abc_400x400.jpg"
        );
    }

    #[test]
    fn category_round_trips_through_display() {
        for cat in ActionCategory::ALL {
            assert_eq!(cat.to_string().parse::<ActionCategory>().unwrap(), cat);
        }
        assert!("gossip".parse::<ActionCategory>().is_err());
    }

    #[test]
    fn sentinel_signature_is_not_a_permit() {
        let row = WalletRow {
            handle: "a".into(),
            address: "0x0".into(),
            private_key: "0x1".into(),
            permit_signature: SIGNATURE_ERROR_SENTINEL.into(),
            created_at: Utc::now(),
        };
        assert!(!row.has_permit());
        assert!(!format!("{row:?}").contains("0x1\""));
    }

    #[test]
    fn end_user_uses_camel_case_flag() {
        let user = EndUser {
            id: "1".into(),
            address: "0xabc".into(),
            agent_created: true,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["agentCreated"], true);
    }
}
