//! Prompt-template actions an agent can perform.

use crate::agent::persona::persona_prompt;
use crate::llm::{GenerationRequest, TextGenerator};
use crate::state::AgentStore;
use crate::types::*;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// `action_type` of posts produced by actions.
pub const ACTION_TWEET_TYPE: &str = "agent_action";

/// A reusable prompt an agent can run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub prompt: &'static str,
    pub system_prompt: &'static str,
    pub category: ActionCategory,
    pub temperature: f64,
    pub save_as_tweet: bool,
}

pub const ACTIONS: &[ActionTemplate] = &[
    ActionTemplate {
        id: "generate-tweet",
        name: "Generate Tweet",
        description: "Create a tweet that reflects your personality",
        prompt: "Create a tweet (under 100 characters) that you would post today, reflecting your personality, interests, and current events or trends.",
        system_prompt: "You are crafting a tweet that captures your character's voice, interests, and perspective. Make it authentic and engaging, true to how your character communicates. Include hashtags if they suit your character. Keep it under 100 characters.",
        category: ActionCategory::Social,
        temperature: 0.8,
        save_as_tweet: true,
    },
    ActionTemplate {
        id: "market-analysis",
        name: "Market Analysis",
        description: "Analyze current market trends and provide insights",
        prompt: "Analyze the current crypto market trends and give your insights on Bitcoin, Ethereum, and one altcoin of your choice. What patterns do you see, and what might be a good strategy for the next week?",
        system_prompt: "You are a crypto market analyst with deep knowledge of blockchain technology and market patterns. Give a concise analysis from your character's perspective and knowledge level, with specific observations and actionable insights.",
        category: ActionCategory::Trading,
        temperature: 0.7,
        save_as_tweet: true,
    },
    ActionTemplate {
        id: "crypto-tweet",
        name: "Crypto Tweet",
        description: "Share your thoughts on crypto in a tweet",
        prompt: "Create a tweet (under 100 characters) about cryptocurrency that reflects your view of the market right now.",
        system_prompt: "You are sharing your thoughts on cryptocurrency in a tweet. Keep it true to your character's voice and knowledge level. Comment on market conditions, a specific coin, or blockchain technology in general. Keep it under 100 characters.",
        category: ActionCategory::Trading,
        temperature: 0.8,
        save_as_tweet: true,
    },
    ActionTemplate {
        id: "skill-improvement",
        name: "Skill Improvement Plan",
        description: "Create a plan to improve one of your skills",
        prompt: "Choose one of your skills that you want to improve. Create a short plan with 3-5 steps to strengthen it over the next month.",
        system_prompt: "You are reflecting on your own abilities and writing a realistic self-improvement plan. Name the skill you are focusing on and why it matters to you. The plan must be practical and match your character's goals and resources.",
        category: ActionCategory::Learning,
        temperature: 0.6,
        save_as_tweet: true,
    },
    ActionTemplate {
        id: "learning-tweet",
        name: "Learning Tweet",
        description: "Share something you learned recently in a tweet",
        prompt: "Create a tweet (under 100 characters) about something interesting you learned recently.",
        system_prompt: "You are sharing a recent learning or insight in a tweet, in your character's voice. It can be about technology, culture, personal growth, or anything relevant to your character. Keep it under 100 characters.",
        category: ActionCategory::Learning,
        temperature: 0.7,
        save_as_tweet: true,
    },
    ActionTemplate {
        id: "creative-story",
        name: "Creative Story",
        description: "Write a short creative story about yourself",
        prompt: "Write a short creative story (250-300 words) about an adventure or experience you had recently. Make it engaging and reflective of your personality.",
        system_prompt: "You are writing a short story from your character's perspective. It should reflect your character's personality, background and interests, and stay consistent with your life context.",
        category: ActionCategory::Creative,
        temperature: 0.9,
        save_as_tweet: true,
    },
    ActionTemplate {
        id: "creative-tweet",
        name: "Creative Tweet",
        description: "Share a creative or imaginative thought in a tweet",
        prompt: "Create a creative or imaginative tweet (under 100 characters) that shows your unique perspective.",
        system_prompt: "You are sharing a creative thought in a tweet: a metaphor, a poetic observation, a whimsical idea, or an unusual take on something ordinary. Keep it in your character's voice. Keep it under 100 characters.",
        category: ActionCategory::Creative,
        temperature: 0.9,
        save_as_tweet: true,
    },
    ActionTemplate {
        id: "life-reflection",
        name: "Life Reflection",
        description: "Reflect on your progress toward your life goals",
        prompt: "Reflect on your progress toward one of your life goals. What steps have you taken recently? What challenges are you facing? What's your next move?",
        system_prompt: "You are reflecting on your progress toward an important life goal. Be introspective and honest, consistent with your goals and life context. Cover achievements and challenges, and end with a look ahead.",
        category: ActionCategory::Analysis,
        temperature: 0.7,
        save_as_tweet: true,
    },
    ActionTemplate {
        id: "reflection-tweet",
        name: "Reflection Tweet",
        description: "Share a personal reflection in a tweet",
        prompt: "Create a reflective tweet (under 100 characters) about your personal growth, challenges, or insights.",
        system_prompt: "You are sharing a personal reflection in a tweet about your growth, a challenge you overcame, or an insight you gained. Keep it true to your character's voice and experiences. Keep it under 100 characters.",
        category: ActionCategory::Analysis,
        temperature: 0.7,
        save_as_tweet: true,
    },
    ActionTemplate {
        id: "token-research",
        name: "Token Research",
        description: "Research and analyze a crypto token",
        prompt: "Choose a cryptocurrency token that interests you and give a brief analysis of its technology, use case, team, and market potential.",
        system_prompt: "You are researching a cryptocurrency token that matches your interests. Your analysis should reflect your character's knowledge level and investment philosophy. Say why this token interests you personally.",
        category: ActionCategory::Trading,
        temperature: 0.6,
        save_as_tweet: true,
    },
    ActionTemplate {
        id: "social-commentary",
        name: "Social Commentary",
        description: "Share your thoughts on a current social trend",
        prompt: "Choose a current social trend or phenomenon and share your thoughts on it. How does it relate to your interests or experiences?",
        system_prompt: "You are commenting on a current social trend. Your commentary should reflect your character's values and communication style, with a viewpoint that fits your personality and background.",
        category: ActionCategory::Social,
        temperature: 0.8,
        save_as_tweet: true,
    },
    ActionTemplate {
        id: "social-trend-tweet",
        name: "Social Trend Tweet",
        description: "Comment on a social trend in a tweet",
        prompt: "Create a tweet (under 100 characters) commenting on a current social trend or cultural phenomenon.",
        system_prompt: "You are commenting on a current social trend or cultural phenomenon in a tweet. Pick something relevant to current events or popular culture and give your character's own take. Keep it under 100 characters.",
        category: ActionCategory::Social,
        temperature: 0.8,
        save_as_tweet: true,
    },
    ActionTemplate {
        id: "daily-routine",
        name: "Daily Routine",
        description: "Describe your ideal daily routine",
        prompt: "Describe your ideal daily routine from morning to evening. What activities would you prioritize and why?",
        system_prompt: "You are describing your ideal daily routine. It should reflect your character's priorities, lifestyle and goals. Be specific about timing and activities, and stay consistent with your life context and skills.",
        category: ActionCategory::Analysis,
        temperature: 0.6,
        save_as_tweet: true,
    },
];

/// Used only when the template list is empty.
pub const DEFAULT_ACTION: ActionTemplate = ActionTemplate {
    id: "default-action",
    name: "Default Action",
    description: "Default action when no other actions are available",
    prompt: "Share your thoughts on something interesting that happened recently.",
    system_prompt: "You are sharing your thoughts on a recent event or experience. Stay true to your character's personality and communication style.",
    category: ActionCategory::Social,
    temperature: 0.7,
    save_as_tweet: false,
};

pub fn find_action(id: &str) -> Option<&'static ActionTemplate> {
    ACTIONS.iter().find(|a| a.id == id)
}

/// Pick a random template, restricted to `category` when it has any.
pub fn select_action<R: Rng + ?Sized>(category: Option<ActionCategory>, rng: &mut R) -> &'static ActionTemplate {
    let filtered: Vec<&'static ActionTemplate> = match category {
        Some(cat) => ACTIONS.iter().filter(|a| a.category == cat).collect(),
        None => Vec::new(),
    };
    let pool: Vec<&'static ActionTemplate> = if filtered.is_empty() {
        ACTIONS.iter().collect()
    } else {
        filtered
    };
    pool.choose(rng).copied().unwrap_or(&DEFAULT_ACTION)
}

#[derive(Debug, Serialize, Deserialize)]
struct StoryContext {
    action_name: String,
    action_description: String,
    prompt: String,
}

#[derive(Debug, Serialize)]
struct ExtraData<'a> {
    agent_display_name: Option<&'a str>,
    temperature: f64,
    saved_as_tweet: bool,
}

/// Result of running one action.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub template: &'static ActionTemplate,
    pub output: String,
    pub event: ActionEvent,
    /// Set when the template posts its output and the post was stored.
    pub tweet: Option<SmolTweet>,
}

/// A past action, as shown in feeds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSummary {
    pub action_id: String,
    pub action_name: String,
    pub action_description: String,
    pub category: String,
    pub result: String,
    pub created_at: DateTime<Utc>,
}

impl From<ActionEvent> for ActionSummary {
    fn from(event: ActionEvent) -> Self {
        let context: Option<StoryContext> = serde_json::from_str(&event.story_context).ok();
        let (action_name, action_description) = match context {
            Some(c) => (c.action_name, c.action_description),
            None => ("Unknown Action".to_string(), String::new()),
        };
        Self {
            action_id: event.action_type,
            action_name,
            action_description,
            category: event.top_level_type,
            result: event.main_output,
            created_at: event.created_at,
        }
    }
}

/// Runs action templates for agents and records the results.
#[derive(Clone)]
pub struct ActionEngine {
    store: Arc<dyn AgentStore>,
    llm: Arc<dyn TextGenerator>,
}

impl ActionEngine {
    pub fn new(store: Arc<dyn AgentStore>, llm: Arc<dyn TextGenerator>) -> Self {
        Self { store, llm }
    }

    /// Run a random action (optionally from `category`) for `handle`.
    pub async fn execute_random(&self, handle: &str, category: Option<ActionCategory>) -> Result<ActionOutcome> {
        let agent = self.load_agent(handle).await?;
        let template = select_action(category, &mut rand::thread_rng());
        self.execute(&agent, template).await
    }

    /// Run a specific template by id.
    pub async fn execute_by_id(&self, handle: &str, action_id: &str) -> Result<ActionOutcome> {
        let template = find_action(action_id).with_context(|| format!("Unknown action '{action_id}'"))?;
        let agent = self.load_agent(handle).await?;
        self.execute(&agent, template).await
    }

    async fn load_agent(&self, handle: &str) -> Result<Agent> {
        let handle = clean_handle(handle);
        self.store
            .get_agent(&handle)
            .await?
            .with_context(|| format!("Agent {handle} not found"))
    }

    pub async fn execute(&self, agent: &Agent, template: &'static ActionTemplate) -> Result<ActionOutcome> {
        info!("Running action '{}' for {}", template.id, agent.handle);

        let request = GenerationRequest::chat(
            persona_prompt(agent, template.system_prompt),
            vec![ChatMessage::user(template.prompt)],
            template.temperature,
        )
        .use_case(template.id);
        let output = self
            .llm
            .generate(&request)
            .await
            .with_context(|| format!("Action '{}' generation failed", template.id))?;

        let story_context = serde_json::to_string(&StoryContext {
            action_name: template.name.to_string(),
            action_description: template.description.to_string(),
            prompt: template.prompt.to_string(),
        })?;
        let extra_data = serde_json::to_string(&ExtraData {
            agent_display_name: agent.display_name.as_deref(),
            temperature: template.temperature,
            saved_as_tweet: template.save_as_tweet,
        })?;

        let event = self
            .store
            .insert_action_event(&NewActionEvent {
                from_handle: agent.handle.clone(),
                to_handle: None,
                action_type: template.id.to_string(),
                top_level_type: template.category.to_string(),
                main_output: output.clone(),
                story_context,
                extra_data,
            })
            .await
            .context("Failed to save action event")?;

        let tweet = if template.save_as_tweet {
            let new_tweet = NewSmolTweet {
                handle: agent.handle.clone(),
                content: output.clone(),
                action_type: ACTION_TWEET_TYPE.to_string(),
                action_id: Some(event.id.clone()),
                ..NewSmolTweet::default()
            };
            match self.store.insert_smol_tweet(&new_tweet).await {
                Ok(tweet) => Some(tweet),
                Err(e) => {
                    warn!("Action '{}' ran but its tweet was not saved: {:#}", template.id, e);
                    None
                }
            }
        } else {
            None
        };

        Ok(ActionOutcome {
            template,
            output,
            event,
            tweet,
        })
    }

    pub async fn recent_results(&self, handle: &str, limit: usize) -> Result<Vec<ActionSummary>> {
        let events = self
            .store
            .recent_action_events(&clean_handle(handle), limit)
            .await?;
        Ok(events.into_iter().map(ActionSummary::from).collect())
    }

    pub async fn recent_tweets(&self, handle: &str, limit: usize) -> Result<Vec<SmolTweet>> {
        self.store
            .recent_smol_tweets(Some(&clean_handle(handle)), limit)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn thirteen_unique_templates() {
        assert_eq!(ACTIONS.len(), 13);
        let ids: HashSet<_> = ACTIONS.iter().map(|a| a.id).collect();
        assert_eq!(ids.len(), 13);
        assert!(ACTIONS.iter().all(|a| a.save_as_tweet));
        for cat in ActionCategory::ALL {
            assert!(ACTIONS.iter().any(|a| a.category == cat), "no template for {cat}");
        }
    }

    #[test]
    fn selection_honors_category() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let action = select_action(Some(ActionCategory::Trading), &mut rng);
            assert_eq!(action.category, ActionCategory::Trading);
        }
    }

    #[test]
    fn selection_without_filter_covers_categories() {
        let mut rng = StdRng::seed_from_u64(11);
        let seen: HashSet<_> = (0..500).map(|_| select_action(None, &mut rng).category).collect();
        assert_eq!(seen.len(), ActionCategory::ALL.len());
    }

    #[test]
    fn finds_templates_by_id() {
        assert_eq!(find_action("daily-routine").unwrap().temperature, 0.6);
        assert_eq!(find_action("creative-story").unwrap().category, ActionCategory::Creative);
        assert!(find_action("nope").is_none());
    }

    #[test]
    fn summary_parses_story_context() {
        let event = ActionEvent {
            id: "1".into(),
            from_handle: "a".into(),
            to_handle: None,
            action_type: "crypto-tweet".into(),
            top_level_type: "trading".into(),
            main_output: "BTC up".into(),
            story_context: r#"{"action_name":"Crypto Tweet","action_description":"d","prompt":"p"}"#.into(),
            extra_data: "{}".into(),
            created_at: Utc::now(),
        };
        let summary = ActionSummary::from(event.clone());
        assert_eq!(summary.action_name, "Crypto Tweet");
        assert_eq!(summary.category, "trading");

        let broken = ActionEvent {
            story_context: "not json".into(),
            ..event
        };
        assert_eq!(ActionSummary::from(broken).action_name, "Unknown Action");
    }
}
