//! Agent creation from a Twitter profile or a character sheet.

use crate::agent::character::CharacterSheet;
use crate::agent::persona::{twitter_system_prompt, TwitterPersona};
use crate::identity::WalletProvisioner;
use crate::llm::{GenerationRequest, TextGenerator, ANALYSIS_TEMPERATURE};
use crate::notify::Notifier;
use crate::social::analysis::ProfileInfo;
use crate::social::{TrainingDataset, TwitterSource};
use crate::state::AgentStore;
use crate::types::{clean_handle, Agent, AgentPatch, GeneralAgent, SavedTweet, WalletRow};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Tweet samples shown to the LLM when deriving traits.
const PROMPT_SAMPLE_TWEETS: usize = 15;
/// Tweets quoted in the Twitter system prompt.
const SYSTEM_PROMPT_TWEETS: usize = 10;
/// Number of bundled `/avatars/{n}.png` images.
const AVATAR_COUNT: u32 = 10;

/// Result of a create call.
#[derive(Debug, Clone)]
pub struct TrainedAgent {
    pub agent: Agent,
    /// False when an existing agent was returned unchanged.
    pub created: bool,
    /// Wallet provisioned for the agent, if provisioning succeeded.
    pub wallet: Option<WalletRow>,
}

/// Personality, goals and skills derived by the LLM.
#[derive(Debug, Clone, Default)]
struct DerivedTraits {
    personality: String,
    life_goals: String,
    skills: String,
}

impl DerivedTraits {
    fn insights(&self) -> String {
        format!(
            "\n\nAdditional personality insights:\n{}\n\nLife goals:\n{}\n\nSkills:\n{}",
            self.personality, self.life_goals, self.skills
        )
    }
}

#[derive(Clone)]
pub struct AgentTrainer {
    store: Arc<dyn AgentStore>,
    llm: Arc<dyn TextGenerator>,
    twitter: Arc<dyn TwitterSource>,
    provisioner: WalletProvisioner,
    notifier: Arc<dyn Notifier>,
    max_tweets: usize,
    max_pages: usize,
}

impl AgentTrainer {
    pub fn new(
        store: Arc<dyn AgentStore>,
        llm: Arc<dyn TextGenerator>,
        twitter: Arc<dyn TwitterSource>,
        provisioner: WalletProvisioner,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            llm,
            twitter,
            provisioner,
            notifier,
            max_tweets: 92,
            max_pages: 2,
        }
    }

    /// Bound the tweets fetched per profile.
    pub fn with_tweet_limits(mut self, max_tweets: usize, max_pages: usize) -> Self {
        self.max_tweets = max_tweets;
        self.max_pages = max_pages;
        self
    }

    // -----------------------------------------------------------------------
    // Twitter
    // -----------------------------------------------------------------------

    /// Create an agent modeled on a Twitter profile, or return the existing one.
    pub async fn create_from_twitter(&self, handle: &str) -> Result<TrainedAgent> {
        let handle = clean_handle(handle);
        if handle.is_empty() {
            bail!("Twitter handle is required");
        }
        match self.train_from_twitter(&handle).await {
            Ok(trained) => Ok(trained),
            Err(e) => {
                error!("Error creating agent from Twitter profile {}: {:#}", handle, e);
                self.notifier
                    .notify(&format!("🔴 Error creating agent from Twitter profile: {handle}"))
                    .await;
                Err(e.context(format!("Failed to create agent from Twitter profile {handle}")))
            }
        }
    }

    async fn train_from_twitter(&self, handle: &str) -> Result<TrainedAgent> {
        if let Some(agent) = self.store.get_agent(handle).await? {
            info!("Agent for {} already exists", handle);
            return Ok(TrainedAgent {
                agent,
                created: false,
                wallet: None,
            });
        }

        let dataset = TrainingDataset::collect(self.twitter.as_ref(), handle, self.max_tweets, self.max_pages)
            .await
            .with_context(|| format!("Failed to create training dataset for {handle}"))?;
        info!(
            "Collected {} tweets for {} ({} samples)",
            dataset.tweets.len(),
            handle,
            dataset.content_samples.len()
        );

        let traits = self.derive_twitter_traits(&dataset).await?;

        let profile = &dataset.profile;
        let recent: Vec<String> = dataset
            .content_samples
            .iter()
            .take(SYSTEM_PROMPT_TWEETS)
            .cloned()
            .collect();
        let system_prompt = twitter_system_prompt(&TwitterPersona {
            handle,
            name: &profile.display_name,
            bio: &profile.bio,
            followers: profile.follower_count,
            following: profile.following_count,
            recent_tweets: &recent,
        }) + &traits.insights();

        let agent = self
            .store
            .insert_agent(&Agent {
                handle: handle.to_string(),
                display_name: Some(profile.display_name.clone()),
                bio: Some(profile.bio.clone()),
                life_goals: traits.life_goals.clone(),
                skills: traits.skills.clone(),
                life_context: Some(format!("{}\n\nSYSTEM PROMPT:\n{}", traits.personality, system_prompt)),
                profile_picture: profile.profile_image.clone(),
                cover_picture: profile.cover_image.clone(),
                twitter_id: Some(profile.handle.clone()),
                creator: None,
                created_at: Utc::now(),
            })
            .await
            .context("Failed to save agent")?;
        info!("Created agent {} from Twitter", agent.handle);

        let saved: Vec<SavedTweet> = dataset.tweets.iter().map(|t| t.to_saved(handle)).collect();
        match self.store.save_tweets(&saved).await {
            Ok(n) => info!("Saved {} tweets for {}", n, handle),
            Err(e) => warn!("Failed to save tweets for {}: {:#}", handle, e),
        }

        let wallet = self.provision(handle).await;
        Ok(TrainedAgent {
            agent,
            created: true,
            wallet,
        })
    }

    async fn derive_twitter_traits(&self, dataset: &TrainingDataset) -> Result<DerivedTraits> {
        let header = twitter_header(&dataset.profile, &dataset.content_samples);

        let personality = self
            .ask(
                format!(
                    "Analyze the following Twitter profile and tweet samples to create a detailed personality profile:\n\n\
                     {header}\n\n\
                     Based on these tweets, create a detailed personality profile including:\n\
                     {aspects}\n\n\
                     Format your response as a structured personality profile that could be used to train an AI \
                     to mimic this person's Twitter presence.",
                    aspects = PERSONALITY_ASPECTS,
                ),
                "agent-personality-generation",
            )
            .await?;

        let life_goals = self
            .ask(
                format!(
                    "Based on the following Twitter profile and tweet samples, infer what this person's life goals might be:\n\n\
                     {header}\n\n\
                     Provide a concise paragraph (3-5 sentences) describing what appear to be this person's main \
                     life goals and aspirations based on their Twitter content."
                ),
                "agent-life-goals-generation",
            )
            .await?;

        let skills = self
            .ask(
                format!(
                    "Based on the following Twitter profile and tweet samples, identify what skills this person likely has:\n\n\
                     {header}\n\n\
                     Provide a concise list of 5-10 skills this person likely possesses based on their Twitter content. \
                     Format as a comma-separated list."
                ),
                "agent-skills-generation",
            )
            .await?;

        Ok(DerivedTraits {
            personality,
            life_goals,
            skills,
        })
    }

    /// Update bio and profile picture of an existing agent from its live profile.
    pub async fn refresh(&self, handle: &str) -> Result<Agent> {
        let handle = clean_handle(handle);
        match self.refresh_inner(&handle).await {
            Ok(agent) => Ok(agent),
            Err(e) => {
                error!("Error updating agent from Twitter {}: {:#}", handle, e);
                self.notifier
                    .notify(&format!("🔴 Error updating agent from Twitter: {handle}"))
                    .await;
                Err(e.context(format!("Failed to update agent {handle} from Twitter")))
            }
        }
    }

    async fn refresh_inner(&self, handle: &str) -> Result<Agent> {
        if self.store.get_agent(handle).await?.is_none() {
            bail!("Agent {handle} not found");
        }
        let user = self.twitter.user_info(handle).await?;
        let profile = ProfileInfo::from_user(handle, &user);
        let patch = AgentPatch {
            bio: Some(profile.bio),
            profile_picture: profile.profile_image,
            ..AgentPatch::default()
        };
        let agent = self
            .store
            .update_agent(handle, &patch)
            .await?
            .with_context(|| format!("Agent {handle} not found"))?;
        info!("Refreshed {} from Twitter", handle);
        Ok(agent)
    }

    // -----------------------------------------------------------------------
    // Character sheets
    // -----------------------------------------------------------------------

    /// Create a character agent from a parsed sheet.
    ///
    /// The handle defaults to the character's name. `creator` is the address
    /// of the end user the agent is attributed to.
    pub async fn create_from_character(
        &self,
        sheet: &CharacterSheet,
        handle: Option<&str>,
        creator: Option<&str>,
    ) -> Result<TrainedAgent> {
        let handle = clean_handle(handle.unwrap_or(&sheet.name)).replace(char::is_whitespace, "_");
        if handle.is_empty() {
            bail!("Character handle is required");
        }
        match self.train_from_character(sheet, &handle, creator).await {
            Ok(trained) => Ok(trained),
            Err(e) => {
                error!("Error creating agent from character profile {}: {:#}", handle, e);
                self.notifier
                    .notify(&format!("🔴 Error creating agent from character profile: {handle}"))
                    .await;
                Err(e.context(format!("Failed to create agent from character profile {handle}")))
            }
        }
    }

    async fn train_from_character(
        &self,
        sheet: &CharacterSheet,
        handle: &str,
        creator: Option<&str>,
    ) -> Result<TrainedAgent> {
        if self.store.get_general_agent(handle).await?.is_some() {
            info!("Character agent for {} already exists", handle);
            let agent = self
                .store
                .get_agent(handle)
                .await?
                .with_context(|| format!("Character {handle} has no agent row"))?;
            return Ok(TrainedAgent {
                agent,
                created: false,
                wallet: None,
            });
        }
        if self.store.get_agent(handle).await?.is_some() {
            bail!("Handle {handle} already belongs to another agent");
        }

        let traits = self.derive_character_traits(sheet).await?;
        let system_prompt = character_system_prompt(sheet) + &traits.insights();
        let avatar = rand::thread_rng().gen_range(1..=AVATAR_COUNT);

        let background = sheet.background.trim();
        self.store
            .insert_general_agent(&GeneralAgent {
                handle: handle.to_string(),
                name: sheet.name.clone(),
                description: sheet.description.trim().to_string(),
                agent_type: "character".to_string(),
                traits: sheet.personality.clone(),
                background: (!background.is_empty()).then(|| background.to_string()),
                system_prompt,
                is_public: true,
                profile_picture: Some(format!("/avatars/{avatar}.png")),
                created_at: Utc::now(),
            })
            .await
            .context("Failed to save character agent")?;

        let agent = self
            .store
            .insert_agent(&Agent {
                handle: handle.to_string(),
                display_name: Some(sheet.name.clone()),
                bio: Some(sheet.description.trim().to_string()),
                life_goals: traits.life_goals,
                skills: traits.skills,
                life_context: Some(traits.personality),
                profile_picture: Some(format!("/avatars/{avatar}.png")),
                cover_picture: None,
                twitter_id: None,
                creator: creator.map(|c| c.to_lowercase()),
                created_at: Utc::now(),
            })
            .await
            .context("Failed to save agent")?;
        info!("Created character agent {} ({})", agent.handle, sheet.name);

        if let Some(address) = creator {
            if let Err(e) = self.store.set_agent_created(address).await {
                warn!("Failed to mark {} as agent creator: {:#}", address, e);
            }
        }

        let wallet = self.provision(handle).await;
        Ok(TrainedAgent {
            agent,
            created: true,
            wallet,
        })
    }

    async fn derive_character_traits(&self, sheet: &CharacterSheet) -> Result<DerivedTraits> {
        let header = format!(
            "Name: {}\nDescription: {}\nTraits: {}\nBackground: {}",
            sheet.name,
            sheet.description.trim(),
            sheet.personality.join(", "),
            sheet.background.trim()
        );

        let personality = self
            .ask(
                format!(
                    "Create a detailed personality profile for a fictional character with the following attributes:\n\n\
                     {header}\n\n\
                     Based on these details, create a comprehensive personality profile including:\n\
                     {aspects}\n\n\
                     Format your response as a structured personality profile that could be used to train an AI \
                     to embody this character.",
                    aspects = PERSONALITY_ASPECTS,
                ),
                "character-personality-generation",
            )
            .await?;

        let life_goals = self
            .ask(
                format!(
                    "Based on the following character profile, infer what this character's life goals might be:\n\n\
                     {header}\n\n\
                     Provide a concise paragraph (3-5 sentences) describing what would be this character's main \
                     life goals and aspirations."
                ),
                "character-life-goals-generation",
            )
            .await?;

        let skills = self
            .ask(
                format!(
                    "Based on the following character profile, identify what skills this character would likely have:\n\n\
                     {header}\n\n\
                     Provide a concise list of 5-10 skills this character would likely possess. \
                     Format as a comma-separated list."
                ),
                "character-skills-generation",
            )
            .await?;

        Ok(DerivedTraits {
            personality,
            life_goals,
            skills,
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn ask(&self, prompt: String, use_case: &str) -> Result<String> {
        let request = GenerationRequest::prompt(prompt, ANALYSIS_TEMPERATURE).use_case(use_case);
        let text = self
            .llm
            .generate(&request)
            .await
            .with_context(|| format!("LLM call {use_case} failed"))?;
        Ok(text.trim().to_string())
    }

    async fn provision(&self, handle: &str) -> Option<WalletRow> {
        match self.provisioner.ensure_wallet(handle).await {
            Ok(wallet) => Some(wallet),
            Err(e) => {
                error!("Failed to provision wallet for {}: {:#}", handle, e);
                self.notifier
                    .notify(&format!("🔴 Error creating wallet for agent: {handle}"))
                    .await;
                None
            }
        }
    }
}

const PERSONALITY_ASPECTS: &str = "\
1. Writing style and tone
2. Main interests and topics
3. Values and beliefs
4. Communication patterns
5. Typical responses to different situations
6. Vocabulary and language patterns
7. Emotional tendencies";

fn twitter_header(profile: &ProfileInfo, samples: &[String]) -> String {
    let tweets: Vec<&str> = samples
        .iter()
        .take(PROMPT_SAMPLE_TWEETS)
        .map(String::as_str)
        .collect();
    format!(
        "Twitter Handle: {}\nDisplay Name: {}\nBio: {}\n\nTweet Samples:\n{}",
        profile.handle,
        profile.display_name,
        profile.bio,
        tweets.join("\n\n")
    )
}

/// Base system prompt of a character agent, before the derived insights.
pub fn character_system_prompt(sheet: &CharacterSheet) -> String {
    let mut prompt = format!(
        "You are an AI agent based on the character: {}.\n\nDescription: {}\n\n",
        sheet.name,
        sheet.description.trim()
    );
    if !sheet.personality.is_empty() {
        prompt.push_str(&format!("Personality traits: {}\n", sheet.personality.join(", ")));
    }
    let background = sheet.background.trim();
    if !background.is_empty() {
        prompt.push_str(&format!("\nBackground: {background}\n"));
    }
    prompt.push_str(&format!(
        "\nPERSONALITY INSTRUCTIONS:\n\
         - Embody the personality traits listed above in all your interactions\n\
         - Use vocabulary, expressions, and speech patterns that reflect this character\n\
         - Make references to your background story when relevant\n\
         - Express opinions and perspectives that align with your character's values\n\
         - Maintain consistent emotional responses based on your character's personality\n\
         - If asked about topics outside your character's knowledge, respond as your character would when encountering new information\n\
         - Stay in character at all times, even when answering factual questions\n\n\
         When responding to messages, be helpful, informative, and engaging while staying true to the character of {}.",
        sheet.name
    ));
    if !sheet.system_prompt.trim().is_empty() {
        prompt.push_str("\n\nCHARACTER SHEET:\n");
        prompt.push_str(sheet.system_prompt.trim());
    }
    prompt
}
