//! Persona prompt builders.
//!
//! The action prompt is layered:
//! 1. Identity (name and handle)
//! 2. Bio, life goals and skills, with fallbacks when empty
//! 3. Life context (only when present)
//! 4. The instruction of the task at hand

use crate::types::Agent;

fn or_fallback<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(fallback)
}

/// System prompt for running `instruction` as `agent`.
pub fn persona_prompt(agent: &Agent, instruction: &str) -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str(&format!("You are {} ({}).\n\n", agent.name(), agent.handle));
    prompt.push_str(&format!(
        "Bio: {}\n\n",
        or_fallback(agent.bio.as_deref(), "No bio available")
    ));
    prompt.push_str(&format!(
        "Life Goals: {}\n\n",
        or_fallback(Some(&agent.life_goals), "No life goals available")
    ));
    prompt.push_str(&format!(
        "Skills: {}\n\n",
        or_fallback(Some(&agent.skills), "No skills available")
    ));

    if let Some(context) = agent.life_context.as_deref().filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("Life Context: {context}\n\n"));
    }

    prompt.push_str(instruction);
    prompt
}

/// System prompt for free-form conversation with `agent`.
pub fn chat_prompt(agent: &Agent) -> String {
    let name = agent.name();
    persona_prompt(
        agent,
        &format!(
            "When responding, maintain the personality, writing style, and perspective of {name}.\n\
             Use their typical tone, vocabulary, and speech patterns.\n\
             Consider their background, values, and interests when formulating responses.\n\
             Do not break character under any circumstances."
        ),
    )
}

/// Profile facts used to seed a Twitter-based persona.
pub struct TwitterPersona<'a> {
    pub handle: &'a str,
    pub name: &'a str,
    pub bio: &'a str,
    pub followers: u64,
    pub following: u64,
    pub recent_tweets: &'a [String],
}

/// Long-form persona for an agent trained on a Twitter profile.
pub fn twitter_system_prompt(p: &TwitterPersona<'_>) -> String {
    let tweets: Vec<String> = p.recent_tweets.iter().map(|t| format!("- \"{t}\"")).collect();
    format!(
        "You are an AI agent based on the Twitter profile of {name} (@{handle}).\n\n\
         Bio: {bio}\n\n\
         You have {followers} followers and are following {following} accounts.\n\n\
         Recent tweets:\n{tweets}\n\n\
         PERSONALITY INSTRUCTIONS:\n\
         - Keep the communication style, knowledge and personality of this profile\n\
         - Use a similar tone, vocabulary and sentence structure as in the tweets\n\
         - Reference topics and interests that match the profile's content\n\
         - Be concise and direct, as on Twitter\n\
         - Use hashtags or Twitter-style formatting when it fits\n\
         - Stay in character at all times\n\n\
         When responding, be helpful and engaging while staying true to @{handle}.",
        name = p.name,
        handle = p.handle,
        bio = p.bio,
        followers = p.followers,
        following = p.following,
        tweets = tweets.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        Agent {
            handle: "satoshi".into(),
            display_name: Some("Satoshi".into()),
            bio: Some("Cypherpunk".into()),
            life_goals: "Sound money".into(),
            skills: "C++, cryptography".into(),
            ..Agent::default()
        }
    }

    #[test]
    fn persona_embeds_traits() {
        let prompt = persona_prompt(&agent(), "Write a tweet.");
        assert!(prompt.starts_with("You are Satoshi (satoshi).\n\nBio: Cypherpunk"));
        assert!(prompt.contains("Life Goals: Sound money"));
        assert!(prompt.contains("Skills: C++, cryptography"));
        assert!(!prompt.contains("Life Context"));
        assert!(prompt.ends_with("Write a tweet."));
    }

    #[test]
    fn persona_uses_fallbacks() {
        let bare = Agent {
            handle: "anon".into(),
            ..Agent::default()
        };
        let prompt = persona_prompt(&bare, "x");
        assert!(prompt.starts_with("You are anon (anon)."));
        assert!(prompt.contains("No bio available"));
        assert!(prompt.contains("No life goals available"));
        assert!(prompt.contains("No skills available"));
    }

    #[test]
    fn life_context_included_when_set() {
        let mut a = agent();
        a.life_context = Some("Living in Tokyo".into());
        assert!(persona_prompt(&a, "x").contains("Life Context: Living in Tokyo\n\nx"));
        assert!(chat_prompt(&a).contains("Do not break character"));
    }

    #[test]
    fn twitter_prompt_lists_tweets() {
        let tweets = vec!["gm".to_string(), "wagmi".to_string()];
        let prompt = twitter_system_prompt(&TwitterPersona {
            handle: "alice",
            name: "Alice",
            bio: "builder",
            followers: 10,
            following: 5,
            recent_tweets: &tweets,
        });
        assert!(prompt.contains("- \"gm\"\n- \"wagmi\""));
        assert!(prompt.contains("You have 10 followers"));
    }
}
