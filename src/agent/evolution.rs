//! Gradual rewriting of an agent's evolving traits.

use crate::agent::persona::persona_prompt;
use crate::llm::{GenerationRequest, TextGenerator};
use crate::state::AgentStore;
use crate::types::{clean_handle, Agent, NewActionEvent, TraitKind, TraitUpdate};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::json;
use similar::{ChangeTag, TextDiff};
use std::sync::Arc;
use tracing::info;

/// `top_level_type` of events recorded for trait rewrites.
pub const EVOLUTION_EVENT_TYPE: &str = "evolution";

const EVOLUTION_TEMPERATURE: f64 = 0.6;
/// Recent actions shown to the LLM as lived experience.
const RECENT_ACTIONS: usize = 5;

pub struct TraitEvolver {
    store: Arc<dyn AgentStore>,
    llm: Arc<dyn TextGenerator>,
}

impl TraitEvolver {
    pub fn new(store: Arc<dyn AgentStore>, llm: Arc<dyn TextGenerator>) -> Self {
        Self { store, llm }
    }

    /// Rewrite one trait of `handle` in light of its recent actions.
    pub async fn evolve(&self, handle: &str, kind: TraitKind) -> Result<TraitUpdate> {
        let handle = clean_handle(handle);
        let agent = self
            .store
            .get_agent(&handle)
            .await?
            .with_context(|| format!("Agent {handle} not found"))?;

        let recent = self.store.recent_action_events(&handle, RECENT_ACTIONS).await?;
        let experiences: Vec<String> = recent
            .iter()
            .filter(|e| e.top_level_type != EVOLUTION_EVENT_TYPE)
            .map(|e| format!("- [{}] {}", e.action_type, e.main_output.trim()))
            .collect();

        let previous = kind.current(&agent).to_string();
        let request = GenerationRequest::prompt(evolution_prompt(&agent, kind, &experiences), EVOLUTION_TEMPERATURE)
            .use_case(format!("agent-evolve-{kind}"));
        let new = self
            .llm
            .generate(&request)
            .await
            .with_context(|| format!("Failed to evolve {} of {handle}", kind.label()))?
            .trim()
            .to_string();
        if new.is_empty() {
            bail!("Model returned empty {} for {handle}", kind.label());
        }

        let summary = summarize_changes(&previous, &new);
        let event = self
            .store
            .insert_action_event(&NewActionEvent {
                from_handle: handle.clone(),
                to_handle: None,
                action_type: format!("evolve-{kind}"),
                top_level_type: EVOLUTION_EVENT_TYPE.to_string(),
                main_output: new.clone(),
                story_context: json!({ "trait": kind, "previous": previous }).to_string(),
                extra_data: json!({ "summary": summary, "experiences": experiences.len() }).to_string(),
            })
            .await
            .context("Failed to record evolution event")?;

        let update = TraitUpdate {
            id: ulid::Ulid::new().to_string(),
            handle: handle.clone(),
            action_id: Some(event.id),
            previous,
            new: new.clone(),
            summary_of_the_changes: summary,
            created_at: Utc::now(),
        };
        self.store.insert_trait_update(kind, &update).await?;
        self.store
            .update_agent(&handle, &kind.patch(new))
            .await?
            .with_context(|| format!("Agent {handle} disappeared during evolution"))?;

        info!("Evolved {} of {}: {}", kind.label(), handle, update.summary_of_the_changes);
        Ok(update)
    }

    pub async fn history(&self, handle: &str, kind: TraitKind, limit: usize) -> Result<Vec<TraitUpdate>> {
        self.store.trait_history(kind, &clean_handle(handle), limit).await
    }
}

fn evolution_prompt(agent: &Agent, kind: TraitKind, experiences: &[String]) -> String {
    let current = kind.current(agent);
    let experiences = if experiences.is_empty() {
        "No recent activity.".to_string()
    } else {
        experiences.join("\n")
    };
    persona_prompt(
        agent,
        &format!(
            "Your current {label} are:\n{current}\n\n\
             Recent things you did:\n{experiences}\n\n\
             Rewrite your {label} to reflect how these experiences changed you. \
             Keep what still holds and evolve the rest gradually. \
             Reply with the new {label} only, in the same format as the current ones.",
            label = kind.label(),
            current = if current.trim().is_empty() { "(none yet)" } else { current },
        ),
    )
}

/// Line-level summary of what changed between two trait texts.
pub fn summarize_changes(previous: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(previous, new);
    let mut added = Vec::new();
    let mut removed = Vec::new();
    for change in diff.iter_all_changes() {
        let line = change.value().trim();
        if line.is_empty() {
            continue;
        }
        match change.tag() {
            ChangeTag::Insert => added.push(line.to_string()),
            ChangeTag::Delete => removed.push(line.to_string()),
            ChangeTag::Equal => {}
        }
    }
    if added.is_empty() && removed.is_empty() {
        return "No changes".to_string();
    }

    let mut summary = format!("{} line(s) added, {} line(s) removed", added.len(), removed.len());
    for line in &removed {
        summary.push_str(&format!("\n- {line}"));
    }
    for line in &added {
        summary.push_str(&format!("\n+ {line}"));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_added_and_removed_lines() {
        let summary = summarize_changes("learn rust\nship app\n", "learn rust\nship a startup\n");
        assert!(summary.starts_with("1 line(s) added, 1 line(s) removed"));
        assert!(summary.contains("\n- ship app"));
        assert!(summary.contains("\n+ ship a startup"));
    }

    #[test]
    fn identical_text_has_no_changes() {
        assert_eq!(summarize_changes("a\nb", "a\nb"), "No changes");
    }

    #[test]
    fn prompt_mentions_trait_and_experiences() {
        let agent = Agent {
            handle: "bob".into(),
            skills: "painting".into(),
            ..Agent::default()
        };
        let prompt = evolution_prompt(&agent, TraitKind::Skills, &["- [creative-story] wrote a poem".into()]);
        assert!(prompt.contains("Your current skills are:\npainting"));
        assert!(prompt.contains("wrote a poem"));

        let empty = evolution_prompt(&agent, TraitKind::LifeGoals, &[]);
        assert!(empty.contains("(none yet)"));
        assert!(empty.contains("No recent activity."));
    }
}
