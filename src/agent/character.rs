//! Character sheets in JSON, plain-text or Markdown form.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExampleExchange {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub agent: String,
}

/// A parsed character definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterSheet {
    pub name: String,
    pub description: String,
    pub personality: Vec<String>,
    pub background: String,
    pub examples: Vec<ExampleExchange>,
    pub system_prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterFormat {
    Json,
    Text,
    Markdown,
}

impl CharacterFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "txt" => Ok(Self::Text),
            "md" => Ok(Self::Markdown),
            _ => bail!("Unsupported file format: {}", path.display()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonCharacter {
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    personality: Option<serde_json::Value>,
    #[serde(default)]
    background: Option<String>,
    #[serde(default)]
    examples: Option<serde_json::Value>,
    #[serde(default)]
    system_prompt: Option<String>,
}

impl CharacterSheet {
    pub fn from_file(path: &Path) -> Result<Self> {
        let format = CharacterFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content, format)
    }

    /// Parse `content`. A missing system prompt is generated from the sheet.
    pub fn parse(content: &str, format: CharacterFormat) -> Result<Self> {
        let mut sheet = match format {
            CharacterFormat::Json => parse_json(content)?,
            CharacterFormat::Text => parse_text(content)?,
            CharacterFormat::Markdown => parse_markdown(content),
        };
        if sheet.system_prompt.trim().is_empty() {
            sheet.system_prompt = sheet.generated_system_prompt();
        }
        Ok(sheet)
    }

    /// System prompt derived from the sheet's fields.
    pub fn generated_system_prompt(&self) -> String {
        let mut prompt = format!("You are {}", self.name);
        let description = self.description.trim();
        if !description.is_empty() {
            prompt.push_str(", ");
            prompt.push_str(description);
        }
        prompt.push_str(".\n\n");

        if !self.personality.is_empty() {
            prompt.push_str("Personality traits:\n");
            for trait_ in &self.personality {
                prompt.push_str(&format!("- {trait_}\n"));
            }
            prompt.push('\n');
        }

        let background = self.background.trim();
        if !background.is_empty() {
            prompt.push_str(&format!("Background: {background}\n\n"));
        }

        prompt.push_str("Guidelines:\n");
        prompt.push_str("- Stay in character at all times\n");
        prompt.push_str("- Respond as this character would, maintaining their personality and tone\n");
        prompt.push_str("- Reference the character's background and traits in responses when relevant\n");

        if !self.examples.is_empty() {
            prompt.push_str("\nExample conversations:\n");
            for ex in &self.examples {
                prompt.push_str(&format!("User: {}\nYou: {}\n", ex.user, ex.agent));
            }
        }
        prompt
    }
}

fn parse_json(content: &str) -> Result<CharacterSheet> {
    let data: JsonCharacter = serde_json::from_str(content).context("Invalid JSON format")?;
    let name = data
        .name
        .filter(|n| !n.trim().is_empty())
        .context("Character name is required in JSON format")?;

    // Non-array personality or examples are ignored rather than rejected.
    let personality = match data.personality {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    };
    let examples = match data.examples {
        Some(v @ serde_json::Value::Array(_)) => serde_json::from_value(v).unwrap_or_default(),
        _ => Vec::new(),
    };

    Ok(CharacterSheet {
        name: name.trim().to_string(),
        description: data.description.unwrap_or_default(),
        personality,
        background: data.background.unwrap_or_default(),
        examples,
        system_prompt: data.system_prompt.unwrap_or_default(),
    })
}

fn parse_text(content: &str) -> Result<CharacterSheet> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let Some(first) = lines.next() else {
        bail!("Character file is empty");
    };
    let name = first.trim().to_string();
    let description = lines.collect::<Vec<_>>().join("\n");
    let system_prompt = format!(
        "You are {name}, a character with the following description:\n\n{description}\n\n\
         Respond as this character would, maintaining their personality and tone."
    );
    Ok(CharacterSheet {
        name,
        description,
        system_prompt,
        ..CharacterSheet::default()
    })
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Description,
    Personality,
    Background,
    Examples,
    SystemPrompt,
}

fn parse_markdown(content: &str) -> CharacterSheet {
    let mut sheet = CharacterSheet {
        name: "Unknown Character".to_string(),
        ..CharacterSheet::default()
    };
    let mut section = Section::None;
    let mut pending = ExampleExchange::default();

    let flush = |pending: &mut ExampleExchange, examples: &mut Vec<ExampleExchange>| {
        if !pending.user.is_empty() || !pending.agent.is_empty() {
            examples.push(std::mem::take(pending));
        }
    };

    for line in content.lines() {
        if let Some(name) = line.strip_prefix("# ") {
            sheet.name = name.trim().to_string();
            section = Section::None;
        } else if line.starts_with("## Description") || line.starts_with("## About") {
            section = Section::Description;
            sheet.description.clear();
        } else if line.starts_with("## Personality") || line.starts_with("## Traits") {
            section = Section::Personality;
            sheet.personality.clear();
        } else if line.starts_with("## Background") || line.starts_with("## History") {
            section = Section::Background;
            sheet.background.clear();
        } else if line.starts_with("## Examples") || line.starts_with("## Conversations") {
            section = Section::Examples;
            sheet.examples.clear();
        } else if line.starts_with("## System Prompt") || line.starts_with("## Prompt") {
            section = Section::SystemPrompt;
            sheet.system_prompt.clear();
        } else {
            let trimmed = line.trim();
            match section {
                Section::Description => {
                    sheet.description.push_str(line);
                    sheet.description.push('\n');
                }
                Section::Personality => {
                    if let Some(item) = trimmed.strip_prefix("- ") {
                        sheet.personality.push(item.to_string());
                    }
                }
                Section::Background => {
                    sheet.background.push_str(line);
                    sheet.background.push('\n');
                }
                Section::Examples => {
                    if let Some(user) = trimmed.strip_prefix("User: ") {
                        flush(&mut pending, &mut sheet.examples);
                        pending.user = user.to_string();
                    } else if let Some(agent) = trimmed.strip_prefix("Agent: ") {
                        pending.agent = agent.to_string();
                        if !pending.user.is_empty() {
                            flush(&mut pending, &mut sheet.examples);
                        }
                    }
                }
                Section::SystemPrompt => {
                    sheet.system_prompt.push_str(line);
                    sheet.system_prompt.push('\n');
                }
                Section::None => {}
            }
        }
    }
    flush(&mut pending, &mut sheet.examples);
    sheet
}
