//! Google Gemini `generateContent` client.
//!
//! Each call picks one of the configured API keys at random.

use crate::llm::{GenerationRequest, TextGenerator};
use crate::types::ChatRole;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: String,
    api_keys: Vec<String>,
    model: String,
    thinking_model: String,
    http: reqwest::Client,
}

// -- generateContent request/response types ----------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<PartOut<'a>>,
}

#[derive(Debug, Serialize)]
struct PartOut<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartIn>,
}

#[derive(Debug, Deserialize)]
struct PartIn {
    #[serde(default)]
    text: Option<String>,
    /// Set on reasoning parts from thinking models.
    #[serde(default)]
    thought: bool,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_keys: Vec<String>, model: &str, thinking_model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_keys: api_keys.into_iter().filter(|k| !k.trim().is_empty()).collect(),
            model: model.to_string(),
            thinking_model: thinking_model.to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn pick_key(&self) -> Result<&str> {
        match self.api_keys.choose(&mut rand::thread_rng()) {
            Some(key) => Ok(key.as_str()),
            None => bail!("No Gemini API key configured"),
        }
    }

    fn build_request<'a>(request: &'a GenerationRequest) -> GenerateRequest<'a> {
        let contents = request
            .messages
            .iter()
            .map(|m| Content {
                role: Some(match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "model",
                }),
                parts: vec![PartOut { text: &m.content }],
            })
            .collect();

        GenerateRequest {
            system_instruction: request.system_prompt.as_deref().map(|text| Content {
                role: None,
                parts: vec![PartOut { text }],
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        }
    }
}

/// Concatenate the visible text of the first candidate.
fn extract_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content
        .parts
        .into_iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text)
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let model = if request.thinking {
            &self.thinking_model
        } else {
            &self.model
        };
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let key = self.pick_key()?;

        debug!("Calling Gemini [{}] on {}", request.use_case, model);

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&Self::build_request(request))
            .send()
            .await
            .context("Gemini request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Gemini generateContent failed ({}): {}", status, body);
        }

        let body: GenerateResponse = resp.json().await.context("Failed to parse Gemini response")?;
        let text = extract_text(body).context("Gemini returned no text")?;
        debug!("Gemini [{}] done ({} chars)", request.use_case, text.len());
        Ok(text)
    }
}
