//! Story generation over an OpenAI-compatible chat endpoint.
//!
//! Defaults to a local Ollama server (`http://localhost:11434/v1`), but any
//! endpoint exposing `/chat/completions` works. One attempt per request;
//! the caller bounds the overall wait.

use async_trait::async_trait;
use serde::Deserialize;
use storyverse_config::GenerationConfig;
use storyverse_core::error::GenerationError;
use storyverse_core::{Context, StoryDraft, StoryGenerator};
use tracing::{debug, warn};

use crate::story_format::{mentioned_names, parse_story, render_prompt};

const SYSTEM_PROMPT: &str =
    "You are a children's story writer. Follow the requested format exactly.";

pub struct OllamaStoryGenerator {
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    default_word_count: u32,
    client: reqwest::Client,
}

impl OllamaStoryGenerator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::from_config(&GenerationConfig {
            base_url: base_url.into(),
            model: model.into(),
            ..Default::default()
        })
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            default_word_count: config.default_word_count,
            client,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the endpoint answers its model listing.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
        })
    }
}

#[async_trait]
impl StoryGenerator for OllamaStoryGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        prompt: &str,
        context: &Context,
    ) -> std::result::Result<StoryDraft, GenerationError> {
        let word_count = context.request.word_count.unwrap_or(self.default_word_count);
        let full_prompt = render_prompt(context, word_count, prompt);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %self.model, word_count, "Sending story request");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&self.request_body(&full_prompt))
            .send()
            .await
            .map_err(|e| GenerationError::Failed(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Story endpoint returned error");
            return Err(GenerationError::Failed(format!("HTTP {status}: {error_body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(format!("Failed to parse response: {e}")))?;
        let reply = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::Malformed("No choices in response".into()))?;

        draft_from_reply(&reply, context)
    }
}

/// Turn a raw reply into a draft for `context`.
pub fn draft_from_reply(reply: &str, context: &Context) -> Result<StoryDraft, GenerationError> {
    let parsed = parse_story(reply)?;
    let names = mentioned_names(&parsed.body, context);
    debug!(title = %parsed.title, mentions = names.len(), "Story reply parsed");

    Ok(StoryDraft {
        title: parsed.title,
        body: parsed.body,
        theme: context.request.theme.clone(),
        age_group: context.request.age_group.clone(),
        moral: parsed.moral,
        referenced_entity_names: names,
        ..Default::default()
    })
}

// --- OpenAI-compatible API types ---

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyverse_core::{Character, ContextStats, EntityId, Location, StoryRequest};

    fn context() -> Context {
        let ammu = Character::new(EntityId::from("CHAR2025010100001"), "Ammu", vec![], "").unwrap();
        let chennai = Location::new(EntityId::from("LOC2025010100001"), "Chennai", "").unwrap();
        Context {
            request: StoryRequest {
                character_ids: vec![ammu.id.clone()],
                location_id: chennai.id.clone(),
                theme: "Courage".into(),
                age_group: "8-10".into(),
                word_count: None,
            },
            characters: vec![ammu],
            location: chennai,
            related: vec![],
            relationships: vec![],
            stats: ContextStats::default(),
        }
    }

    #[test]
    fn constructor_trims_base_url() {
        let generator = OllamaStoryGenerator::new("http://localhost:11434/v1/", "llama3");
        assert_eq!(generator.base_url, "http://localhost:11434/v1");
        assert_eq!(generator.model(), "llama3");
        assert_eq!(generator.name(), "ollama");
    }

    #[test]
    fn request_body_uses_configured_model() {
        let generator = OllamaStoryGenerator::from_config(&GenerationConfig::default());
        let body = generator.request_body("hello");
        assert_eq!(body["model"], "mistral");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn reply_becomes_draft_with_request_metadata() {
        let reply = "Title: Brave Ammu\n\nStory:\nAmmu saved Chennai.\n\nMoral Lesson:\nHelp others.";
        let draft = draft_from_reply(reply, &context()).unwrap();
        assert_eq!(draft.title, "Brave Ammu");
        assert_eq!(draft.theme, "Courage");
        assert_eq!(draft.age_group, "8-10");
        assert_eq!(draft.referenced_entity_names, vec!["Ammu", "Chennai"]);
        assert!(draft.referenced_entities.is_empty());
    }

    #[test]
    fn chat_response_deserializes() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"Title: X"}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Title: X"));
    }
}
