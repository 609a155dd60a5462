//! Chat-completion text service

use super::traits::TextService;
use super::{check_status, endpoint};
use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Text service backed by an OpenAI-compatible chat completion endpoint
pub struct OpenAiTextService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiTextService {
    /// Create a client from the text settings and key in `config`
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: config.http.build_client()?,
            base_url: config.script.base_url.clone(),
            api_key: config.keys.text_service_key.clone(),
            model: config.script.model.clone(),
        })
    }
}

#[async_trait]
impl TextService for OpenAiTextService {
    async fn complete(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: max_output_tokens,
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "v1/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = check_status("text", response).await?;

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| Error::Provider {
                service: "text",
                status: None,
                message: "response contained no completion".to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
