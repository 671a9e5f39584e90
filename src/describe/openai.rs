// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! OpenAI-compatible chat completions client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ImagePayload, VisionBackend};
use crate::{RenameError, Result};

/// Client for `/chat/completions` on OpenAI or a compatible server
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        // Accept either the API root or a full endpoint URL
        let base_url = base_url
            .trim_end_matches('/')
            .trim_end_matches("/chat/completions")
            .to_string();

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    fn build_request<'a>(model: &'a str, prompt: &'a str, image: &ImagePayload) -> ChatRequest<'a> {
        ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_url(),
                        },
                    },
                ],
            }],
        }
    }

    fn extract_text(response: ChatResponse) -> Result<String> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RenameError::Backend("response contained no message content".to_string()))
    }
}

#[async_trait]
impl VisionBackend for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn describe(&self, image: &ImagePayload, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = Self::build_request(model, prompt, image);

        debug!("Sending vision request to {}: model={}", url, model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(RenameError::Backend(format!(
                "server returned status {}: {}",
                status, snippet
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        Self::extract_text(parsed)
    }
}
