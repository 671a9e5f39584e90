// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image descriptions from vision models
//!
//! [`DescriptionRequester`] fans a file out over every requested
//! (model, prompt) pair. Each pair succeeds or fails on its own; failures are
//! returned as values and never abort the other pairs or files.

pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use futures_util::future::join_all;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};

use crate::config::{EngineConfig, Provider};
use crate::selector::ImageFile;
use crate::Result;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// Image bytes ready to send to a backend
#[derive(Debug, Clone)]
pub struct ImagePayload {
    /// MIME type, e.g. `image/jpeg`
    pub mime_type: String,
    /// Base64 of the file exactly as stored on disk
    pub base64: String,
}

impl ImagePayload {
    /// Read an image from disk without re-encoding it
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self {
            mime_type: mime_type_for(path),
            base64: general_purpose::STANDARD.encode(&data),
        })
    }

    /// `data:` URL form used by chat-style APIs
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

fn mime_type_for(path: &Path) -> String {
    if let Ok(format) = image::ImageFormat::from_path(path) {
        return format.to_mime_type().to_string();
    }
    // HEIF containers are not an `image` format
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("heic") => "image/heic".to_string(),
        Some("heif") => "image/heif".to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

/// A vision model that can describe an image
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Describe `image` with `model`, steered by `prompt`
    async fn describe(&self, image: &ImagePayload, model: &str, prompt: &str) -> Result<String>;
}

/// Build the backend selected by the configuration.
///
/// Fails with a configuration error when a required credential is missing.
pub fn build_backend(engine: &EngineConfig) -> Result<Arc<dyn VisionBackend>> {
    let timeout = Duration::from_secs(engine.timeout_secs);
    let backend: Arc<dyn VisionBackend> = match engine.provider {
        Provider::OpenAi => {
            let key = engine.api_key()?.unwrap_or_default();
            Arc::new(OpenAiClient::new(engine.base_url(), &key, timeout)?)
        }
        Provider::Ollama => Arc::new(OllamaClient::new(engine.base_url(), timeout)?),
    };
    Ok(backend)
}

/// One unit of description work
#[derive(Debug, Clone, Serialize)]
pub struct DescriptionRequest {
    pub file: ImageFile,
    pub model: String,
    pub prompt: String,
}

/// Why a single request produced no description
#[derive(Debug, Clone, Error)]
pub enum DescriptionFailure {
    #[error("cannot read image: {0}")]
    UnreadableImage(String),

    #[error("{0}")]
    Backend(String),

    #[error("cancelled")]
    Cancelled,
}

/// Outcome of one request
#[derive(Debug, Clone)]
pub struct DescriptionResult {
    pub request: DescriptionRequest,
    pub outcome: std::result::Result<String, DescriptionFailure>,
}

/// Runs every (model, prompt) pair against each file it is given
#[derive(Clone)]
pub struct DescriptionRequester {
    backend: Arc<dyn VisionBackend>,
    models: Vec<String>,
    prompts: Vec<String>,
    limiter: Arc<Semaphore>,
}

impl DescriptionRequester {
    /// `max_in_flight` bounds concurrent backend calls across all files
    pub fn new(
        backend: Arc<dyn VisionBackend>,
        models: Vec<String>,
        prompts: Vec<String>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            backend,
            models,
            prompts,
            limiter: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Every (model, prompt) pair, models outermost
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.models
            .iter()
            .flat_map(|model| {
                self.prompts
                    .iter()
                    .map(move |prompt| (model.clone(), prompt.clone()))
            })
            .collect()
    }

    /// More than one model or prompt was requested
    pub fn is_comparison(&self) -> bool {
        self.models.len() > 1 || self.prompts.len() > 1
    }

    /// Describe one file with one pair
    pub async fn describe(
        &self,
        file: &ImageFile,
        model: &str,
        prompt: &str,
    ) -> std::result::Result<String, DescriptionFailure> {
        let payload = ImagePayload::load(&file.path)
            .map_err(|e| DescriptionFailure::UnreadableImage(e.to_string()))?;
        self.describe_payload(&payload, model, prompt, None).await
    }

    /// Describe one file with every pair, in pair order.
    ///
    /// The image is read once and shared by all pairs. Pairs still waiting
    /// for a slot when `cancel` turns true fail with
    /// [`DescriptionFailure::Cancelled`] without reaching the backend.
    pub async fn describe_all(
        &self,
        file: &ImageFile,
        cancel: &watch::Receiver<bool>,
    ) -> Vec<DescriptionResult> {
        let requests: Vec<DescriptionRequest> = self
            .pairs()
            .into_iter()
            .map(|(model, prompt)| DescriptionRequest {
                file: file.clone(),
                model,
                prompt,
            })
            .collect();

        let payload = match ImagePayload::load(&file.path) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Cannot read {}: {}", file.path.display(), e);
                let failure = DescriptionFailure::UnreadableImage(e.to_string());
                return requests
                    .into_iter()
                    .map(|request| DescriptionResult {
                        request,
                        outcome: Err(failure.clone()),
                    })
                    .collect();
            }
        };

        let payload = &payload;
        join_all(requests.into_iter().map(|request| async move {
            let outcome = self
                .describe_payload(payload, &request.model, &request.prompt, Some(cancel))
                .await;
            DescriptionResult { request, outcome }
        }))
        .await
    }

    async fn describe_payload(
        &self,
        payload: &ImagePayload,
        model: &str,
        prompt: &str,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> std::result::Result<String, DescriptionFailure> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| DescriptionFailure::Backend(e.to_string()))?;

        if cancel.is_some_and(|rx| *rx.borrow()) {
            debug!("Not sending {} request for model={} after cancellation", self.backend.name(), model);
            return Err(DescriptionFailure::Cancelled);
        }

        debug!("Requesting description from {} model={}", self.backend.name(), model);
        match self.backend.describe(payload, model, prompt).await {
            // An empty reply is still a description; naming falls back to the placeholder
            Ok(text) => Ok(clean_response(&text)),
            Err(e) => {
                warn!("{} model {} failed: {}", self.backend.name(), model, e);
                Err(DescriptionFailure::Backend(e.to_string()))
            }
        }
    }
}

/// Reduce a model reply to the description line itself
pub fn clean_response(raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    line.trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '*')
        .trim_end_matches('.')
        .trim()
        .to_string()
}
