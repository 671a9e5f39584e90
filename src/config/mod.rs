// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for rename-images

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{RenameError, Result};

/// Smallest accepted bound on a generated base name: the date prefix plus
/// room for a short slug and a collision suffix.
pub const MIN_MAX_LENGTH: usize = 24;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Vision backend configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Naming rules
    #[serde(default)]
    pub rules: RuleConfig,
}

/// Which vision backend to talk to
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI-compatible chat completions endpoint
    OpenAi,
    /// Local Ollama server
    Ollama,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_provider")]
    pub provider: Provider,
    /// Base URL of the backend; `None` uses the provider's default
    #[serde(default)]
    pub url: Option<String>,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_prompt")]
    pub default_prompt: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RuleConfig {
    /// Upper bound on the generated base name, date prefix and suffix included
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Slug used when a description has no usable characters
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    /// Number of files described concurrently
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

// Default value functions
fn default_provider() -> Provider { Provider::OpenAi }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_model() -> String { "gpt-4o-mini".to_string() }
fn default_timeout() -> u64 { 120 }
fn default_max_length() -> usize { 72 }
fn default_placeholder() -> String { "image".to_string() }
fn default_jobs() -> usize { 4 }

fn default_prompt() -> String {
    "You are a helpful assistant that names image files. \
     Describe this image in a concise way that would make a good filename. \
     Focus on the main subject and key details. \
     Keep it brief but descriptive. \
     Example descriptions: \
     Sunset over Golden Gate Bridge; \
     Two Cats Playing with Red Yarn; \
     Mountain Lake Reflecting Snow Peaks; \
     Child Blowing Birthday Candles. \
     Return ONLY the description.".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            rules: RuleConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: None,
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            default_prompt: default_prompt(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            placeholder: default_placeholder(),
            jobs: default_jobs(),
        }
    }
}

impl Provider {
    /// Default endpoint for this provider
    pub fn default_url(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Ollama => "http://localhost:11434",
        }
    }

    /// Whether this provider needs an API key
    pub fn requires_credential(self) -> bool {
        matches!(self, Provider::OpenAi)
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            other => Err(format!("unknown provider '{}' (expected openai or ollama)", other)),
        }
    }
}

impl EngineConfig {
    /// Endpoint to use, falling back to the provider default
    pub fn base_url(&self) -> &str {
        self.url.as_deref().unwrap_or_else(|| self.provider.default_url())
    }

    /// Read the API key from the configured environment variable.
    ///
    /// Returns `Ok(None)` for providers that do not need one.
    pub fn api_key(&self) -> Result<Option<String>> {
        if !self.provider.requires_credential() {
            return Ok(None);
        }
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
            _ => Err(RenameError::Config(format!(
                "{} environment variable not set. Get one from https://platform.openai.com/api-keys",
                self.api_key_env
            ))),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| RenameError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.rules.max_length < MIN_MAX_LENGTH {
            return Err(RenameError::Config(format!(
                "rules.max_length must be at least {}, got {}",
                MIN_MAX_LENGTH, self.rules.max_length
            )));
        }
        if !(1..=20).contains(&self.rules.jobs) {
            return Err(RenameError::Config(format!(
                "rules.jobs must be between 1 and 20, got {}",
                self.rules.jobs
            )));
        }
        let placeholder_ok = !self.rules.placeholder.is_empty()
            && self.rules.placeholder
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
        if !placeholder_ok {
            return Err(RenameError::Config(
                "rules.placeholder must be lowercase ASCII letters and digits".to_string(),
            ));
        }
        if self.engine.default_model.trim().is_empty() {
            return Err(RenameError::Config("engine.default_model is empty".to_string()));
        }
        if self.engine.default_prompt.trim().is_empty() {
            return Err(RenameError::Config("engine.default_prompt is empty".to_string()));
        }
        Ok(())
    }
}
