// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for rename-images

use thiserror::Error;

/// Result type alias for rename-images operations
pub type Result<T> = std::result::Result<T, RenameError>;

/// Errors that abort a run, or that a single stage reports upward
#[derive(Error, Debug)]
pub enum RenameError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No valid input paths")]
    NoInputs,
}
