// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! rename-images: descriptive, dated file names for camera images
//!
//! Camera-style names such as `IMG_1234.JPG` are replaced with a date prefix
//! and a slug of what a vision model sees in the picture, e.g.
//! `2024-01-01-sunset-over-golden-gate-bridge.JPG`.

pub mod config;
pub mod date;
pub mod describe;
pub mod error;
pub mod naming;
pub mod pipeline;
pub mod plan;
pub mod report;
pub mod selector;

pub use config::AppConfig;
pub use error::{RenameError, Result};
