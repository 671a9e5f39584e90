// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Filename synthesis
//!
//! Turns a free-text description into a lowercase, hyphenated slug, adds the
//! date prefix and keeps the result unique among planned targets and files
//! already on disk.

use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::RuleConfig;
use crate::date::ResolvedDate;
use crate::selector::ImageFile;

/// Length of `YYYY-MM-DD-`
pub const DATE_PREFIX_LEN: usize = 11;

const ARTICLES: &[&str] = &["a", "an", "the"];

/// Targets already claimed during this run
#[derive(Debug, Default, Clone)]
pub struct TargetRegistry {
    planned: HashSet<PathBuf>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.planned.contains(path)
    }

    pub fn claim(&mut self, path: PathBuf) {
        self.planned.insert(path);
    }

    pub fn len(&self) -> usize {
        self.planned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planned.is_empty()
    }
}

/// A unique name for one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueName {
    /// Base name without extension
    pub base_name: String,
    /// Full target path, original extension kept
    pub target: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FilenameSynthesizer {
    max_length: usize,
    placeholder: String,
}

impl FilenameSynthesizer {
    pub fn new(max_length: usize, placeholder: impl Into<String>) -> Self {
        Self {
            max_length,
            placeholder: placeholder.into(),
        }
    }

    pub fn from_rules(rules: &RuleConfig) -> Self {
        Self::new(rules.max_length, rules.placeholder.clone())
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Slug for a description, without length bound or date
    pub fn slugify(&self, description: &str) -> String {
        let stripped = leading_date_re().replace(description, "");
        let lowered = stripped.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
            .filter(|w| !w.is_empty() && !ARTICLES.contains(w))
            .collect();

        if words.is_empty() {
            self.placeholder.clone()
        } else {
            words.join("-")
        }
    }

    /// Base name (no extension) for a description and optional date
    pub fn synthesize(&self, description: &str, date: Option<&ResolvedDate>) -> String {
        self.compose(date, &self.slugify(description), None)
    }

    /// Synthesize, then append `-2`, `-3`, … until the target is free.
    ///
    /// A target is taken when it is already in `registry` or exists on disk
    /// and is not `source` itself. The chosen target is claimed.
    pub fn unique_name(
        &self,
        source: &ImageFile,
        description: &str,
        date: Option<&ResolvedDate>,
        registry: &mut TargetRegistry,
    ) -> UniqueName {
        let slug = self.slugify(description);
        let parent = source.parent();

        let mut n = 1usize;
        loop {
            let suffix = (n > 1).then(|| format!("-{}", n));
            let base_name = self.compose(date, &slug, suffix.as_deref());
            let target = parent.join(format!("{}.{}", base_name, source.extension));
            if is_available(&target, &source.path, registry) {
                registry.claim(target.clone());
                return UniqueName { base_name, target };
            }
            n += 1;
        }
    }

    fn compose(&self, date: Option<&ResolvedDate>, slug: &str, suffix: Option<&str>) -> String {
        let prefix = date.map(|d| format!("{}-", d.prefix())).unwrap_or_default();
        let suffix = suffix.unwrap_or("");
        let budget = self
            .max_length
            .saturating_sub(prefix.len() + suffix.len())
            .max(1);
        format!("{}{}{}", prefix, truncate_at_hyphen(slug, budget), suffix)
    }
}

/// Cut an ASCII slug to at most `limit` chars, preferring a hyphen boundary
pub fn truncate_at_hyphen(slug: &str, limit: usize) -> &str {
    if slug.len() <= limit {
        return slug;
    }
    let cut = &slug[..limit];
    if slug.as_bytes()[limit] == b'-' {
        return cut;
    }
    match cut.rfind('-') {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut,
    }
}

fn is_available(candidate: &Path, source: &Path, registry: &TargetRegistry) -> bool {
    if registry.contains(candidate) {
        return false;
    }
    if candidate == source {
        return true;
    }
    !candidate.exists()
}

fn leading_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d{4}-\d{2}-\d{2}[-_\s]*").expect("valid regex"))
}
