// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Rename planning and execution
//!
//! In single mode each file gets one plan that is applied or previewed. In
//! comparison mode every candidate is reported and nothing is renamed, no
//! matter what `dry_run` says.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::date::ResolvedDate;
use crate::describe::{DescriptionFailure, DescriptionResult};
use crate::naming::{FilenameSynthesizer, TargetRegistry};
use crate::selector::ImageFile;

/// How a run treats the file system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Rename each file on disk
    Apply,
    /// Report the rename without touching the file
    DryRun,
    /// Report every candidate, never rename
    Comparison,
}

impl Mode {
    /// Comparison always wins over the dry-run flag
    pub fn from_flags(comparison: bool, dry_run: bool) -> Self {
        match (comparison, dry_run) {
            (true, _) => Mode::Comparison,
            (false, true) => Mode::DryRun,
            (false, false) => Mode::Apply,
        }
    }

    pub fn mutates_files(self) -> bool {
        matches!(self, Mode::Apply)
    }
}

/// A proposed name produced from one description
#[derive(Debug, Clone)]
pub struct RenameCandidate {
    pub file: ImageFile,
    /// Base name before uniqueness resolution
    pub base_name: String,
    pub date: Option<ResolvedDate>,
    pub description: DescriptionResult,
}

/// The rename chosen for a file
#[derive(Debug, Clone)]
pub struct RenamePlan {
    pub candidate: RenameCandidate,
    /// Final base name after uniqueness resolution
    pub base_name: String,
    pub target: PathBuf,
}

impl RenamePlan {
    pub fn source(&self) -> &Path {
        &self.candidate.file.path
    }

    pub fn is_noop(&self) -> bool {
        self.target == self.candidate.file.path
    }
}

/// One row of a comparison report
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonRow {
    pub model: String,
    pub prompt: String,
    /// Proposed file name, or the failure text
    pub outcome: std::result::Result<String, String>,
}

/// What happened to a file
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Renamed { target: PathBuf },
    Previewed { target: PathBuf },
    Unchanged,
    Compared { rows: Vec<ComparisonRow> },
    Failed { reason: String },
    Skipped { reason: String },
}

impl FileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FileOutcome::Renamed { .. } => "renamed",
            FileOutcome::Previewed { .. } => "previewed",
            FileOutcome::Unchanged => "unchanged",
            FileOutcome::Compared { .. } => "compared",
            FileOutcome::Failed { .. } => "failed",
            FileOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// Per-file entry in the run report
#[derive(Debug, Clone)]
pub struct FileReport {
    pub file: ImageFile,
    pub date: Option<ResolvedDate>,
    pub outcome: FileOutcome,
}

/// Builds plans from descriptions and carries them out
pub struct RenamePlanner {
    synthesizer: FilenameSynthesizer,
    registry: TargetRegistry,
    mode: Mode,
}

impl RenamePlanner {
    pub fn new(synthesizer: FilenameSynthesizer, mode: Mode) -> Self {
        Self {
            synthesizer,
            registry: TargetRegistry::new(),
            mode,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Turn a file's descriptions into a report entry, renaming if allowed.
    ///
    /// More than one description always produces a comparison, even when the
    /// planner was built for apply or dry-run.
    pub fn process(
        &mut self,
        file: ImageFile,
        date: Option<ResolvedDate>,
        mut results: Vec<DescriptionResult>,
    ) -> FileReport {
        if self.mode == Mode::Comparison || results.len() > 1 {
            let rows = self.compare(&file, date.as_ref(), &results);
            return FileReport {
                file,
                date,
                outcome: FileOutcome::Compared { rows },
            };
        }

        let outcome = match results.pop() {
            None => FileOutcome::Failed {
                reason: "no description requested".to_string(),
            },
            Some(result) => match self.plan(&file, date, result) {
                Err(DescriptionFailure::Cancelled) => FileOutcome::Skipped {
                    reason: DescriptionFailure::Cancelled.to_string(),
                },
                Err(failure) => FileOutcome::Failed {
                    reason: failure.to_string(),
                },
                Ok(plan) => self.execute(&plan),
            },
        };

        FileReport { file, date, outcome }
    }

    /// Plan a single description, claiming its target
    pub fn plan(
        &mut self,
        file: &ImageFile,
        date: Option<ResolvedDate>,
        description: DescriptionResult,
    ) -> std::result::Result<RenamePlan, DescriptionFailure> {
        let text = description.outcome.clone()?;
        let base_name = self.synthesizer.synthesize(&text, date.as_ref());
        let unique = self
            .synthesizer
            .unique_name(file, &text, date.as_ref(), &mut self.registry);

        debug!("Planned {} -> {}", file.file_name, unique.target.display());

        Ok(RenamePlan {
            candidate: RenameCandidate {
                file: file.clone(),
                base_name,
                date,
                description,
            },
            base_name: unique.base_name,
            target: unique.target,
        })
    }

    /// Candidate names for every description of one file.
    ///
    /// Names are unique among the file's own rows but do not reserve
    /// anything for later files.
    pub fn compare(
        &self,
        file: &ImageFile,
        date: Option<&ResolvedDate>,
        results: &[DescriptionResult],
    ) -> Vec<ComparisonRow> {
        let mut local = TargetRegistry::new();
        results
            .iter()
            .map(|result| {
                let outcome = match &result.outcome {
                    Ok(text) => {
                        let unique = self.synthesizer.unique_name(file, text, date, &mut local);
                        Ok(format!("{}.{}", unique.base_name, file.extension))
                    }
                    Err(failure) => Err(failure.to_string()),
                };
                ComparisonRow {
                    model: result.request.model.clone(),
                    prompt: result.request.prompt.clone(),
                    outcome,
                }
            })
            .collect()
    }

    /// Apply or preview a plan according to the mode
    pub fn execute(&self, plan: &RenamePlan) -> FileOutcome {
        if plan.is_noop() {
            return FileOutcome::Unchanged;
        }

        if !self.mode.mutates_files() {
            info!("DRY RUN: would rename {:?} to {:?}", plan.source(), plan.target);
            return FileOutcome::Previewed {
                target: plan.target.clone(),
            };
        }

        match rename_no_clobber(plan.source(), &plan.target) {
            Ok(()) => {
                info!("Renamed {:?} to {:?}", plan.source(), plan.target);
                FileOutcome::Renamed {
                    target: plan.target.clone(),
                }
            }
            Err(e) => {
                warn!("Rename of {:?} failed: {}", plan.source(), e);
                FileOutcome::Failed {
                    reason: format!("rename to {} failed: {}", plan.target.display(), e),
                }
            }
        }
    }
}

/// `fs::rename` that refuses to replace an existing destination
fn rename_no_clobber(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "destination already exists",
        ));
    }
    fs::rename(from, to)
}
