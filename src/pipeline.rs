// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! The rename pipeline
//!
//! Files are described concurrently, up to `jobs` at a time, but reports come
//! out in input order. Naming and renaming happen in that same order on a
//! single consumer, so collision suffixes are deterministic.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::date::{DateResolver, ResolvedDate};
use crate::describe::{DescriptionRequester, DescriptionResult};
use crate::plan::{FileOutcome, FileReport, RenamePlanner};
use crate::selector::{FileSelector, ImageFile};

/// Totals for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub renamed: usize,
    pub previewed: usize,
    pub unchanged: usize,
    pub compared: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Renamed { .. } => self.renamed += 1,
            FileOutcome::Previewed { .. } => self.previewed += 1,
            FileOutcome::Unchanged => self.unchanged += 1,
            FileOutcome::Compared { .. } => self.compared += 1,
            FileOutcome::Failed { .. } => self.failed += 1,
            FileOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.renamed + self.previewed + self.unchanged + self.compared + self.failed + self.skipped
    }
}

/// A file after the concurrent stage
enum Described {
    Ready {
        file: ImageFile,
        date: Option<ResolvedDate>,
        results: Vec<DescriptionResult>,
    },
    Cancelled(ImageFile),
}

pub struct Pipeline {
    selector: FileSelector,
    resolver: DateResolver,
    requester: DescriptionRequester,
    planner: RenamePlanner,
    jobs: usize,
}

impl Pipeline {
    pub fn new(
        selector: FileSelector,
        resolver: DateResolver,
        requester: DescriptionRequester,
        planner: RenamePlanner,
        jobs: usize,
    ) -> Self {
        Self {
            selector,
            resolver,
            requester,
            planner,
            jobs: jobs.max(1),
        }
    }

    pub fn selector(&self) -> &FileSelector {
        &self.selector
    }

    /// Process every selected file, calling `on_report` in input order.
    ///
    /// Once `cancel` turns true no new backend request is sent: files that
    /// have not started are reported as skipped, and so are pairs still
    /// waiting for a slot. Requests already in flight run to completion and
    /// their files are still planned.
    pub async fn run<F>(&mut self, cancel: watch::Receiver<bool>, mut on_report: F) -> RunSummary
    where
        F: FnMut(&FileReport),
    {
        let Pipeline {
            selector,
            resolver,
            requester,
            planner,
            jobs,
        } = self;
        let resolver = &*resolver;
        let requester = &*requester;
        let cancel = &cancel;

        info!("Processing with up to {} files in flight", jobs);

        let mut described = stream::iter(selector.iter())
            .map(|file| {
                let cancel = cancel.clone();
                async move {
                    if *cancel.borrow() {
                        return Described::Cancelled(file);
                    }
                    let date = resolver.resolve(&file);
                    let results = requester.describe_all(&file, &cancel).await;
                    Described::Ready { file, date, results }
                }
            })
            .buffered(*jobs);

        let mut summary = RunSummary::default();
        while let Some(item) = described.next().await {
            let report = match item {
                Described::Ready { file, date, results } => planner.process(file, date, results),
                Described::Cancelled(file) => {
                    debug!("Skipping {} after cancellation", file.file_name);
                    FileReport {
                        file,
                        date: None,
                        outcome: FileOutcome::Skipped {
                            reason: "cancelled".to_string(),
                        },
                    }
                }
            };
            summary.record(&report.outcome);
            on_report(&report);
        }

        info!(
            "Done: {} renamed, {} previewed, {} failed",
            summary.renamed, summary.previewed, summary.failed
        );
        summary
    }
}
