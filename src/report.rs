// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Rendering of per-file results for the terminal or for scripts

use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use crate::pipeline::RunSummary;
use crate::plan::{ComparisonRow, FileOutcome, FileReport};
use crate::selector::EmptyDirectory;
use crate::{RenameError, Result};

const PROMPT_COLUMN: usize = 40;
const IGNORED_LISTED: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable lines
    Text,
    /// One pretty JSON document at the end of the run
    Json,
    /// One JSON object per line as files complete
    Jsonl,
}

impl FromStr for OutputFormat {
    type Err = RenameError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "jsonl" => Ok(OutputFormat::Jsonl),
            other => Err(RenameError::Config(format!("unknown output format '{}'", other))),
        }
    }
}

/// Writes reports to `out` in the chosen format
pub struct Reporter<W: Write> {
    out: W,
    format: OutputFormat,
    collected: Vec<Value>,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            collected: Vec::new(),
        }
    }

    pub fn file(&mut self, report: &FileReport) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                write!(self.out, "{}", render_text(report))?;
            }
            OutputFormat::Json => self.collected.push(file_value(report)),
            OutputFormat::Jsonl => {
                writeln!(self.out, "{}", serde_json::to_string(&file_value(report))?)?;
            }
        }
        Ok(())
    }

    /// Tell the user about directories whose images were all filtered out
    pub fn empty_directories(&mut self, dirs: &[EmptyDirectory]) -> Result<()> {
        for dir in dirs {
            match self.format {
                OutputFormat::Text => write!(self.out, "{}", render_empty_directory(dir))?,
                OutputFormat::Json => self.collected.push(empty_directory_value(dir)),
                OutputFormat::Jsonl => writeln!(
                    self.out,
                    "{}",
                    serde_json::to_string(&empty_directory_value(dir))?
                )?,
            }
        }
        Ok(())
    }

    /// Write the summary and hand back the writer
    pub fn finish(mut self, summary: &RunSummary) -> Result<W> {
        match self.format {
            OutputFormat::Text => {
                if summary.total() > 0 {
                    writeln!(self.out, "\n{}", summary_line(summary))?;
                }
            }
            OutputFormat::Json => {
                let output = json!({
                    "files": self.collected,
                    "summary": summary,
                });
                writeln!(self.out, "{}", serde_json::to_string_pretty(&output)?)?;
            }
            OutputFormat::Jsonl => {
                let line = json!({ "type": "summary", "summary": summary });
                writeln!(self.out, "{}", serde_json::to_string(&line)?)?;
            }
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Text lines for one file, newline terminated
pub fn render_text(report: &FileReport) -> String {
    let source = &report.file.file_name;
    match &report.outcome {
        FileOutcome::Renamed { target } => format!("Renamed {} → {}\n", source, name_of(target)),
        FileOutcome::Previewed { target } => {
            format!("Would rename {} → {}\n", source, name_of(target))
        }
        FileOutcome::Unchanged => format!("Unchanged {}\n", source),
        FileOutcome::Failed { reason } => format!("Failed {}: {}\n", source, reason),
        FileOutcome::Skipped { reason } => format!("Skipped {}: {}\n", source, reason),
        FileOutcome::Compared { rows } => render_comparison(source, rows),
    }
}

fn render_comparison(source: &str, rows: &[ComparisonRow]) -> String {
    let model_width = rows
        .iter()
        .map(|r| r.model.chars().count())
        .chain(std::iter::once("MODEL".len()))
        .max()
        .unwrap_or(0);

    let mut out = format!("{}\n", source);
    out.push_str(&format!(
        "  {:<mw$}  {:<pw$}  {}\n",
        "MODEL",
        "PROMPT",
        "PROPOSED NAME",
        mw = model_width,
        pw = PROMPT_COLUMN
    ));
    for row in rows {
        let proposal = match &row.outcome {
            Ok(name) => name.clone(),
            Err(reason) => format!("failed: {}", reason),
        };
        out.push_str(&format!(
            "  {:<mw$}  {:<pw$}  {}\n",
            row.model,
            shorten(&row.prompt, PROMPT_COLUMN),
            proposal,
            mw = model_width,
            pw = PROMPT_COLUMN
        ));
    }
    out
}

/// Single-line prompt cut to `width` characters
fn shorten(text: &str, width: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= width {
        return flat;
    }
    let kept: String = flat.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn render_empty_directory(dir: &EmptyDirectory) -> String {
    let mut out = format!("No eligible images in {}\n", dir.path.display());
    if dir.ignored.is_empty() {
        return out;
    }
    out.push_str(&format!(
        "  {} image file(s) ignored because their names do not look camera-generated:\n",
        dir.ignored.len()
    ));
    for path in dir.ignored.iter().take(IGNORED_LISTED) {
        out.push_str(&format!("    {}\n", name_of(path)));
    }
    if dir.ignored.len() > IGNORED_LISTED {
        out.push_str(&format!("    ... and {} more\n", dir.ignored.len() - IGNORED_LISTED));
    }
    out.push_str("  Run with --all to include them.\n");
    out
}

pub fn summary_line(summary: &RunSummary) -> String {
    let mut parts = Vec::new();
    for (count, label) in [
        (summary.renamed, "renamed"),
        (summary.previewed, "previewed"),
        (summary.unchanged, "unchanged"),
        (summary.compared, "compared"),
        (summary.skipped, "skipped"),
        (summary.failed, "failed"),
    ] {
        if count > 0 {
            parts.push(format!("{} {}", count, label));
        }
    }
    format!("{} file(s): {}", summary.total(), parts.join(", "))
}

pub fn file_value(report: &FileReport) -> Value {
    let mut value = json!({
        "type": "file",
        "file": report.file.path,
        "status": report.outcome.label(),
        "date": report.date.map(|d| d.prefix()),
        "date_source": report.date.map(|d| d.source),
    });

    match &report.outcome {
        FileOutcome::Renamed { target } | FileOutcome::Previewed { target } => {
            value["target"] = json!(target);
        }
        FileOutcome::Failed { reason } | FileOutcome::Skipped { reason } => {
            value["reason"] = json!(reason);
        }
        FileOutcome::Compared { rows } => {
            let candidates: Vec<Value> = rows
                .iter()
                .map(|row| match &row.outcome {
                    Ok(name) => json!({ "model": row.model, "prompt": row.prompt, "name": name }),
                    Err(reason) => json!({ "model": row.model, "prompt": row.prompt, "error": reason }),
                })
                .collect();
            value["candidates"] = json!(candidates);
        }
        FileOutcome::Unchanged => {}
    }
    value
}

fn empty_directory_value(dir: &EmptyDirectory) -> Value {
    json!({
        "type": "empty_directory",
        "path": dir.path,
        "ignored": dir.ignored,
    })
}
