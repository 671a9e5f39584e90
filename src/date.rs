// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Date resolution for the filename prefix
//!
//! EXIF "date taken" wins; otherwise a `YYYY-MM-DD` already present in the
//! file name is reused. Broken EXIF is never an error, it simply falls
//! through.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use exif::{In, Reader, Tag, Value};
use regex::Regex;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::selector::ImageFile;

/// Where a resolved date came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    Exif,
    FileName,
}

/// Calendar date used as the filename prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedDate {
    pub date: NaiveDate,
    pub source: DateSource,
}

impl ResolvedDate {
    /// `YYYY-MM-DD`
    pub fn prefix(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Reads the "date taken" tag of an image
pub trait DateTagReader: Send + Sync {
    /// `None` when the tag is missing, malformed or the file has no EXIF
    fn read_date_tag(&self, path: &Path) -> Option<NaiveDate>;
}

/// [`DateTagReader`] backed by `kamadak-exif`
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifDateReader;

const DATE_TAGS: &[Tag] = &[Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

impl DateTagReader for ExifDateReader {
    fn read_date_tag(&self, path: &Path) -> Option<NaiveDate> {
        let file = File::open(path).ok()?;
        let mut reader = BufReader::new(file);
        let exif = match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            Err(e) => {
                debug!("No usable EXIF in {}: {}", path.display(), e);
                return None;
            }
        };

        DATE_TAGS.iter().find_map(|tag| {
            let field = exif.get_field(*tag, In::PRIMARY)?;
            let raw = match &field.value {
                Value::Ascii(values) if !values.is_empty() => {
                    String::from_utf8(values[0].clone()).ok()
                }
                _ => None,
            }
            .unwrap_or_else(|| field.display_value().to_string());
            parse_exif_datetime(&raw)
        })
    }
}

/// Parse an EXIF timestamp such as `2024:01:01 12:30:00`
pub fn parse_exif_datetime(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim().trim_matches('"').trim_end_matches('\0');
    let candidates = [
        "%Y:%m:%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y:%m:%d %H:%M:%S%.f",
    ];
    for fmt in candidates {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }
    // Some cameras write only the date part
    NaiveDate::parse_from_str(trimmed.get(..10)?, "%Y:%m:%d").ok()
}

/// Find a `YYYY-MM-DD` substring in a file name.
///
/// Month must be 1–12 and day 1–31; a day past the end of the month is
/// clamped to its last day.
pub fn date_from_file_name(name: &str) -> Option<NaiveDate> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("valid regex")
    });

    re.captures_iter(name).find_map(|caps| {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }
        let last = last_day_of_month(year, month)?;
        NaiveDate::from_ymd_opt(year, month, day.min(last))
    })
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|d| d.day())
}

/// Resolves the date for each file
#[derive(Clone)]
pub struct DateResolver {
    reader: Arc<dyn DateTagReader>,
}

impl DateResolver {
    pub fn new(reader: Arc<dyn DateTagReader>) -> Self {
        Self { reader }
    }

    /// EXIF first, then the file name, else `None`
    pub fn resolve(&self, file: &ImageFile) -> Option<ResolvedDate> {
        if let Some(date) = self.reader.read_date_tag(&file.path) {
            debug!("EXIF date {} for {}", date, file.file_name);
            return Some(ResolvedDate {
                date,
                source: DateSource::Exif,
            });
        }
        date_from_file_name(&file.file_name).map(|date| {
            debug!("File name date {} for {}", date, file.file_name);
            ResolvedDate {
                date,
                source: DateSource::FileName,
            }
        })
    }
}

impl Default for DateResolver {
    fn default() -> Self {
        Self::new(Arc::new(ExifDateReader))
    }
}
