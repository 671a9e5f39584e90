// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Candidate file selection
//!
//! Expands the input paths into the image files that should be renamed.
//! Directory children must look camera-generated (`IMG_…`, `IMG-…` or a bare
//! UUID) unless `include_all` is set; explicitly named files skip that check.

use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions treated as images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "heic", "heif", "gif", "webp", "bmp", "tif", "tiff",
];

/// An image file picked for renaming
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageFile {
    /// Absolute path to the file
    pub path: PathBuf,
    /// Full file name, extension included
    pub file_name: String,
    /// File name without the extension
    pub stem: String,
    /// Extension exactly as on disk, without the dot
    pub extension: String,
}

impl ImageFile {
    /// Build from a path; `None` when the path has no file name or extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let path = absolute(path);
        let file_name = path.file_name()?.to_string_lossy().to_string();
        let stem = path.file_stem()?.to_string_lossy().to_string();
        let extension = path.extension()?.to_string_lossy().to_string();
        Some(Self {
            path,
            file_name,
            stem,
            extension,
        })
    }

    /// Directory containing the file
    pub fn parent(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Flags controlling selection
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectOptions {
    pub recursive: bool,
    pub include_all: bool,
}

/// A directory input that produced nothing to rename
#[derive(Debug, Clone)]
pub struct EmptyDirectory {
    pub path: PathBuf,
    /// Image files skipped because their names did not look camera-generated
    pub ignored: Vec<PathBuf>,
}

/// Lazily expands input paths into image files.
///
/// Every call to [`FileSelector::iter`] walks the file system again.
#[derive(Debug, Clone)]
pub struct FileSelector {
    inputs: Vec<PathBuf>,
    options: SelectOptions,
}

impl FileSelector {
    pub fn new(inputs: Vec<PathBuf>, options: SelectOptions) -> Self {
        Self { inputs, options }
    }

    /// Inputs that can yield work: existing directories and image files
    pub fn valid_inputs(&self) -> Vec<&Path> {
        self.inputs
            .iter()
            .map(PathBuf::as_path)
            .filter(|p| p.is_dir() || (p.is_file() && is_image_file(p)))
            .collect()
    }

    /// Iterate over the selected image files in input order
    pub fn iter(&self) -> impl Iterator<Item = ImageFile> + '_ {
        self.inputs.iter().flat_map(move |input| self.expand(input))
    }

    /// Directory inputs with no eligible files, with the image files the name
    /// filter left out
    pub fn empty_directories(&self) -> Vec<EmptyDirectory> {
        let mut out = Vec::new();
        for input in self.inputs.iter().filter(|p| p.is_dir()) {
            let mut selected = 0usize;
            let mut ignored = Vec::new();
            for path in self.directory_images(input) {
                if self.options.include_all || is_camera_name(&path) {
                    selected += 1;
                } else {
                    ignored.push(path);
                }
            }
            if selected == 0 {
                out.push(EmptyDirectory {
                    path: input.clone(),
                    ignored,
                });
            }
        }
        out
    }

    fn expand<'a>(&'a self, input: &'a Path) -> Box<dyn Iterator<Item = ImageFile> + 'a> {
        if input.is_dir() {
            let include_all = self.options.include_all;
            return Box::new(
                self.directory_images(input)
                    .filter(move |path| include_all || is_camera_name(path))
                    .filter_map(|path| ImageFile::from_path(&path)),
            );
        }

        if !input.exists() {
            warn!("File not found: {}", input.display());
            return Box::new(std::iter::empty());
        }

        if !is_image_file(input) {
            warn!("Not an image file: {}", input.display());
            return Box::new(std::iter::empty());
        }

        Box::new(ImageFile::from_path(input).into_iter())
    }

    /// Image files under `dir`, before the name filter
    fn directory_images<'a>(&self, dir: &'a Path) -> Box<dyn Iterator<Item = PathBuf> + 'a> {
        if self.options.recursive {
            let walker = WalkDir::new(dir)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| {
                    entry.depth() == 0 || !(entry.file_type().is_dir() && is_hidden(entry.path()))
                });
            Box::new(walker.filter_map(move |entry| match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    let path = entry.into_path();
                    is_image_file(&path).then_some(path)
                }
                Ok(_) => None,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                    None
                }
            }))
        } else {
            let mut children = match fs::read_dir(dir) {
                Ok(entries) => entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.is_file() && is_image_file(p))
                    .collect::<Vec<_>>(),
                Err(e) => {
                    warn!("Cannot read directory {}: {}", dir.display(), e);
                    Vec::new()
                }
            };
            children.sort();
            debug!("{} image files in {}", children.len(), dir.display());
            Box::new(children.into_iter())
        }
    }
}

/// Whether the extension is a recognized image type
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Whether the file name looks like a camera or phone default name
pub fn is_camera_name(path: &Path) -> bool {
    let stem = match path.file_stem().and_then(|s| s.to_str()) {
        Some(s) => s,
        None => return false,
    };
    camera_prefix_re().is_match(stem) || uuid_re().is_match(stem)
}

fn camera_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^IMG[-_].+").expect("valid regex"))
}

fn uuid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
            .expect("valid regex")
    })
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
