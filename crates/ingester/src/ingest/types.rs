//! Core types for one ingest run

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Taxonomy codes for per-file problems. These never abort a batch.
pub mod codes {
    pub const SCAN_ROOT_UNREADABLE: &str = "SCAN_ROOT_UNREADABLE";
    pub const SCAN_ENTRY_UNREADABLE: &str = "SCAN_ENTRY_UNREADABLE";
    pub const NAME_COLLISION: &str = "NAME_COLLISION";
    pub const COPY_FAILED: &str = "COPY_FAILED";
    pub const COPY_SKIPPED: &str = "COPY_SKIPPED";
    pub const MARK_FAILED: &str = "MARK_FAILED";
}

/// A file found under one of the source roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredFile {
    /// Absolute path of the original
    pub path: PathBuf,
    pub size: u64,
    /// The root this file was found under
    pub source_root: PathBuf,
}

impl DiscoveredFile {
    /// File name as a string, if it is valid UTF-8.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// A non-fatal problem attached to one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileIssue {
    pub path: PathBuf,
    pub code: &'static str,
    pub message: String,
}

impl FileIssue {
    pub fn new(path: impl Into<PathBuf>, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code,
            message: message.into(),
        }
    }
}

/// The immutable file set for one run and the folder it lands in.
#[derive(Debug, Clone, Serialize)]
pub struct IngestBatch {
    pub ingest_number: u64,
    pub target_folder: PathBuf,
    pub files: Vec<DiscoveredFile>,
}

impl IngestBatch {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Per-file progress through a run.
///
/// `Pending -> Copied -> Marked`; `Failed` is terminal and leaves the original
/// untouched so it is picked up again next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Pending,
    Copied,
    Marked,
    Failed,
}

/// Final record for one file of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub source: PathBuf,
    pub target: PathBuf,
    pub size: u64,
    pub state: FileState,
    /// Copy was skipped because an identical target from an interrupted run exists
    pub resumed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marked_as: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<FileIssue>,
}

/// End-of-run summary.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub project: String,
    pub ingest_number: u64,
    pub target_folder: PathBuf,
    pub total_files: usize,
    pub total_bytes: u64,
    pub copied_files: usize,
    pub copied_bytes: u64,
    pub marked_files: usize,
    pub resumed_files: usize,
    pub failed_files: usize,
    pub mark_suffix: String,
    pub files: Vec<FileRecord>,
    /// Roots or entries that could not be scanned
    pub scan_issues: Vec<FileIssue>,
}

impl IngestSummary {
    /// Every file reached `Marked`.
    pub fn is_complete(&self) -> bool {
        self.files.iter().all(|f| f.state == FileState::Marked)
    }

    /// Issues of files that did not complete, in batch order.
    pub fn issues(&self) -> impl Iterator<Item = &FileIssue> {
        self.files.iter().filter_map(|f| f.issue.as_ref())
    }

    pub fn target_folder(&self) -> &Path {
        &self.target_folder
    }
}
