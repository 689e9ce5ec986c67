//! Error types for the ingest pipeline

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Ingester error type
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("please edit the ingester.conf.json before doing any ingests! Defaults were written to {0}")]
    ConfigMissing(PathBuf),

    #[error("Invalid config {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("projectsDir is not set in {0}")]
    NoProjectsDir(PathBuf),

    #[error("Failed to list projects in dir \"{path}\": {source}")]
    ProjectsDirUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Project already exists: {0}")]
    ProjectExists(PathBuf),

    #[error("Invalid project name: '{0}'")]
    InvalidProjectName(String),

    #[error("Project config is locked by another ingest run: {0}")]
    ProjectLocked(PathBuf),

    #[error("Failed to lock project config {path}: {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid filter pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Could not find any files to ingest")]
    NoFilesFound,

    #[error("Ingest counter cannot advance past {0}")]
    CounterExhausted(u64),

    #[error("Failed to persist project config {path}: {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl IngestError {
    /// Stable taxonomy code for logs and JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Io(_) => "IO_ERROR",
            IngestError::ConfigMissing(_) => "CONFIG_MISSING",
            IngestError::ConfigInvalid { .. } | IngestError::Pattern { .. } => "CONFIG_INVALID",
            IngestError::NoProjectsDir(_) => "NO_PROJECTS_DIR",
            IngestError::ProjectsDirUnreadable { .. } => "PROJECTS_DIR_UNREADABLE",
            IngestError::ProjectNotFound(_) => "PROJECT_NOT_FOUND",
            IngestError::ProjectExists(_) => "PROJECT_EXISTS",
            IngestError::InvalidProjectName(_) => "INVALID_PROJECT_NAME",
            IngestError::ProjectLocked(_) | IngestError::LockFailed { .. } => "PROJECT_LOCKED",
            IngestError::NoFilesFound => "NO_FILES_FOUND",
            IngestError::CounterExhausted(_) => "COUNTER_EXHAUSTED",
            IngestError::PersistFailed { .. } => "PERSIST_FAILED",
            IngestError::Cancelled(_) => "CANCELLED",
        }
    }

    /// Halting conditions that end the process cleanly rather than as a failure.
    pub fn is_clean_halt(&self) -> bool {
        matches!(
            self,
            IngestError::NoFilesFound | IngestError::Cancelled(_) | IngestError::ConfigMissing(_)
        )
    }

    pub(crate) fn config_invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IngestError::ConfigInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, IngestError>;
