//! Ingester - Core Library
//!
//! Copies batches of media files from removable source roots into numbered
//! `raw <N>` folders inside a project directory, then renames the originals
//! so they are never picked up again.

pub mod config;
pub mod error;
pub mod ingest;
pub mod projects;

pub use config::{GlobalConfig, GlobalConfigLoad, ProjectConfig, ProjectStore, SourceDirs};
pub use error::{IngestError, Result};
pub use ingest::{
    run_ingest, CopyEngine, CopyProgress, DiscoveredFile, FileIssue, FileState, IngestBatch,
    IngestEvent, IngestOptions, IngestOutcome, IngestSequencer, IngestSummary, OriginMarker,
    SourceScanner,
};
pub use projects::{create_project, discover_projects, find_project, Project};
