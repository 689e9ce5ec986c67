//! Ingest - discovery, sequencing, copying and origin marking
//!
//! The components are independent and composed by `pipeline::run_ingest`.

pub mod copier;
pub mod marker;
pub mod patterns;
pub mod pipeline;
pub mod scanner;
pub mod sequencer;
pub mod types;

pub use copier::{CopyConfig, CopyEngine, CopyOutcome, CopyProgress, CopyStatus};
pub use marker::{is_origin_marked, OriginMarker};
pub use patterns::FilterSet;
pub use pipeline::{run_ingest, IngestEvent, IngestOptions, IngestOutcome};
pub use scanner::{ScanConfig, ScanReport, SourceScanner};
pub use sequencer::{target_folder_for, IngestSequencer, IngestSlot};
pub use types::{DiscoveredFile, FileIssue, FileRecord, FileState, IngestBatch, IngestSummary};
