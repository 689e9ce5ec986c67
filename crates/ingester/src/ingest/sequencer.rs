//! Ingest slot allocation: the per-project counter and the folder it names.

use crate::error::{IngestError, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Name stem of every ingest folder, `raw <N>`.
pub const TARGET_FOLDER_STEM: &str = "raw";

/// The allocated number for one run and the folder it writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSlot {
    pub number: u64,
    pub target_folder: PathBuf,
}

/// `<project>/raw <n>` with host path separators.
pub fn target_folder_for(project_dir: &Path, number: u64) -> PathBuf {
    project_dir.join(format!("{} {}", TARGET_FOLDER_STEM, number))
}

/// Owns the in-memory ingest counter for one run.
///
/// The counter only moves forward; the new value is persisted by the caller
/// once the batch completes.
#[derive(Debug)]
pub struct IngestSequencer {
    count: u64,
    allocated: Option<IngestSlot>,
}

impl IngestSequencer {
    pub fn new(current_count: u64) -> Self {
        Self {
            count: current_count,
            allocated: None,
        }
    }

    pub fn current(&self) -> u64 {
        self.count
    }

    /// Allocate the next slot. A run allocates at most once; repeated calls
    /// return the same slot so the target folder is never re-derived.
    pub fn allocate(&mut self, project_dir: &Path) -> Result<IngestSlot> {
        if let Some(slot) = &self.allocated {
            return Ok(slot.clone());
        }

        let number = self
            .count
            .checked_add(1)
            .ok_or(IngestError::CounterExhausted(self.count))?;
        self.count = number;

        let slot = IngestSlot {
            number,
            target_folder: target_folder_for(project_dir, number),
        };
        info!(number, target = %slot.target_folder.display(), "Allocated ingest slot");
        self.allocated = Some(slot.clone());
        Ok(slot)
    }
}
