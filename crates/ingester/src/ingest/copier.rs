//! Copy engine: renaming, no-overwrite copies with bounded parallelism
//!
//! # Design
//!
//! - Target names are planned up front; two sources that map to the same
//!   target name fail with NAME_COLLISION before any I/O starts
//! - A fixed pool of scoped worker threads pulls files from a shared index
//! - Workers report completions over a channel; the calling thread owns the
//!   cumulative byte count so progress is monotone and reflects finished files
//! - Targets are opened with `create_new`, so an existing file is never replaced

use super::types::{codes, DiscoveredFile, FileIssue};
use crate::error::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

/// Default number of concurrent file copies
pub const DEFAULT_COPY_JOBS: usize = 4;

/// Filesystems such as FAT store mtimes with two second resolution.
const MTIME_TOLERANCE: Duration = Duration::from_secs(2);

/// Configuration for copy operations
#[derive(Debug, Clone)]
pub struct CopyConfig {
    /// Maximum concurrent copies (0 is treated as 1)
    pub jobs: usize,
    /// Stop starting new copies after the first failure
    pub fail_fast: bool,
    /// Accept an existing target with the same size and mtime as an earlier,
    /// interrupted copy of the same original
    pub resume_existing: bool,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            jobs: DEFAULT_COPY_JOBS,
            fail_fast: false,
            resume_existing: false,
        }
    }
}

/// Cumulative progress, emitted once per finished file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CopyProgress {
    pub completed_files: usize,
    pub total_files: usize,
    /// Bytes of files that finished copying, across the whole batch
    pub completed_bytes: u64,
    pub total_bytes: u64,
}

/// How one file left the copy stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyStatus {
    /// Never started because fail-fast stopped the batch
    Pending,
    Copied,
    /// Target already held a finished copy from an interrupted run
    Resumed,
    Failed(FileIssue),
}

impl CopyStatus {
    /// The target now holds this file's data.
    pub fn is_success(&self) -> bool {
        matches!(self, CopyStatus::Copied | CopyStatus::Resumed)
    }
}

#[derive(Debug, Clone)]
pub struct CopyOutcome {
    pub source: PathBuf,
    pub target: PathBuf,
    pub size: u64,
    pub status: CopyStatus,
}

/// Copies a file set into one target folder.
#[derive(Debug, Clone, Default)]
pub struct CopyEngine {
    config: CopyConfig,
}

impl CopyEngine {
    pub fn new(config: CopyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CopyConfig {
        &self.config
    }

    /// Copy `files` into `target_folder`, naming each target `rename(file_name)`.
    ///
    /// Per-file failures are returned as outcomes; only failing to create the
    /// target folder is an error. Outcomes are in the same order as `files`.
    pub fn copy<F>(
        &self,
        files: &[DiscoveredFile],
        target_folder: &Path,
        rename: F,
        progress_tx: Option<mpsc::Sender<CopyProgress>>,
    ) -> Result<Vec<CopyOutcome>>
    where
        F: Fn(&str) -> String,
    {
        let start = Instant::now();
        fs::create_dir_all(target_folder)?;

        let total_bytes: u64 = files.iter().map(|f| f.size).sum();
        let mut outcomes = plan_targets(files, target_folder, rename);

        let work: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| o.status == CopyStatus::Pending)
            .map(|(i, _)| i)
            .collect();
        let planned_failures = outcomes.len() - work.len();

        let mut progress = CopyProgress {
            completed_files: 0,
            total_files: files.len(),
            completed_bytes: 0,
            total_bytes,
        };

        if self.config.fail_fast && planned_failures > 0 {
            warn!(
                collisions = planned_failures,
                "Fail-fast: batch has conflicting target names, nothing copied"
            );
            return Ok(outcomes);
        }

        let targets: Vec<PathBuf> = outcomes.iter().map(|o| o.target.clone()).collect();
        let next = AtomicUsize::new(0);
        let stop = AtomicBool::new(false);
        let workers = self.config.jobs.max(1).min(work.len().max(1));
        let resume = self.config.resume_existing;
        let fail_fast = self.config.fail_fast;

        info!(
            files = work.len(),
            bytes = total_bytes,
            workers,
            target = %target_folder.display(),
            "Starting copy"
        );

        std::thread::scope(|scope| {
            let (done_tx, done_rx) = mpsc::channel::<(usize, CopyStatus)>();

            for _ in 0..workers {
                let done_tx = done_tx.clone();
                let (next, stop, work, targets) = (&next, &stop, &work, &targets);
                scope.spawn(move || loop {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let slot = next.fetch_add(1, Ordering::Relaxed);
                    let Some(&index) = work.get(slot) else {
                        break;
                    };
                    let status = copy_one(&files[index], &targets[index], resume);
                    if fail_fast && !status.is_success() {
                        stop.store(true, Ordering::Relaxed);
                    }
                    if done_tx.send((index, status)).is_err() {
                        break;
                    }
                });
            }
            drop(done_tx);

            for (index, status) in done_rx {
                progress.completed_files += 1;
                if status.is_success() {
                    progress.completed_bytes += files[index].size;
                }
                if let Some(tx) = &progress_tx {
                    let _ = tx.send(progress);
                }
                outcomes[index].status = status;
            }
        });

        info!(
            copied = outcomes.iter().filter(|o| o.status == CopyStatus::Copied).count(),
            resumed = outcomes.iter().filter(|o| o.status == CopyStatus::Resumed).count(),
            failed = outcomes.iter().filter(|o| matches!(o.status, CopyStatus::Failed(_))).count(),
            not_started = outcomes.iter().filter(|o| o.status == CopyStatus::Pending).count(),
            bytes = progress.completed_bytes,
            duration_ms = start.elapsed().as_millis() as u64,
            "Copy complete"
        );

        Ok(outcomes)
    }
}

/// Compute every target path. Files whose planned target is taken by an
/// earlier file of the batch fail immediately; the rest start as `Pending`.
fn plan_targets<F>(files: &[DiscoveredFile], target_folder: &Path, rename: F) -> Vec<CopyOutcome>
where
    F: Fn(&str) -> String,
{
    let mut claimed: HashSet<PathBuf> = HashSet::new();
    files
        .iter()
        .map(|file| {
            let Some(name) = file.file_name() else {
                return CopyOutcome {
                    source: file.path.clone(),
                    target: target_folder.to_path_buf(),
                    size: file.size,
                    status: CopyStatus::Failed(FileIssue::new(
                        &file.path,
                        codes::COPY_FAILED,
                        "file name is not valid UTF-8",
                    )),
                };
            };

            let target = target_folder.join(rename(name));
            let status = if claimed.insert(target.clone()) {
                CopyStatus::Pending
            } else {
                CopyStatus::Failed(FileIssue::new(
                    &file.path,
                    codes::NAME_COLLISION,
                    format!(
                        "{} is also the target of another file in this batch",
                        target.display()
                    ),
                ))
            };

            CopyOutcome {
                source: file.path.clone(),
                target,
                size: file.size,
                status,
            }
        })
        .collect()
}

fn collision(file: &DiscoveredFile, target: &Path) -> CopyStatus {
    warn!(source = %file.path.display(), target = %target.display(), "Target already exists");
    CopyStatus::Failed(FileIssue::new(
        &file.path,
        codes::NAME_COLLISION,
        format!("{} already exists", target.display()),
    ))
}

fn copy_one(file: &DiscoveredFile, target: &Path, resume: bool) -> CopyStatus {
    match fs::symlink_metadata(target) {
        Ok(existing) => {
            if resume && is_finished_copy(&existing, file) {
                info!(target = %target.display(), "Resuming: target already holds this file");
                return CopyStatus::Resumed;
            }
            return collision(file, target);
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return CopyStatus::Failed(FileIssue::new(&file.path, codes::COPY_FAILED, e.to_string()))
        }
    }

    let mut input = match File::open(&file.path) {
        Ok(f) => f,
        Err(e) => {
            warn!(source = %file.path.display(), error = %e, "Cannot open source");
            return CopyStatus::Failed(FileIssue::new(&file.path, codes::COPY_FAILED, e.to_string()));
        }
    };

    let mut output = match OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return collision(file, target),
        Err(e) => {
            warn!(target = %target.display(), error = %e, "Cannot create target");
            return CopyStatus::Failed(FileIssue::new(&file.path, codes::COPY_FAILED, e.to_string()));
        }
    };

    match fill_target(&mut input, &mut output) {
        Ok(bytes) => {
            debug!(source = %file.path.display(), target = %target.display(), bytes, "Copied");
            CopyStatus::Copied
        }
        Err(e) => {
            warn!(source = %file.path.display(), error = %e, "Copy failed, removing partial target");
            drop(output);
            if let Err(rm) = fs::remove_file(target) {
                warn!(target = %target.display(), error = %rm, "Failed to remove partial target");
            }
            CopyStatus::Failed(FileIssue::new(&file.path, codes::COPY_FAILED, e.to_string()))
        }
    }
}

/// Stream the data, carry over the mtime and make the copy durable before
/// the original can be marked.
fn fill_target(input: &mut File, output: &mut File) -> io::Result<u64> {
    let bytes = io::copy(input, output)?;
    if let Ok(modified) = input.metadata().and_then(|m| m.modified()) {
        if let Err(e) = output.set_modified(modified) {
            debug!(error = %e, "Could not carry over modification time");
        }
    }
    output.sync_all()?;
    Ok(bytes)
}

fn is_finished_copy(existing: &Metadata, file: &DiscoveredFile) -> bool {
    if !existing.is_file() || existing.len() != file.size {
        return false;
    }
    let source_mtime = fs::metadata(&file.path).and_then(|m| m.modified());
    match (existing.modified(), source_mtime) {
        (Ok(a), Ok(b)) => mtime_distance(a, b) <= MTIME_TOLERANCE,
        _ => false,
    }
}

fn mtime_distance(a: SystemTime, b: SystemTime) -> Duration {
    a.duration_since(b)
        .or_else(|_| b.duration_since(a))
        .unwrap_or(Duration::MAX)
}
