//! The ingest run: scan → sequence → copy → mark → persist.
//!
//! Stages run strictly in order on the calling thread; only scanning and
//! copying fan out internally. The ingest number and target folder are fixed
//! before the first copy starts and never re-derived. Originals are renamed
//! only after their copy is durable, so an interrupted run leaves files either
//! untouched (re-copied next time) or already marked (never seen again).

use super::copier::{CopyConfig, CopyEngine, CopyProgress, CopyStatus, DEFAULT_COPY_JOBS};
use super::marker::OriginMarker;
use super::scanner::SourceScanner;
use super::sequencer::IngestSequencer;
use super::types::{codes, FileIssue, FileRecord, FileState, IngestBatch, IngestSummary};
use crate::config::{ProjectConfig, ProjectStore};
use crate::error::{IngestError, Result};
use crate::projects::Project;
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::{info, warn};

/// Options for one run
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub jobs: usize,
    pub fail_fast: bool,
    /// Scan and allocate without touching the filesystem
    pub dry_run: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            jobs: DEFAULT_COPY_JOBS,
            fail_fast: false,
            dry_run: false,
        }
    }
}

/// Progress notifications for a front end
#[derive(Debug, Clone)]
pub enum IngestEvent {
    Scanned {
        files: usize,
        bytes: u64,
        issues: usize,
    },
    Planned {
        ingest_number: u64,
        target_folder: PathBuf,
        files: usize,
        total_bytes: u64,
    },
    Copy(CopyProgress),
    Marked {
        marked: usize,
        failed: usize,
    },
}

/// How a run ended
#[derive(Debug)]
pub enum IngestOutcome {
    /// Discovery was empty; nothing was created or changed
    NothingToIngest { scan_issues: Vec<FileIssue> },
    /// `dry_run`: what would have been copied
    DryRun {
        batch: IngestBatch,
        scan_issues: Vec<FileIssue>,
    },
    Completed(IngestSummary),
    /// Files were copied and marked but the new counter could not be saved
    PersistFailed {
        summary: IngestSummary,
        error: IngestError,
    },
}

fn emit(events: &Option<mpsc::Sender<IngestEvent>>, event: IngestEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

/// Run one ingest for `project`. `store` must hold an initialised config.
pub fn run_ingest(
    project: &Project,
    store: &mut ProjectStore,
    roots: &[PathBuf],
    scanner: &SourceScanner,
    options: &IngestOptions,
    events: Option<mpsc::Sender<IngestEvent>>,
) -> Result<IngestOutcome> {
    let config = store.config().cloned().ok_or_else(|| {
        IngestError::config_invalid(store.config_path(), "project config is not initialised")
    })?;

    info!(project = %project.name, roots = roots.len(), "Searching for files to ingest");
    let report = scanner.scan(roots);
    emit(
        &events,
        IngestEvent::Scanned {
            files: report.files.len(),
            bytes: report.total_size(),
            issues: report.issues.len(),
        },
    );

    if report.files.is_empty() {
        info!(project = %project.name, "Could not find any files to ingest");
        return Ok(IngestOutcome::NothingToIngest {
            scan_issues: report.issues,
        });
    }

    let mut sequencer = IngestSequencer::new(config.ingest_count);
    let slot = sequencer.allocate(&project.full_path)?;
    let batch = IngestBatch {
        ingest_number: slot.number,
        target_folder: slot.target_folder.clone(),
        files: report.files,
    };
    emit(
        &events,
        IngestEvent::Planned {
            ingest_number: batch.ingest_number,
            target_folder: batch.target_folder.clone(),
            files: batch.len(),
            total_bytes: batch.total_size(),
        },
    );

    if options.dry_run {
        return Ok(IngestOutcome::DryRun {
            batch,
            scan_issues: report.issues,
        });
    }

    // A folder left by an interrupted run: finished copies are accepted
    let resume = batch.target_folder.exists();
    if resume {
        warn!(target = %batch.target_folder.display(), "Target folder already exists, resuming");
    }

    let engine = CopyEngine::new(CopyConfig {
        jobs: options.jobs,
        fail_fast: options.fail_fast,
        resume_existing: resume,
    });
    let outcomes = std::thread::scope(|scope| {
        let (copy_tx, copy_rx) = mpsc::channel::<CopyProgress>();
        if let Some(tx) = events.clone() {
            scope.spawn(move || {
                for progress in copy_rx {
                    let _ = tx.send(IngestEvent::Copy(progress));
                }
            });
        }
        engine.copy(
            &batch.files,
            &batch.target_folder,
            |name| config.target_name(name),
            events.as_ref().map(|_| copy_tx),
        )
    })?;

    let marker = OriginMarker::now();
    let files: Vec<FileRecord> = outcomes
        .into_iter()
        .map(|outcome| {
            let mut record = FileRecord {
                source: outcome.source,
                target: outcome.target,
                size: outcome.size,
                state: FileState::Pending,
                resumed: outcome.status == CopyStatus::Resumed,
                marked_as: None,
                issue: None,
            };
            match outcome.status {
                CopyStatus::Copied | CopyStatus::Resumed => match marker.mark(&record.source) {
                    Ok(marked) => {
                        record.state = FileState::Marked;
                        record.marked_as = Some(marked);
                    }
                    Err(issue) => {
                        record.state = FileState::Copied;
                        record.issue = Some(issue);
                    }
                },
                CopyStatus::Pending => {
                    record.issue = Some(FileIssue::new(
                        &record.source,
                        codes::COPY_SKIPPED,
                        "not started after an earlier failure",
                    ));
                }
                CopyStatus::Failed(issue) => {
                    record.state = FileState::Failed;
                    record.issue = Some(issue);
                }
            }
            record
        })
        .collect();

    let marked_files = files.iter().filter(|f| f.state == FileState::Marked).count();
    let mark_failures = files.iter().filter(|f| f.state == FileState::Copied).count();
    emit(
        &events,
        IngestEvent::Marked {
            marked: marked_files,
            failed: mark_failures,
        },
    );

    let summary = IngestSummary {
        project: project.name.clone(),
        ingest_number: batch.ingest_number,
        target_folder: batch.target_folder.clone(),
        total_files: files.len(),
        total_bytes: batch.total_size(),
        copied_files: files
            .iter()
            .filter(|f| matches!(f.state, FileState::Copied | FileState::Marked))
            .count(),
        copied_bytes: files
            .iter()
            .filter(|f| matches!(f.state, FileState::Copied | FileState::Marked))
            .map(|f| f.size)
            .sum(),
        marked_files,
        resumed_files: files.iter().filter(|f| f.resumed).count(),
        failed_files: files.iter().filter(|f| f.state != FileState::Marked).count(),
        mark_suffix: marker.suffix().to_string(),
        files,
        scan_issues: report.issues,
    };

    info!(
        project = %summary.project,
        ingest = summary.ingest_number,
        copied = summary.copied_files,
        marked = summary.marked_files,
        failed = summary.failed_files,
        "Ingest finished, persisting counter"
    );

    // The folder exists now, so the number is spent even if some files failed
    if let Err(error) = store.commit(ProjectConfig {
        prefix: config.prefix.clone(),
        ingest_count: batch.ingest_number,
    }) {
        warn!(
            project = %summary.project,
            ingest = summary.ingest_number,
            error = %error,
            "Failed to persist ingest counter"
        );
        return Ok(IngestOutcome::PersistFailed { summary, error });
    }

    Ok(IngestOutcome::Completed(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::project;
    use crate::ingest::marker::is_origin_marked;
    use std::fs;
    use std::path::Path;
    use std::time::SystemTime;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        card: PathBuf,
        project: Project,
    }

    fn fixture(prefix: &str, ingest_count: u64) -> Fixture {
        let root = TempDir::new().unwrap();
        let card = root.path().join("card");
        let project_dir = root.path().join("projects/Trip");
        fs::create_dir_all(&card).unwrap();
        fs::create_dir_all(&project_dir).unwrap();
        project::save(
            &project_dir,
            &ProjectConfig {
                prefix: prefix.to_string(),
                ingest_count,
            },
        )
        .unwrap();
        Fixture {
            card,
            project: Project {
                name: "Trip".into(),
                full_path: project_dir,
                last_modified: SystemTime::now(),
            },
            _root: root,
        }
    }

    fn write(dir: &Path, name: &str, bytes: usize) {
        fs::write(dir.join(name), vec![7u8; bytes]).unwrap();
    }

    fn run(fx: &Fixture, options: &IngestOptions) -> IngestOutcome {
        let mut store = ProjectStore::open(&fx.project.full_path).unwrap();
        let scanner = SourceScanner::from_patterns(["**/*.mp4"]).unwrap();
        run_ingest(
            &fx.project,
            &mut store,
            &[fx.card.clone()],
            &scanner,
            options,
            None,
        )
        .unwrap()
    }

    fn count(fx: &Fixture) -> u64 {
        project::load(&fx.project.full_path)
            .unwrap()
            .unwrap()
            .ingest_count
    }

    #[test]
    fn two_files_land_in_raw_1_and_originals_are_marked() {
        let fx = fixture("X_", 0);
        write(&fx.card, "a.mp4", 10 * 1024);
        write(&fx.card, "b.mp4", 5 * 1024);

        let summary = match run(&fx, &IngestOptions::default()) {
            IngestOutcome::Completed(summary) => summary,
            other => panic!("unexpected outcome {:?}", other),
        };

        let raw1 = fx.project.full_path.join("raw 1");
        assert_eq!(summary.target_folder, raw1);
        assert!(summary.is_complete());
        assert_eq!(fs::metadata(raw1.join("X_a.mp4")).unwrap().len(), 10 * 1024);
        assert_eq!(fs::metadata(raw1.join("X_b.mp4")).unwrap().len(), 5 * 1024);
        assert!(!fx.card.join("a.mp4").exists());

        let remaining: Vec<String> = fs::read_dir(&fx.card)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|n| is_origin_marked(n)));
        assert_eq!(count(&fx), 1);
    }

    #[test]
    fn second_run_finds_nothing_and_keeps_counter() {
        let fx = fixture("X_", 0);
        write(&fx.card, "a.mp4", 3);

        assert!(matches!(
            run(&fx, &IngestOptions::default()),
            IngestOutcome::Completed(_)
        ));
        assert!(matches!(
            run(&fx, &IngestOptions::default()),
            IngestOutcome::NothingToIngest { .. }
        ));
        assert_eq!(count(&fx), 1);
        assert!(!fx.project.full_path.join("raw 2").exists());
    }

    #[test]
    fn counter_advances_by_one_per_run() {
        let fx = fixture("cam_", 6);
        for (i, name) in ["a.mp4", "b.mp4", "c.mp4"].iter().enumerate() {
            write(&fx.card, name, 1);
            assert!(matches!(
                run(&fx, &IngestOptions::default()),
                IngestOutcome::Completed(_)
            ));
            assert_eq!(count(&fx), 7 + i as u64);
        }
        for n in 7..=9 {
            assert!(fx.project.full_path.join(format!("raw {}", n)).is_dir());
        }
    }

    #[test]
    fn dry_run_has_no_side_effects() {
        let fx = fixture("X_", 2);
        write(&fx.card, "a.mp4", 4);

        match run(
            &fx,
            &IngestOptions {
                dry_run: true,
                ..IngestOptions::default()
            },
        ) {
            IngestOutcome::DryRun { batch, .. } => {
                assert_eq!(batch.ingest_number, 3);
                assert_eq!(batch.total_size(), 4);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!fx.project.full_path.join("raw 3").exists());
        assert!(fx.card.join("a.mp4").exists());
        assert_eq!(count(&fx), 2);
    }

    #[test]
    fn collision_leaves_existing_file_and_original_alone() {
        let fx = fixture("X_", 0);
        write(&fx.card, "a.mp4", 8);
        write(&fx.card, "b.mp4", 8);
        let raw1 = fx.project.full_path.join("raw 1");
        fs::create_dir_all(&raw1).unwrap();
        fs::write(raw1.join("X_a.mp4"), b"keep me").unwrap();

        let summary = match run(&fx, &IngestOptions::default()) {
            IngestOutcome::Completed(summary) => summary,
            other => panic!("unexpected outcome {:?}", other),
        };

        assert_eq!(fs::read(raw1.join("X_a.mp4")).unwrap(), b"keep me");
        assert!(fx.card.join("a.mp4").exists());
        assert!(!fx.card.join("b.mp4").exists());
        assert_eq!(summary.failed_files, 1);
        assert_eq!(
            summary.issues().next().map(|i| i.code),
            Some(codes::NAME_COLLISION)
        );
        assert_eq!(count(&fx), 1);
    }

    #[test]
    fn interrupted_run_is_resumed_into_same_folder() {
        let fx = fixture("X_", 0);
        write(&fx.card, "a.mp4", 16);
        write(&fx.card, "b.mp4", 16);

        // Simulate a crash after copying a.mp4 but before marking and persisting
        let raw1 = fx.project.full_path.join("raw 1");
        CopyEngine::default()
            .copy(
                &[crate::ingest::DiscoveredFile {
                    path: fx.card.join("a.mp4"),
                    size: 16,
                    source_root: fx.card.clone(),
                }],
                &raw1,
                |n| format!("X_{}", n),
                None,
            )
            .unwrap();

        let summary = match run(&fx, &IngestOptions::default()) {
            IngestOutcome::Completed(summary) => summary,
            other => panic!("unexpected outcome {:?}", other),
        };

        assert!(summary.is_complete());
        assert_eq!(summary.resumed_files, 1);
        assert_eq!(summary.target_folder, raw1);
        assert!(raw1.join("X_b.mp4").is_file());
        assert_eq!(count(&fx), 1);
    }

    #[test]
    fn failed_persist_keeps_the_summary() {
        let fx = fixture("X_", 0);
        write(&fx.card, "a.mp4", 8);
        write(&fx.card, "b.mp4", 8);

        let mut store = ProjectStore::open(&fx.project.full_path).unwrap();
        // A non-empty directory cannot be replaced by the atomic rename
        let config_path = store.config_path();
        fs::remove_file(&config_path).unwrap();
        fs::create_dir(&config_path).unwrap();
        fs::write(config_path.join("occupied"), b"x").unwrap();

        let scanner = SourceScanner::from_patterns(["**/*.mp4"]).unwrap();
        let outcome = run_ingest(
            &fx.project,
            &mut store,
            &[fx.card.clone()],
            &scanner,
            &IngestOptions::default(),
            None,
        )
        .unwrap();

        match outcome {
            IngestOutcome::PersistFailed { summary, error } => {
                assert_eq!(error.code(), "PERSIST_FAILED");
                assert_eq!(summary.ingest_number, 1);
                assert_eq!(summary.marked_files, 2);
                assert_eq!(summary.files.len(), 2);
                assert!(summary.files.iter().all(|f| f.marked_as.is_some()));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(fx.project.full_path.join("raw 1").join("X_a.mp4").is_file());
    }

    #[test]
    fn uninitialised_store_is_rejected() {
        let root = TempDir::new().unwrap();
        let project = Project {
            name: "Fresh".into(),
            full_path: root.path().to_path_buf(),
            last_modified: SystemTime::now(),
        };
        let mut store = ProjectStore::open(root.path()).unwrap();
        let scanner = SourceScanner::from_patterns(["*.mp4"]).unwrap();
        let err = run_ingest(
            &project,
            &mut store,
            &[],
            &scanner,
            &IngestOptions::default(),
            None,
        )
        .unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID");
    }
}
