//! Source discovery across one or more source roots
//!
//! Each root is walked on its own thread. A root that is missing or cannot be
//! read is reported as an issue and skipped; it never cancels sibling roots.
//! Results are merged in root order and deduplicated by absolute path so the
//! file list is stable between runs.

use super::marker::is_origin_marked;
use super::patterns::FilterSet;
use super::types::{codes, DiscoveredFile, FileIssue};
use crate::error::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Configuration for scanning operations
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Follow symlinked folders below a root; walkdir reports loops as errors
    pub follow_symlinks: bool,
    /// Skip files that already carry an origin mark even if a filter matches them
    pub skip_marked: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: true,
            skip_marked: true,
        }
    }
}

/// Result of scanning all roots
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Matching files, sorted and unique by absolute path
    pub files: Vec<DiscoveredFile>,
    /// Roots or entries that were skipped
    pub issues: Vec<FileIssue>,
    pub roots_scanned: usize,
}

impl ScanReport {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Per-root walk output
#[derive(Debug, Default)]
struct RootScan {
    files: Vec<DiscoveredFile>,
    issues: Vec<FileIssue>,
    readable: bool,
}

/// Finds ingestible files below a set of source roots.
#[derive(Debug, Clone)]
pub struct SourceScanner {
    filters: FilterSet,
    config: ScanConfig,
}

impl SourceScanner {
    pub fn new(filters: FilterSet) -> Self {
        Self {
            filters,
            config: ScanConfig::default(),
        }
    }

    pub fn with_config(filters: FilterSet, config: ScanConfig) -> Self {
        Self { filters, config }
    }

    /// Build a scanner straight from raw glob patterns.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self::new(FilterSet::new(patterns)?))
    }

    /// Scan every root concurrently and merge the results.
    pub fn scan(&self, roots: &[PathBuf]) -> ScanReport {
        let start = Instant::now();

        let per_root: Vec<RootScan> = std::thread::scope(|scope| {
            let handles: Vec<_> = roots
                .iter()
                .map(|root| scope.spawn(move || self.scan_root(root)))
                .collect();

            handles
                .into_iter()
                .zip(roots)
                .map(|(handle, root)| {
                    handle.join().unwrap_or_else(|_| RootScan {
                        issues: vec![FileIssue::new(
                            root,
                            codes::SCAN_ROOT_UNREADABLE,
                            "scan thread panicked",
                        )],
                        ..RootScan::default()
                    })
                })
                .collect()
        });

        let mut unique: BTreeMap<PathBuf, DiscoveredFile> = BTreeMap::new();
        let mut report = ScanReport::default();
        for scan in per_root {
            if scan.readable {
                report.roots_scanned += 1;
            }
            for file in scan.files {
                unique.entry(file.path.clone()).or_insert(file);
            }
            report.issues.extend(scan.issues);
        }
        report.files = unique.into_values().collect();

        info!(
            roots = roots.len(),
            roots_scanned = report.roots_scanned,
            files = report.files.len(),
            bytes = report.total_size(),
            issues = report.issues.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Source scan complete"
        );

        report
    }

    fn scan_root(&self, root: &Path) -> RootScan {
        let mut scan = RootScan::default();

        let root = match fs::canonicalize(root).and_then(|p| fs::read_dir(&p).map(|_| p)) {
            Ok(root) => root,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Skipping unreadable source root");
                scan.issues.push(FileIssue::new(
                    root,
                    codes::SCAN_ROOT_UNREADABLE,
                    e.to_string(),
                ));
                return scan;
            }
        };
        scan.readable = true;
        debug!(root = %root.display(), "Scanning source root");

        let walker = WalkDir::new(&root).follow_links(self.config.follow_symlinks);
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                    warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                    scan.issues.push(FileIssue::new(
                        path,
                        codes::SCAN_ENTRY_UNREADABLE,
                        e.to_string(),
                    ));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = match entry.path().strip_prefix(&root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            if !self.filters.is_match(relative) {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if self.config.skip_marked && is_origin_marked(&name) {
                debug!(path = %entry.path().display(), "Skipping already marked file");
                continue;
            }

            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Cannot stat file");
                    scan.issues.push(FileIssue::new(
                        entry.path(),
                        codes::SCAN_ENTRY_UNREADABLE,
                        e.to_string(),
                    ));
                    continue;
                }
            };

            scan.files.push(DiscoveredFile {
                path: entry.path().to_path_buf(),
                size,
                source_root: root.clone(),
            });
        }

        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, bytes: usize) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![0u8; bytes]).unwrap();
    }

    #[test]
    fn finds_matching_files_recursively() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.mp4", 10);
        write(dir.path(), "DCIM/100/B.MP4", 5);
        write(dir.path(), "notes.txt", 3);

        let scanner = SourceScanner::from_patterns(["**/*.mp4"]).unwrap();
        let report = scanner.scan(&[dir.path().to_path_buf()]);

        assert_eq!(report.files.len(), 2);
        assert_eq!(report.total_size(), 15);
        assert!(report.issues.is_empty());
        assert!(report.files.iter().all(|f| f.path.is_absolute()));
    }

    #[test]
    fn unreadable_root_is_skipped() {
        let good = TempDir::new().unwrap();
        for name in ["a.mp4", "b.mp4", "c.mp4"] {
            write(good.path(), name, 1);
        }
        let missing = good.path().join("no-such-card");

        let scanner = SourceScanner::from_patterns(["**/*.mp4"]).unwrap();
        let report = scanner.scan(&[missing.clone(), good.path().to_path_buf()]);

        assert_eq!(report.files.len(), 3);
        assert_eq!(report.roots_scanned, 1);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].code, codes::SCAN_ROOT_UNREADABLE);
        assert_eq!(report.issues[0].path, missing);
    }

    #[test]
    fn overlapping_roots_are_deduplicated() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "sub/a.mp4", 1);

        let scanner = SourceScanner::from_patterns(["**/*.mp4"]).unwrap();
        let report = scanner.scan(&[dir.path().to_path_buf(), dir.path().join("sub")]);

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.roots_scanned, 2);
    }

    #[test]
    fn marked_files_are_not_rediscovered() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.mp4.copied.2024-05-01_10-00-00.bak", 1);
        write(dir.path(), "b.mp4", 1);

        let scanner = SourceScanner::from_patterns(["**/*"]).unwrap();
        let report = scanner.scan(&[dir.path().to_path_buf()]);

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].file_name(), Some("b.mp4"));
    }

    #[test]
    fn excluded_paths_are_left_on_the_card() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "DCIM/a.mp4", 4);
        write(dir.path(), "DCIM/proxy/a.mp4", 1);
        write(dir.path(), "proxy/b.mp4", 1);

        let scanner = SourceScanner::from_patterns(["**/*.mp4", "!**/proxy/**"]).unwrap();
        let report = scanner.scan(&[dir.path().to_path_buf()]);

        assert_eq!(report.files.len(), 1);
        assert!(report.files[0].path.ends_with("DCIM/a.mp4"));
        assert_eq!(report.total_size(), 4);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_folders_are_followed() {
        let card = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        write(elsewhere.path(), "100GOPRO/a.mp4", 2);
        std::os::unix::fs::symlink(elsewhere.path().join("100GOPRO"), card.path().join("DCIM"))
            .unwrap();

        let scanner = SourceScanner::from_patterns(["**/*.mp4"]).unwrap();
        let report = scanner.scan(&[card.path().to_path_buf()]);
        assert_eq!(report.files.len(), 1);
        assert!(report.files[0].path.ends_with("DCIM/a.mp4"));

        let no_follow = SourceScanner::with_config(
            FilterSet::new(["**/*.mp4"]).unwrap(),
            ScanConfig {
                follow_symlinks: false,
                ..ScanConfig::default()
            },
        );
        assert!(no_follow.scan(&[card.path().to_path_buf()]).files.is_empty());
    }

    #[test]
    fn output_is_sorted_by_path() {
        let dir = TempDir::new().unwrap();
        for name in ["c.mp4", "a.mp4", "b.mp4"] {
            write(dir.path(), name, 1);
        }

        let scanner = SourceScanner::from_patterns(["*.mp4"]).unwrap();
        let report = scanner.scan(&[dir.path().to_path_buf()]);
        let names: Vec<_> = report.files.iter().filter_map(|f| f.file_name()).collect();
        assert_eq!(names, vec!["a.mp4", "b.mp4", "c.mp4"]);
    }
}
