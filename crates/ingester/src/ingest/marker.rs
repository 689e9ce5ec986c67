//! Origin marking: rename ingested originals so they are never scanned again.
//!
//! `clip.mp4` becomes `clip.mp4.copied.2024-05-01_18-30-00.bak`. Filters target
//! the original extension, so a marked file drops out of every later scan.

use super::types::{codes, FileIssue};
use chrono::{DateTime, Local, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MARK_INFIX: &str = ".copied.";
pub const MARK_EXTENSION: &str = ".bak";
/// 24-hour clock so suffixes sort in time order.
pub const MARK_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// True if a file name already carries an origin mark.
pub fn is_origin_marked(file_name: &str) -> bool {
    let Some(stem) = file_name.strip_suffix(MARK_EXTENSION) else {
        return false;
    };
    match stem.rfind(MARK_INFIX) {
        Some(idx) => {
            let stamp = &stem[idx + MARK_INFIX.len()..];
            chrono::NaiveDateTime::parse_from_str(stamp, MARK_TIMESTAMP_FORMAT).is_ok()
        }
        None => false,
    }
}

/// Renames originals with one timestamp shared by the whole run.
#[derive(Debug, Clone)]
pub struct OriginMarker {
    suffix: String,
}

impl OriginMarker {
    pub fn new<Tz: TimeZone>(at: DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            suffix: format!(
                "{}{}{}",
                MARK_INFIX,
                at.format(MARK_TIMESTAMP_FORMAT),
                MARK_EXTENSION
            ),
        }
    }

    pub fn now() -> Self {
        Self::new(Local::now())
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn marked_path(&self, original: &Path) -> PathBuf {
        let mut name = original.as_os_str().to_os_string();
        name.push(&self.suffix);
        PathBuf::from(name)
    }

    /// Rename one original in place. Never replaces an existing file.
    pub fn mark(&self, original: &Path) -> Result<PathBuf, FileIssue> {
        let marked = self.marked_path(original);
        if fs::symlink_metadata(&marked).is_ok() {
            warn!(path = %original.display(), "Mark target already exists");
            return Err(FileIssue::new(
                original,
                codes::MARK_FAILED,
                format!("{} already exists", marked.display()),
            ));
        }

        match fs::rename(original, &marked) {
            Ok(()) => {
                debug!(from = %original.display(), to = %marked.display(), "Marked original");
                Ok(marked)
            }
            Err(e) => {
                warn!(path = %original.display(), error = %e, "Failed to mark original");
                Err(FileIssue::new(original, codes::MARK_FAILED, e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn marker_at(h: u32, m: u32, s: u32) -> OriginMarker {
        let at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
            .and_utc();
        OriginMarker::new(at)
    }

    #[test]
    fn suffix_format() {
        assert_eq!(
            marker_at(18, 30, 5).suffix(),
            ".copied.2024-05-01_18-30-05.bak"
        );
    }

    #[test]
    fn suffixes_sort_in_time_order() {
        let morning = marker_at(9, 0, 0);
        let afternoon = marker_at(13, 0, 0);
        assert!(afternoon.suffix() > morning.suffix());
    }

    #[test]
    fn detects_marked_names() {
        assert!(is_origin_marked("a.mp4.copied.2024-05-01_18-30-05.bak"));
        assert!(!is_origin_marked("a.mp4"));
        assert!(!is_origin_marked("a.bak"));
        assert!(!is_origin_marked("a.copied.notadate.bak"));
    }

    #[test]
    fn mark_renames_in_place() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("a.mp4");
        fs::write(&original, b"data").unwrap();

        let marker = marker_at(10, 0, 0);
        let marked = marker.mark(&original).unwrap();

        assert!(!original.exists());
        assert_eq!(fs::read(&marked).unwrap(), b"data");
        assert_eq!(
            marked.file_name().unwrap(),
            "a.mp4.copied.2024-05-01_10-00-00.bak"
        );
    }

    #[test]
    fn mark_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = marker_at(10, 0, 0)
            .mark(&dir.path().join("gone.mp4"))
            .unwrap_err();
        assert_eq!(err.code, codes::MARK_FAILED);
    }

    #[test]
    fn mark_never_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("a.mp4");
        fs::write(&original, b"new").unwrap();
        let marker = marker_at(10, 0, 0);
        fs::write(marker.marked_path(&original), b"old").unwrap();

        assert!(marker.mark(&original).is_err());
        assert!(original.exists());
        assert_eq!(fs::read(marker.marked_path(&original)).unwrap(), b"old");
    }
}
