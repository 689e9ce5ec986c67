//! Project discovery and creation under the projects directory.

use crate::config::project::{self, ProjectConfig};
use crate::error::{IngestError, Result};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Directory names starting with this are hidden from the project list.
pub const RESERVED_PREFIX: char = '_';
/// Capture staging folder, never a project.
pub const RESERVED_NAME: &str = "Capture";
/// Token in template file names replaced by the project prefix.
pub const PREFIX_PLACEHOLDER: &str = "__PREFIX__";

/// A project directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub name: String,
    /// Canonical path, symlinks resolved
    pub full_path: PathBuf,
    #[serde(with = "system_time_serde")]
    pub last_modified: SystemTime,
}

mod system_time_serde {
    use serde::{Serialize, Serializer};
    use std::time::SystemTime;

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        duration.as_secs().serialize(serializer)
    }
}

/// Whether a directory entry name may be listed as a project.
pub fn is_listable_name(name: &str) -> bool {
    !name.starts_with(RESERVED_PREFIX)
        && name != RESERVED_NAME
        && !name.to_lowercase().contains("backup")
}

/// List projects, most recently modified first.
///
/// Listing or stat failures are fatal: a partial project list would let the
/// operator pick the wrong place to ingest into.
pub fn discover_projects(projects_dir: &Path) -> Result<Vec<Project>> {
    let entries = fs::read_dir(projects_dir).map_err(|source| IngestError::ProjectsDirUnreadable {
        path: projects_dir.to_path_buf(),
        source,
    })?;

    let mut projects = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_listable_name(&name) {
            debug!(name = %name, "Skipping reserved entry");
            continue;
        }

        let full_path = fs::canonicalize(entry.path())?;
        let meta = fs::metadata(&full_path)?;
        if !meta.is_dir() {
            continue;
        }

        projects.push(Project {
            name,
            full_path,
            last_modified: meta.modified()?,
        });
    }

    projects.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(projects)
}

/// Look a project up by exact directory name.
pub fn find_project(projects_dir: &Path, name: &str) -> Result<Project> {
    discover_projects(projects_dir)?
        .into_iter()
        .find(|p| p.name == name)
        .ok_or_else(|| IngestError::ProjectNotFound(name.to_string()))
}

fn validate_project_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
        || !is_listable_name(trimmed);
    if invalid {
        return Err(IngestError::InvalidProjectName(name.to_string()));
    }
    Ok(trimmed)
}

/// Create a project directory, optionally seeding it from a template and
/// writing an initial config when a prefix is known.
pub fn create_project(
    projects_dir: &Path,
    name: &str,
    template: Option<&Path>,
    prefix: Option<&str>,
) -> Result<Project> {
    let name = validate_project_name(name)?;
    let config = prefix.and_then(ProjectConfig::new);

    let dir = projects_dir.join(name);
    if let Err(e) = fs::create_dir(&dir) {
        if e.kind() == io::ErrorKind::AlreadyExists {
            return Err(IngestError::ProjectExists(dir));
        }
        return Err(IngestError::Io(e));
    }

    if let Some(template) = template {
        let replacement = config.as_ref().map(|c| c.prefix.as_str()).unwrap_or("");
        let seeded = seed_from_template(template, &dir, replacement)?;
        info!(template = %template.display(), entries = seeded, "Seeded project from template");
    }

    if let Some(config) = &config {
        project::save(&dir, config)?;
    }

    let full_path = fs::canonicalize(&dir)?;
    let last_modified = fs::metadata(&full_path)?.modified()?;
    info!(name, path = %full_path.display(), "Created project");
    Ok(Project {
        name: name.to_string(),
        full_path,
        last_modified,
    })
}

/// Copy a template tree into `dest`, replacing the placeholder in every
/// file and directory name. Existing entries are left alone.
pub fn seed_from_template(template: &Path, dest: &Path, prefix: &str) -> Result<usize> {
    let mut seeded = 0;
    for entry in WalkDir::new(template).min_depth(1) {
        let entry = entry.map_err(|e| {
            IngestError::Io(e.into_io_error().unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::Other, "template walk failed")
            }))
        })?;
        let relative = match entry.path().strip_prefix(template) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let renamed: PathBuf = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().replace(PREFIX_PLACEHOLDER, prefix))
            .collect();
        let target = dest.join(renamed);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if target.exists() {
            debug!(target = %target.display(), "Template entry already present");
            continue;
        }
        fs::copy(entry.path(), &target)?;
        seeded += 1;
    }
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    fn mkdir_with_mtime(root: &Path, name: &str, secs: i64) {
        let dir = root.join(name);
        fs::create_dir(&dir).unwrap();
        set_file_mtime(&dir, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    #[test]
    fn reserved_names_are_hidden() {
        assert!(is_listable_name("Holiday 2024"));
        assert!(!is_listable_name("_archive"));
        assert!(!is_listable_name("Capture"));
        assert!(!is_listable_name("Old BACKUP"));
        assert!(!is_listable_name("backup-2023"));
    }

    #[test]
    fn projects_sorted_by_mtime_desc_and_filtered() {
        let root = TempDir::new().unwrap();
        mkdir_with_mtime(root.path(), "old", 1_000);
        mkdir_with_mtime(root.path(), "new", 3_000);
        mkdir_with_mtime(root.path(), "middle", 2_000);
        mkdir_with_mtime(root.path(), "_hidden", 4_000);
        mkdir_with_mtime(root.path(), "Capture", 4_000);
        mkdir_with_mtime(root.path(), "MyBackup", 4_000);
        fs::write(root.path().join("notes.txt"), "x").unwrap();

        let names: Vec<String> = discover_projects(root.path())
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["new", "middle", "old"]);
    }

    #[test]
    fn empty_projects_dir_lists_nothing() {
        let root = TempDir::new().unwrap();
        assert!(discover_projects(root.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_projects_dir_is_fatal() {
        let root = TempDir::new().unwrap();
        let err = discover_projects(&root.path().join("nope")).unwrap_err();
        assert_eq!(err.code(), "PROJECTS_DIR_UNREADABLE");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_projects_resolve_to_canonical_path() {
        let root = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), root.path().join("linked")).unwrap();

        let projects = discover_projects(root.path()).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(
            projects[0].full_path,
            fs::canonicalize(elsewhere.path()).unwrap()
        );
    }

    #[test]
    fn create_project_seeds_template_and_config() {
        let root = TempDir::new().unwrap();
        let template = TempDir::new().unwrap();
        fs::create_dir(template.path().join("edit")).unwrap();
        fs::write(template.path().join("edit/__PREFIX__timeline.prproj"), "t").unwrap();
        fs::write(template.path().join("readme.txt"), "r").unwrap();

        let project =
            create_project(root.path(), "Trip", Some(template.path()), Some("TRIP_")).unwrap();

        assert_eq!(project.name, "Trip");
        assert!(project.full_path.join("edit/TRIP_timeline.prproj").is_file());
        assert!(project.full_path.join("readme.txt").is_file());
        assert_eq!(
            project::load(&project.full_path).unwrap(),
            ProjectConfig::new("TRIP_")
        );
        assert_eq!(find_project(root.path(), "Trip").unwrap().name, "Trip");
    }

    #[test]
    fn create_project_rejects_bad_names_and_duplicates() {
        let root = TempDir::new().unwrap();
        assert!(matches!(
            create_project(root.path(), "../escape", None, None),
            Err(IngestError::InvalidProjectName(_))
        ));
        assert!(matches!(
            create_project(root.path(), "_private", None, None),
            Err(IngestError::InvalidProjectName(_))
        ));

        create_project(root.path(), "Dup", None, None).unwrap();
        assert!(matches!(
            create_project(root.path(), "Dup", None, None),
            Err(IngestError::ProjectExists(_))
        ));
        assert!(project::load(&root.path().join("Dup")).unwrap().is_none());
    }
}
