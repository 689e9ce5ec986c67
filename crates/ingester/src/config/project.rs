//! Per-project configuration and its read-modify-commit store.

use super::lock::ConfigLock;
use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

pub const PROJECT_CONFIG_FILE: &str = "ingest.conf.json";

/// `<project>/ingest.conf.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub prefix: String,
    #[serde(default)]
    pub ingest_count: u64,
}

impl ProjectConfig {
    /// A fresh config. The prefix must not be blank.
    pub fn new(prefix: impl Into<String>) -> Option<Self> {
        let prefix = prefix.into();
        if prefix.trim().is_empty() {
            return None;
        }
        Some(Self {
            prefix,
            ingest_count: 0,
        })
    }

    /// Target file name for an original: the prefix prepended verbatim.
    pub fn target_name(&self, original_name: &str) -> String {
        format!("{}{}", self.prefix, original_name)
    }
}

pub fn config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_CONFIG_FILE)
}

/// Read a project config, `None` if the project has none yet.
pub fn load(project_dir: &Path) -> Result<Option<ProjectConfig>> {
    let path = config_path(project_dir);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(IngestError::Io(e)),
    };
    let config: ProjectConfig = serde_json::from_str(&content)
        .map_err(|e| IngestError::config_invalid(&path, e.to_string()))?;
    if config.prefix.trim().is_empty() {
        return Err(IngestError::config_invalid(&path, "prefix is empty"));
    }
    Ok(Some(config))
}

/// Replace the project config atomically: temp file in the same directory,
/// flushed, then renamed over the target.
pub fn save(project_dir: &Path, config: &ProjectConfig) -> Result<()> {
    let path = config_path(project_dir);
    write_atomic(project_dir, &path, config).map_err(|source| IngestError::PersistFailed {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), ingest_count = config.ingest_count, "Saved project config");
    Ok(())
}

fn write_atomic(dir: &Path, path: &Path, config: &ProjectConfig) -> io::Result<()> {
    let content = serde_json::to_string_pretty(config).map_err(io::Error::other)?;
    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Locked access to one project's config for the duration of a run.
///
/// Read once on open, committed once at the end. The lock makes a
/// concurrent run against the same project fail instead of reusing a folder.
#[derive(Debug)]
pub struct ProjectStore {
    project_dir: PathBuf,
    config: Option<ProjectConfig>,
    _lock: ConfigLock,
}

impl ProjectStore {
    pub fn open(project_dir: &Path) -> Result<Self> {
        let lock = ConfigLock::try_acquire(&config_path(project_dir))?;
        let config = load(project_dir)?;
        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            config,
            _lock: lock,
        })
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn config_path(&self) -> PathBuf {
        config_path(&self.project_dir)
    }

    /// The loaded (or initialised, not yet committed) config.
    pub fn config(&self) -> Option<&ProjectConfig> {
        self.config.as_ref()
    }

    /// The config existed on disk when the store was opened or was committed since.
    pub fn is_initialised(&self) -> bool {
        self.config.is_some()
    }

    /// Initialise a config in memory for a project that has none.
    /// Nothing is written until `commit`.
    pub fn init(&mut self, prefix: &str) -> Result<&ProjectConfig> {
        if self.config.is_some() {
            return Err(IngestError::config_invalid(
                self.config_path(),
                "project config already exists",
            ));
        }
        let config = ProjectConfig::new(prefix)
            .ok_or_else(|| IngestError::Cancelled("no prefix supplied".to_string()))?;
        Ok(self.config.insert(config))
    }

    /// Persist the next state. The ingest counter may only move forward.
    pub fn commit(&mut self, next: ProjectConfig) -> Result<()> {
        if let Some(current) = &self.config {
            if next.ingest_count < current.ingest_count {
                return Err(IngestError::config_invalid(
                    self.config_path(),
                    format!(
                        "ingestCount would decrease from {} to {}",
                        current.ingest_count, next.ingest_count
                    ),
                ));
            }
        }
        save(&self.project_dir, &next)?;
        self.config = Some(next);
        Ok(())
    }
}
