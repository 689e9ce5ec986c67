//! Global configuration: where projects live and where to look for media.

use crate::error::{IngestError, Result};
use crate::ingest::copier::DEFAULT_COPY_JOBS;
use crate::ingest::patterns::FilterSet;
use ingester_logging::ingester_home;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const GLOBAL_CONFIG_FILE: &str = "ingester.conf.json";
pub const DEFAULT_SOURCE_FILTER: &str = "**/*.mp4";

/// Path of the global config: ~/.ingester/ingester.conf.json
pub fn global_config_path() -> PathBuf {
    ingester_home().join(GLOBAL_CONFIG_FILE)
}

/// `sourceDir` may be one path or a list of paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceDirs {
    One(String),
    Many(Vec<String>),
}

impl Default for SourceDirs {
    fn default() -> Self {
        SourceDirs::One(String::new())
    }
}

impl SourceDirs {
    /// Non-empty entries in configured order; one path is a one-element list.
    pub fn roots(&self) -> Vec<PathBuf> {
        let raw: Vec<&str> = match self {
            SourceDirs::One(dir) => vec![dir.as_str()],
            SourceDirs::Many(dirs) => dirs.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .collect()
    }
}

fn default_source_filters() -> Vec<String> {
    vec![DEFAULT_SOURCE_FILTER.to_string()]
}

/// Global ingester configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    #[serde(default)]
    pub projects_dir: String,
    #[serde(default)]
    pub source_dir: SourceDirs,
    #[serde(default = "default_source_filters")]
    pub source_filters: Vec<String>,
    /// Directory copied into every newly created project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<String>,
    /// Maximum concurrent copies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_jobs: Option<usize>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            projects_dir: String::new(),
            source_dir: SourceDirs::default(),
            source_filters: default_source_filters(),
            template_dir: None,
            copy_jobs: None,
        }
    }
}

/// Outcome of loading the global config.
#[derive(Debug)]
pub enum GlobalConfigLoad {
    Loaded(GlobalConfig),
    /// The file did not exist; defaults were written here
    Created(PathBuf),
}

impl GlobalConfig {
    /// Load the config at `path`, writing defaults if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<GlobalConfigLoad> {
        match fs::read_to_string(path) {
            Ok(content) => {
                let config: GlobalConfig = serde_json::from_str(&content)
                    .map_err(|e| IngestError::config_invalid(path, e.to_string()))?;
                info!(path = %path.display(), "Loaded global config");
                Ok(GlobalConfigLoad::Loaded(config))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let defaults = GlobalConfig::default();
                fs::write(path, serde_json::to_string_pretty(&defaults).map_err(io::Error::other)?)?;
                warn!(path = %path.display(), "Created default global config");
                Ok(GlobalConfigLoad::Created(path.to_path_buf()))
            }
            Err(e) => Err(IngestError::Io(e)),
        }
    }

    /// The projects directory, or NO_PROJECTS_DIR when unset.
    pub fn projects_dir(&self, config_path: &Path) -> Result<PathBuf> {
        let dir = self.projects_dir.trim();
        if dir.is_empty() {
            return Err(IngestError::NoProjectsDir(config_path.to_path_buf()));
        }
        Ok(PathBuf::from(dir))
    }

    pub fn source_roots(&self) -> Vec<PathBuf> {
        self.source_dir.roots()
    }

    pub fn template_dir(&self) -> Option<PathBuf> {
        self.template_dir
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
    }

    pub fn copy_jobs(&self) -> usize {
        self.copy_jobs.filter(|j| *j > 0).unwrap_or(DEFAULT_COPY_JOBS)
    }

    /// Check everything an ingest run needs and compile the filters.
    pub fn validate(&self, config_path: &Path) -> Result<FilterSet> {
        self.projects_dir(config_path)?;
        if self.source_roots().is_empty() {
            return Err(IngestError::config_invalid(config_path, "sourceDir is empty"));
        }
        if self.source_filters.iter().all(|f| f.trim().is_empty()) {
            return Err(IngestError::config_invalid(config_path, "sourceFilters is empty"));
        }
        let filters = FilterSet::new(self.source_filters.iter().filter(|f| !f.trim().is_empty()))?;
        if filters.is_empty() {
            return Err(IngestError::config_invalid(
                config_path,
                "sourceFilters only has exclusions (\"!pattern\")",
            ));
        }
        Ok(filters)
    }
}
