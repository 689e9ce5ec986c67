//! Configuration for the ingester
//!
//! - `global`: process-wide `ingester.conf.json` under the ingester home
//! - `project`: per-project `ingest.conf.json` and its transactional store
//! - `lock`: advisory lock serialising runs against one project

pub mod global;
pub mod lock;
pub mod project;

pub use global::{global_config_path, GlobalConfig, GlobalConfigLoad, SourceDirs};
pub use lock::ConfigLock;
pub use project::{ProjectConfig, ProjectStore, PROJECT_CONFIG_FILE};
