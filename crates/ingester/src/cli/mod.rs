//! CLI module for the ingester
//!
//! Each command lives in its own module with an `Args` struct and a `run`
//! function. Shared presentation helpers are in `output`, `prompt` and
//! `reveal`.

pub mod config;
pub mod error;
pub mod ingest;
pub mod new_project;
pub mod output;
pub mod projects;
pub mod prompt;
pub mod reveal;

use ingester::config::global_config_path;
use ingester::{GlobalConfig, GlobalConfigLoad, IngestError};
use std::path::PathBuf;

/// How a command finished, mapped to the process exit code by `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    /// Stopped early on purpose, nothing left half done
    Halted,
    /// Finished, but some files failed
    Partial,
    /// Already reported to the operator, exit as a failure
    Failed,
}

/// Load the global config, writing defaults on first run.
///
/// A first run ends with `ConfigMissing`: the operator has to edit the file
/// and nothing else may happen in this process.
pub fn load_global_config(reveal_file: bool) -> anyhow::Result<(PathBuf, GlobalConfig)> {
    let path = global_config_path();
    match GlobalConfig::load_or_create(&path)? {
        GlobalConfigLoad::Loaded(config) => Ok((path, config)),
        GlobalConfigLoad::Created(created) => {
            if reveal_file {
                reveal::reveal(&created);
            }
            Err(IngestError::ConfigMissing(created).into())
        }
    }
}
