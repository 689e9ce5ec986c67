//! Shared logging and home-directory helpers for the ingester binaries.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "ingester=info";
const LOG_GENERATIONS: usize = 5;
const LOG_SIZE_LIMIT: u64 = 10 * 1024 * 1024;

/// Environment variable that relocates the ingester home directory.
pub const HOME_ENV: &str = "INGESTER_HOME";

/// Logging configuration shared by ingester binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror the file filter on stderr instead of warnings only.
    pub verbose: bool,
}

/// Initialize tracing with a size-rotated log file and stderr output.
///
/// Without `verbose`, stderr only carries warnings so that the copy
/// progress bar is not interleaved with info lines.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let log = RotatingLog::open(log_dir, config.app_name, LOG_GENERATIONS, LOG_SIZE_LIMIT)
        .with_context(|| format!("Failed to open log file for {}", config.app_name))?;

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(log))
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Get the ingester home directory: ~/.ingester
pub fn ingester_home() -> PathBuf {
    if let Ok(override_path) = std::env::var(HOME_ENV) {
        if !override_path.trim().is_empty() {
            return PathBuf::from(override_path);
        }
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".ingester");
    }
    if let Ok(profile) = std::env::var("USERPROFILE") {
        return PathBuf::from(profile).join(".ingester");
    }
    PathBuf::from(".").join(".ingester")
}

/// Get the logs directory: ~/.ingester/logs
pub fn logs_dir() -> PathBuf {
    ingester_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

/// Size-capped log file.
///
/// Generation 0 is `<stem>.log`; older generations are `<stem>.log.<n>` up to
/// `generations - 1`. Rolling shifts every generation up by one and drops the
/// oldest.
struct RotatingLog {
    dir: PathBuf,
    stem: String,
    generations: usize,
    limit: u64,
    file: Option<File>,
    written: u64,
}

impl RotatingLog {
    fn open(dir: PathBuf, name: &str, generations: usize, limit: u64) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        let mut log = Self {
            dir,
            stem: sanitize_name(name),
            generations: generations.max(1),
            limit,
            file: None,
            written: 0,
        };
        log.reopen()?;
        if log.written > log.limit {
            log.roll()?;
        }
        Ok(log)
    }

    fn path(&self, generation: usize) -> PathBuf {
        match generation {
            0 => self.dir.join(format!("{}.log", self.stem)),
            n => self.dir.join(format!("{}.log.{}", self.stem, n)),
        }
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(0))?;
        self.written = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn roll(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        let oldest = self.path(self.generations - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for generation in (0..self.generations - 1).rev() {
            let from = self.path(generation);
            if from.exists() {
                fs::rename(&from, self.path(generation + 1))?;
            }
        }

        self.reopen()
    }
}

impl Write for RotatingLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() as u64 > self.limit {
            self.roll()?;
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file unavailable"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_replaces_path_characters() {
        assert_eq!(sanitize_name("ingester"), "ingester");
        assert_eq!(sanitize_name("in gest/er"), "in_gest_er");
    }

    #[test]
    fn log_rolls_when_full() {
        let dir = TempDir::new().unwrap();
        let mut log = RotatingLog::open(dir.path().to_path_buf(), "ingester", 3, 16).unwrap();

        log.write_all(b"0123456789").unwrap();
        log.write_all(b"abcdefghij").unwrap();
        log.flush().unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("ingester.log.1")).unwrap(),
            "0123456789"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("ingester.log")).unwrap(),
            "abcdefghij"
        );
    }

    #[test]
    fn log_keeps_at_most_generations() {
        let dir = TempDir::new().unwrap();
        let mut log = RotatingLog::open(dir.path().to_path_buf(), "ingester", 2, 4).unwrap();

        for _ in 0..5 {
            log.write_all(b"abcd").unwrap();
        }

        assert!(dir.path().join("ingester.log.1").exists());
        assert!(!dir.path().join("ingester.log.2").exists());
    }

    #[test]
    fn single_generation_truncates() {
        let dir = TempDir::new().unwrap();
        let mut log = RotatingLog::open(dir.path().to_path_buf(), "ingester", 1, 4).unwrap();

        log.write_all(b"old!").unwrap();
        log.write_all(b"new!").unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("ingester.log")).unwrap(), "new!");
        assert!(!dir.path().join("ingester.log.1").exists());
    }

    #[test]
    fn home_override() {
        let dir = TempDir::new().unwrap();
        std::env::set_var(HOME_ENV, dir.path());
        assert_eq!(ingester_home(), dir.path());
        assert_eq!(logs_dir(), dir.path().join("logs"));
        std::env::remove_var(HOME_ENV);
    }
}
