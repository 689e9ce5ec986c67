//! Show a file or folder in the system file manager.

use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Fire and forget; a missing file manager is only logged.
pub fn reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    let spawned = Command::new("open").arg("-R").arg(path).spawn();
    #[cfg(target_os = "windows")]
    let spawned = Command::new("explorer")
        .arg(format!("/select,{}", path.display()))
        .spawn();
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let spawned = Command::new("xdg-open")
        .arg(if path.is_dir() {
            path
        } else {
            path.parent().unwrap_or(path)
        })
        .spawn();

    match spawned {
        Ok(_) => debug!(path = %path.display(), "Revealed in file manager"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to open file manager"),
    }
}
