//! Path utilities for toolhub data directories.
//!
//! # Design
//!
//! - Returns `PathBuf` and `PathError` for clear error handling
//! - No interactive/terminal I/O - adapters handle user prompts separately

mod error;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub use error::PathError;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TOOLHUB_DATA_DIR";

/// Database file name inside the data directory.
pub const DATABASE_FILE: &str = "toolhub.db";

/// Get the root directory for application data (database, config).
///
/// Resolution order:
/// 1. `TOOLHUB_DATA_DIR` environment variable (highest priority)
/// 2. System data directory (e.g., `~/.local/share/toolhub`)
///
/// The directory is created if it doesn't exist.
pub fn data_root() -> Result<PathBuf, PathError> {
    let root = match env::var(DATA_DIR_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => dirs::data_local_dir()
            .ok_or(PathError::NoDataDir)?
            .join("toolhub"),
    };

    ensure_dir(&root)?;
    tracing::debug!(path = %root.display(), "Resolved data root");
    Ok(root)
}

/// Get the path to the toolhub database file.
pub fn database_path() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join(DATABASE_FILE))
}

/// Create `dir` (and parents) if missing, failing if it is not a directory.
pub fn ensure_dir(dir: &Path) -> Result<(), PathError> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(PathError::NotADirectory(dir.to_path_buf()));
        }
        return Ok(());
    }

    fs::create_dir_all(dir).map_err(|e| PathError::CreateFailed {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })
}
