//! Executable and PATH handling for stdio servers.
//!
//! Commands may be bare names (`npx`, `uvx`) looked up on PATH, or absolute
//! paths. The child PATH is enriched so that scripts installed next to an
//! interpreter can find it.

use std::collections::HashSet;
use std::env;
use std::ffi::OsString;
use std::path::Path;

#[cfg(unix)]
const PATH_SEPARATOR: &str = ":";
#[cfg(windows)]
const PATH_SEPARATOR: &str = ";";

/// Default paths for GUI-launched processes on macOS, which get a minimal PATH.
#[cfg(target_os = "macos")]
const MACOS_DEFAULT_PATHS: &str = "/opt/homebrew/bin:/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin";

/// Validate an absolute command path. Bare names are left to the OS lookup.
pub fn validate_command(command: &str) -> Result<(), String> {
    let path = Path::new(command);

    if !path.is_absolute() {
        return Ok(());
    }

    if !path.exists() {
        return Err(format!("Executable not found: {command}"));
    }

    if !path.is_file() {
        return Err(format!("Executable path is not a file: {command}"));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata =
            std::fs::metadata(path).map_err(|e| format!("Failed to check permissions: {e}"))?;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(format!("File is not executable: {command}"));
        }
    }

    Ok(())
}

/// Validate a working directory exists and is a directory.
pub fn validate_working_dir(cwd: &str) -> Result<(), String> {
    let path = Path::new(cwd);

    if !path.exists() {
        return Err(format!("Working directory does not exist: {cwd}"));
    }

    if !path.is_dir() {
        return Err(format!("Working directory path is not a directory: {cwd}"));
    }

    Ok(())
}

/// Build the PATH for the child process.
///
/// Order: `path_extra`, the command's own directory (absolute commands
/// only), the current PATH, then platform defaults. Entries are deduplicated.
pub fn build_effective_path(command: &str, path_extra: Option<&str>) -> OsString {
    let mut entries: Vec<String> = Vec::new();

    if let Some(extra) = path_extra {
        entries.extend(
            extra
                .split(PATH_SEPARATOR)
                .filter(|e| !e.is_empty())
                .map(String::from),
        );
    }

    let command_path = Path::new(command);
    if command_path.is_absolute() {
        if let Some(dir) = command_path.parent().and_then(Path::to_str) {
            entries.push(dir.to_string());
        }
    }

    if let Some(current) = env::var_os("PATH") {
        if let Some(current) = current.to_str() {
            entries.extend(
                current
                    .split(PATH_SEPARATOR)
                    .filter(|e| !e.is_empty())
                    .map(String::from),
            );
        }
    }

    #[cfg(target_os = "macos")]
    entries.extend(
        MACOS_DEFAULT_PATHS
            .split(':')
            .filter(|e| !e.is_empty())
            .map(String::from),
    );

    let mut seen = HashSet::new();
    let deduped: Vec<String> = entries
        .into_iter()
        .filter(|entry| seen.insert(entry.clone()))
        .collect();

    OsString::from(deduped.join(PATH_SEPARATOR))
}
