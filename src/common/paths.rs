//! Configuration and results paths

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// Name used for the configuration directory
const APP_NAME: &str = "esal-harness";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/esal-harness/`
/// - macOS: `~/Library/Application Support/esal-harness/`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Directory for one run: `<root>/<xp_type>-<device>-%m.%d.%Y_%H-%M-%S`
pub fn run_dir(root: &Path, xp_type: &str, device: &str, started: DateTime<Local>) -> PathBuf {
    let stamp = started.format("%m.%d.%Y_%H-%M-%S");
    root.join(format!("{}-{}-{}", xp_type, device, stamp))
}

/// Per-test transcript path; a bare name gets a `.txt` extension
pub fn transcript_path(run_dir: &Path, test_name: &str) -> PathBuf {
    let has_ext = Path::new(test_name)
        .extension()
        .map(|e| !e.is_empty())
        .unwrap_or(false);
    if has_ext {
        run_dir.join(test_name)
    } else {
        run_dir.join(format!("{}.txt", test_name))
    }
}

/// Make a results tree readable and writable by everyone (`chmod -R a+rwx`)
///
/// Runs are usually started with sudo for tap access; this keeps the logs
/// usable by the engineer afterwards.
#[cfg(unix)]
pub fn open_permissions(root: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if !root.exists() {
        return Ok(());
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let meta = std::fs::symlink_metadata(&path)?;
        if meta.file_type().is_symlink() {
            continue;
        }
        let mode = meta.permissions().mode() | 0o777;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))?;
        if meta.is_dir() {
            for entry in std::fs::read_dir(&path)? {
                stack.push(entry?.path());
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn open_permissions(_root: &Path) -> io::Result<()> {
    Ok(())
}
