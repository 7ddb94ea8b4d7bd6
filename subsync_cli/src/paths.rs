//! Centralized path management for the subsync CLI
//!
//! Configuration and the credentials file share one directory so that
//! `XDG_CONFIG_HOME` relocates both.

use std::path::{Path, PathBuf};
use subsync_core::security::AUTH_FILE_NAME;
use subsync_core::sync_list::SYNC_LIST_FILE;

/// The name of the application directory used across all platforms
const APP_DIR: &str = "subsync";

/// The name of the configuration file
const CONFIG_FILE: &str = "config.toml";

/// Name of the per-library ignore file
pub const IGNORE_FILE: &str = ".subsyncignore";

/// Returns the configuration directory
///
/// `XDG_CONFIG_HOME` wins when set (Linux/macOS). Otherwise:
/// - Linux: `~/.config/subsync`
/// - macOS: `~/Library/Application Support/subsync`
/// - Windows: `%APPDATA%\subsync`
///
/// Falls back to `.subsync` in the current directory.
pub fn get_config_dir() -> PathBuf {
    #[cfg(not(target_os = "windows"))]
    if let Some(xdg_config) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg_config).join(APP_DIR);
    }

    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".subsync"))
}

/// Returns the path to the configuration file
pub fn get_config_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILE)
}

/// Returns the path to the `username=`/`password=` credentials file
pub fn get_auth_path() -> PathBuf {
    get_config_dir().join(AUTH_FILE_NAME)
}

/// Default sync list location for a library: a hidden file in its root
pub fn default_sync_list_path(library: &Path) -> PathBuf {
    library.join(SYNC_LIST_FILE)
}
