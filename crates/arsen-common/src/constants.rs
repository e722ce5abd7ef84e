//! System-wide constants and default paths.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Fallback data directory when no home directory is available.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/arsen";

/// Returns the data directory, preferring `$HOME/.arsen` and falling back
/// to `/var/lib/arsen`.
fn resolve_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return PathBuf::from(home).join(".arsen");
    }
    PathBuf::from(SYSTEM_DATA_DIR)
}

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved data directory for this session.
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(resolve_data_dir)
}

/// Returns the default configuration file path.
pub fn default_config_file() -> PathBuf {
    data_dir().join("config.yaml")
}

/// Application name used in output and project files.
pub const APP_NAME: &str = "arsen";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "arsen";

/// File extension for saved projects.
pub const PROJECT_EXTENSION: &str = ".arsen.json";

/// Version written into every saved project file.
pub const PROJECT_FORMAT_VERSION: &str = "1.0";

/// Number of leading bytes read when probing a file's format.
pub const HEADER_PROBE_LEN: usize = 512;

/// Prefix of auto-generated function names.
pub const DEFAULT_FUNCTION_PREFIX: &str = "SUB_";

/// Minimum printable run reported by string analysis.
pub const MIN_STRING_LENGTH: usize = 4;

/// Upper bound on instructions collected for a single function.
pub const MAX_FUNCTION_INSTRUCTIONS: usize = 10_000;
