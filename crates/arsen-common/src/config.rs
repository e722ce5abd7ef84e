//! Global configuration model for Arsen.
//!
//! Configuration is read from a YAML file. Every key is optional; missing
//! sections fall back to the defaults below.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ArsenError, Result};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArsenConfig {
    /// Base directory for Arsen state and data.
    pub data_dir: PathBuf,
    /// Instruction and analysis cache limits.
    pub cache: CacheConfig,
    /// Analysis pass tuning.
    pub analysis: AnalysisConfig,
    /// Binary loader settings.
    pub loader: LoaderConfig,
    /// Hex view rendering.
    pub hex: HexConfig,
}

impl Default for ArsenConfig {
    fn default() -> Self {
        Self {
            data_dir: crate::constants::data_dir().clone(),
            cache: CacheConfig::default(),
            analysis: AnalysisConfig::default(),
            loader: LoaderConfig::default(),
            hex: HexConfig::default(),
        }
    }
}

/// Cache capacities and expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum decoded instructions kept in memory.
    pub instruction_capacity: usize,
    /// Maximum analysis results kept in memory.
    pub analysis_capacity: usize,
    /// Seconds an entry may go unread before it expires.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            instruction_capacity: 10_000,
            analysis_capacity: 1_000,
            ttl_secs: 30 * 60,
        }
    }
}

/// Analysis pass tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Shortest printable run reported as a string.
    pub min_string_length: usize,
    /// Cap on instructions gathered per function.
    pub max_function_instructions: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_string_length: crate::constants::MIN_STRING_LENGTH,
            max_function_instructions: crate::constants::MAX_FUNCTION_INSTRUCTIONS,
        }
    }
}

/// Binary loader settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Bytes read from the start of a file to select a loader.
    pub header_probe_len: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            header_probe_len: crate::constants::HEADER_PROBE_LEN,
        }
    }
}

/// Hex dump rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HexConfig {
    /// Maximum bytes rendered in one dump.
    pub display_limit: usize,
    /// Bytes shown per row.
    pub bytes_per_row: usize,
}

impl Default for HexConfig {
    fn default() -> Self {
        Self {
            display_limit: 10_000,
            bytes_per_row: 16,
        }
    }
}

impl ArsenConfig {
    /// Parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path).map_err(|e| ArsenError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parses configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Config` if the text is not valid YAML for this model.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ArsenError::Config {
            message: format!("cannot parse configuration: {e}"),
        })
    }

    /// Loads the given file, or returns defaults when no path is given or the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be parsed.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            Some(p) => {
                tracing::warn!(path = %p.display(), "configuration file missing, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }
}
