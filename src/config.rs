//! Configuration Module - User preferences from ~/.posdup/config.toml
//!
//! Supports:
//! - Logging level and output format
//! - Default scan and matching options
//! - Default in-place field edits

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::ScanOptions;
use crate::group::{MatchOptions, NearPolicy};
use crate::mutate::MutationOptions;

/// posdup configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Scan settings
    pub scan: ScanConfig,
    /// In-place edits applied while scanning
    pub mutate: MutationOptions,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}

/// Scan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File-name suffix filter
    pub file_pattern: String,
    /// Decimal places for position keys (negative = no rounding)
    pub rounding_decimals: i32,
    /// Merge near positions into existing groups
    pub find_near_duplicates: bool,
    /// Per-component tolerance for near matching
    pub tolerance: f64,
    pub near_policy: NearPolicy,
    /// Skip hidden files and directories
    pub skip_hidden: bool,
    /// Max depth (0 = unlimited)
    pub max_depth: usize,
    /// Leave files without a position untouched by edits
    pub ignore_empty: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let scan = ScanOptions::default();
        Self {
            file_pattern: scan.file_pattern,
            rounding_decimals: scan.rounding_decimals,
            find_near_duplicates: scan.matching.find_near_duplicates,
            tolerance: scan.matching.tolerance,
            near_policy: scan.matching.near_policy,
            skip_hidden: scan.skip_hidden,
            max_depth: 0,
            ignore_empty: scan.ignore_empty,
        }
    }
}

impl Config {
    /// Load config from default path or return defaults
    pub fn load() -> Self {
        let path = Self::default_path();
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring config: {:#}", e);
            Self::default()
        })
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        Ok(config)
    }

    /// Save config to default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;

        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "posdup")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".posdup")
                    .join("config.toml")
            })
    }

    /// Write the commented sample config to `path` unless a file is already
    /// there. Returns true if a file was created.
    pub fn ensure_exists(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, generate_sample_config())
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        tracing::info!("Created default config at {}", path.display());
        Ok(true)
    }

    /// Scan options described by this config, before CLI overrides.
    pub fn to_scan_options(&self) -> ScanOptions {
        ScanOptions {
            file_pattern: self.scan.file_pattern.clone(),
            rounding_decimals: self.scan.rounding_decimals,
            matching: MatchOptions {
                find_near_duplicates: self.scan.find_near_duplicates,
                tolerance: self.scan.tolerance,
                near_policy: self.scan.near_policy,
            },
            mutations: self.mutate,
            ignore_empty: self.scan.ignore_empty,
            skip_hidden: self.scan.skip_hidden,
            max_depth: (self.scan.max_depth > 0).then_some(self.scan.max_depth),
        }
    }
}

/// Generate a sample config file with comments
pub fn generate_sample_config() -> String {
    r#"# posdup configuration
# Location: ~/.config/posdup/config.toml (or %APPDATA%\posdup\config\config.toml on Windows)

[general]
# Log level: trace, debug, info, warn, error
log_level = "info"

# Log format: "compact" or "json"
log_format = "compact"

[scan]
# Only files whose name ends with this suffix are scanned
file_pattern = "*.json"

# Decimal places used when comparing positions (negative = exact values)
rounding_decimals = 2

# Merge positions within `tolerance` of an existing group
find_near_duplicates = false

# Largest per-component difference still counted as near
tolerance = 0.01

# "first-fit" joins the earliest qualifying group,
# "best-fit" joins the closest one
near_policy = "first-fit"

# Skip hidden files and directories
skip_hidden = false

# Maximum scan depth (0 = unlimited)
max_depth = 0

# Leave files without a position untouched by the edits below;
# false applies the edits to them as well
ignore_empty = true

[mutate]
# These edit matching files in place while scanning.

# Set "name" to the file name without extension
update_name_from_filename = false

# Remove the "description" field
remove_description = false

# Set "name" to an empty string
clear_name = false

# Rewrite "position" rounded to rounding_decimals
round_positions_in_file = false
"#
    .to_string()
}
