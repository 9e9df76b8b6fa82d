//! Configuration types for runtime, output and transfer settings

use anyhow::Context;

/// Runtime configuration for tokio and thread pools
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}

/// How content fetched without a destination is handed back to the caller
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Decode as UTF-8 text
    #[default]
    Utf8,
    /// Return the raw bytes
    Binary,
}

pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// Fully resolved settings for one put/get call.
///
/// The transfer engine only ever sees this type; layering happens before a
/// transfer starts (see [`TransferOverrides`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransferSettings {
    pub encoding: Encoding,
    /// Compute and log the plan but do not touch the destination
    pub dry_run: bool,
    /// Capacity of the read buffer used when streaming file contents
    pub buffer_size: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            encoding: Encoding::default(),
            dry_run: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl TransferSettings {
    /// Apply one override layer on top of these settings
    #[must_use]
    pub fn merged(&self, overrides: &TransferOverrides) -> Self {
        Self {
            encoding: overrides.encoding.unwrap_or(self.encoding),
            dry_run: overrides.dry_run.unwrap_or(self.dry_run),
            buffer_size: overrides.buffer_size.unwrap_or(self.buffer_size),
        }
    }

    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_size == 0 {
            return Err("buffer_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// A partial settings layer, e.g. a config file, command-line flags or a per-call override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferOverrides {
    pub encoding: Option<Encoding>,
    pub dry_run: Option<bool>,
    pub buffer_size: Option<usize>,
}

impl TransferOverrides {
    /// Stack `other` on top of `self`; keys set in `other` win.
    #[must_use]
    pub fn then(self, other: &TransferOverrides) -> Self {
        Self {
            encoding: other.encoding.or(self.encoding),
            dry_run: other.dry_run.or(self.dry_run),
            buffer_size: other.buffer_size.or(self.buffer_size),
        }
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("failed parsing transfer settings")
    }

    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading config file {path:?}"))?;
        Self::from_json(&text).with_context(|| format!("invalid config file {path:?}"))
    }
}
