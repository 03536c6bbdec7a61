//! Configuration: loading and validating `recrop.toml`.
//!
//! One flat file, constructed once at process start and passed by
//! reference into the codec, storage manager, and facade — there is no
//! global accessor.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! src_dir = "public/uploads"    # Where source images live
//! crops_dir = "public/uploads"  # Where generated crops are written
//! max_crops = 12                # Per-source crop cap (omit for unlimited)
//! quality = 90                  # Encoding quality when no q token is given
//!
//! # url_prefix = "/uploads/"    # Stripped from incoming URLs
//! # signing_key = "..."         # Enables the pluggable request verifier
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Runtime configuration. All fields have sensible defaults; config files
/// need only override what they want.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory (or mount) holding original images.
    pub src_dir: String,
    /// Directory (or mount) where crops are written. May equal `src_dir`.
    pub crops_dir: String,
    /// URL prefix stripped when resolving public URLs to store paths.
    pub url_prefix: Option<String>,
    /// Maximum distinct crops per source. `None` disables the cap.
    pub max_crops: Option<usize>,
    /// Default encoding quality for crops without an explicit `q` token.
    pub quality: u8,
    /// Optional secret for request verification. Setting it without also
    /// wiring a verifier has no effect.
    pub signing_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            src_dir: "public/uploads".to_string(),
            crops_dir: "public/uploads".to_string(),
            url_prefix: None,
            max_crops: Some(12),
            quality: 90,
            signing_key: None,
        }
    }
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.src_dir.is_empty() {
            return Err(ConfigError::Validation("src_dir must not be empty".into()));
        }
        if self.crops_dir.is_empty() {
            return Err(ConfigError::Validation(
                "crops_dir must not be empty".into(),
            ));
        }
        if self.quality > 100 {
            return Err(ConfigError::Validation("quality must be 0-100".into()));
        }
        if self.max_crops == Some(0) {
            return Err(ConfigError::Validation(
                "max_crops must be positive; omit it to disable the cap".into(),
            ));
        }
        Ok(())
    }
}
