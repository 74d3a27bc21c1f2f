#![forbid(unsafe_code)]

//! Viewer tuning as data.
//!
//! ```toml
//! # sliceview.toml
//! limit_before = 40
//! limit_after = 40
//! monotonic = true
//! ```
//!
//! ```rust,ignore
//! let config = ViewerConfig::from_toml_file("sliceview.toml")?;
//! let config = ViewerConfig::from_json_str(json)?;
//! ```
//!
//! Missing fields keep their defaults. Loading from files requires the
//! `config-files` feature.

#[cfg(feature = "config-files")]
use std::path::Path;

#[cfg(feature = "config-files")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Window sizes and delivery policy for viewers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-files", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-files", serde(default))]
pub struct ViewerConfig {
    /// Ids requested older than the anchor.
    pub limit_before: usize,

    /// Ids requested newer than the anchor (the anchor itself is extra).
    pub limit_after: usize,

    /// Window of the ending slice used to find the newest message.
    pub ending_limit_before: usize,
    pub ending_limit_after: usize,

    /// Withhold snapshots that turn a known count back into unknown.
    pub monotonic: bool,

    /// Send load requests for short windows to the context's requester.
    pub request_loads: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            limit_before: 20,
            limit_after: 20,
            ending_limit_before: 1,
            ending_limit_after: 1,
            monotonic: true,
            request_loads: true,
        }
    }
}

impl ViewerConfig {
    #[must_use]
    pub fn with_limits(limit_before: usize, limit_after: usize) -> Self {
        Self {
            limit_before,
            limit_after,
            ..Self::default()
        }
    }

    #[cfg(feature = "config-files")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str::<Self>(s)?.validated()
    }

    #[cfg(feature = "config-files")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    #[cfg(feature = "config-files")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<Self>(s)?.validated()
    }

    #[cfg(feature = "config-files")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Every violated constraint; empty when the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.limit_before == 0 && self.limit_after == 0 {
            errors.push("limit_before and limit_after cannot both be 0".into());
        }
        if self.ending_limit_before == 0 && self.ending_limit_after == 0 {
            errors.push("ending_limit_before and ending_limit_after cannot both be 0".into());
        }
        errors
    }

    /// `self` if valid, otherwise [`ConfigError::Validation`].
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Failures while loading a [`ViewerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "config-files")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[cfg(feature = "config-files")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}
