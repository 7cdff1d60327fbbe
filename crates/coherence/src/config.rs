//! Configuration for the coherence simulator.
//!
//! This module defines the configuration structure used to parameterize a run. It provides:
//! 1. **Defaults:** Baseline system shape (protocol, number of caches).
//! 2. **Structures:** The root [`Config`], deserialized from JSON.
//! 3. **Enums:** How protocol violations are handled.
//!
//! Configuration is supplied as JSON (`--config` on the CLI), or use `Config::default()`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::protocol::ProtocolKind;

/// Default configuration constants for the simulator.
mod defaults {
    /// Number of private caches on the bus.
    pub const NUM_CACHES: usize = 4;
}

/// What the driver does when a line's state machine rejects a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ViolationPolicy {
    /// Stop the run and report the violation.
    ///
    /// A violation means the driver produced an illegal interleaving or the protocol
    /// tables are wrong, so nothing later in the run can be trusted.
    #[default]
    #[serde(alias = "abort")]
    Abort,
    /// Record the violation, leave the line unchanged, and keep simulating.
    #[serde(alias = "collect")]
    Collect,
}

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration is not valid JSON for [`Config`].
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    /// A field holds a value the simulator cannot run with.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// Why the value is rejected.
        reason: String,
    },
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// ```
/// use cohsim_core::config::{Config, ViolationPolicy};
/// use cohsim_core::protocol::ProtocolKind;
///
/// let config = Config::from_json_str(r#"{ "protocol": "MSI", "num_caches": 2 }"#).unwrap();
/// assert_eq!(config.protocol, ProtocolKind::Msi);
/// assert_eq!(config.num_caches, 2);
/// assert_eq!(config.violation_policy, ViolationPolicy::Abort);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Coherence protocol every cache runs.
    #[serde(default)]
    pub protocol: ProtocolKind,

    /// Number of private caches (and processors) on the bus.
    #[serde(default = "Config::default_num_caches")]
    pub num_caches: usize,

    /// Handling of protocol violations.
    #[serde(default)]
    pub violation_policy: ViolationPolicy,

    /// Verify the single-writer/multiple-reader invariant after every bus transaction.
    #[serde(default)]
    pub check_invariants: bool,

    /// Upper bound on simulated cycles; `None` runs until every trace drains.
    #[serde(default)]
    pub max_cycles: Option<u64>,
}

impl Config {
    /// Returns the default number of caches.
    const fn default_num_caches() -> usize {
        defaults::NUM_CACHES
    }

    /// Parses and validates a JSON configuration.
    ///
    /// Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Checks that the configuration describes a runnable system.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_caches == 0 {
            return Err(ConfigError::Invalid {
                field: "num_caches",
                reason: "at least one cache is required".to_string(),
            });
        }
        if self.max_cycles == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_cycles",
                reason: "the cycle bound must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol: ProtocolKind::default(),
            num_caches: defaults::NUM_CACHES,
            violation_policy: ViolationPolicy::default(),
            check_invariants: false,
            max_cycles: None,
        }
    }
}
