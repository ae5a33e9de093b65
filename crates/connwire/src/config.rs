// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Encoder configuration.
//!
//! Supports both programmatic and file-based configuration:
//!
//! ```toml
//! format = "json"
//! pool_capacity = 32
//! max_payload_bytes = 4194304
//! json_pretty = false
//! enable_metrics = true
//! ```

use crate::codec::{codec, CodecOptions, Format, PayloadCodec};
use crate::pool::DEFAULT_POOL_CAPACITY;
use crate::telemetry::Registry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Encoder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncoderConfig {
    /// Wire format of produced payloads.
    #[serde(default)]
    pub format: Format,

    /// Idle payload containers kept for reuse.
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// Reject encoded payloads larger than this many bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload_bytes: Option<usize>,

    /// Pretty-print JSON output.
    #[serde(default)]
    pub json_pretty: bool,

    /// Report encode/decode counters to the registry passed to `build_codec`.
    #[serde(default)]
    pub enable_metrics: bool,
}

fn default_pool_capacity() -> usize {
    DEFAULT_POOL_CAPACITY
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            format: Format::default(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
            max_payload_bytes: None,
            json_pretty: false,
            enable_metrics: false,
        }
    }
}

impl EncoderConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_capacity == 0 {
            return Err(ConfigError::Invalid(
                "pool_capacity must be at least 1".into(),
            ));
        }
        if self.max_payload_bytes == Some(0) {
            return Err(ConfigError::Invalid(
                "max_payload_bytes must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Codec options for this configuration. The registry is attached only
    /// when `enable_metrics` is set.
    pub fn codec_options(&self, registry: Option<Arc<dyn Registry>>) -> CodecOptions {
        CodecOptions {
            pool_capacity: self.pool_capacity,
            max_payload_bytes: self.max_payload_bytes,
            json_pretty: self.json_pretty,
            registry: registry.filter(|_| self.enable_metrics),
        }
    }

    /// Validate, then build the configured codec.
    pub fn build_codec(
        &self,
        registry: Option<Arc<dyn Registry>>,
    ) -> Result<Box<dyn PayloadCodec>, ConfigError> {
        self.validate()?;
        Ok(codec(self.format, self.codec_options(registry)))
    }
}
