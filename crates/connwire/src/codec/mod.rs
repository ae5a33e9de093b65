// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Format adapters.
//!
//! Two interchangeable strategies serialize the same [`WirePayload`]:
//!
//! | Format | Type | Content type |
//! |--------|------|--------------|
//! | binary | [`BinaryCodec`] | `application/x-connwire` |
//! | JSON | [`JsonCodec`] | `application/json` |
//!
//! The format is chosen once, when the codec is built; callers then talk to
//! it through [`PayloadCodec`]. Each codec owns a private pool of payload
//! containers.

pub mod binary;
pub mod json;

pub use binary::BinaryCodec;
pub use json::JsonCodec;

use crate::assemble::assemble_into;
use crate::network::ConnectionSnapshot;
use crate::payload::WirePayload;
use crate::pool::{PayloadPool, DEFAULT_POOL_CAPACITY};
use crate::telemetry::{CodecMetrics, Registry};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Content type of binary payloads.
pub const CONTENT_TYPE_BINARY: &str = "application/x-connwire";

/// Content type of JSON payloads.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Encode/decode strategy for one wire format.
pub trait PayloadCodec: Send + Sync {
    /// Assemble `snapshot` and serialize it.
    fn encode(&self, snapshot: &ConnectionSnapshot) -> Result<Vec<u8>>;

    /// Parse bytes produced by `encode` of the same format.
    fn decode(&self, blob: &[u8]) -> Result<WirePayload>;

    /// Fixed, non-empty content type for transport negotiation.
    fn content_type(&self) -> &'static str;
}

/// Wire format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Binary,
    Json,
}

impl Format {
    pub fn content_type(self) -> &'static str {
        match self {
            Format::Binary => CONTENT_TYPE_BINARY,
            Format::Json => CONTENT_TYPE_JSON,
        }
    }

    /// Match a content type header value; parameters such as `; charset=` are ignored.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next().unwrap_or("").trim();
        if mime.eq_ignore_ascii_case(CONTENT_TYPE_BINARY) {
            Some(Format::Binary)
        } else if mime.eq_ignore_ascii_case(CONTENT_TYPE_JSON) {
            Some(Format::Json)
        } else {
            None
        }
    }

    /// Guess which format produced `bytes`.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&binary::MAGIC) {
            return Some(Format::Binary);
        }
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => Some(Format::Json),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Binary => "binary",
            Format::Json => "json",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binary" | "bin" => Ok(Format::Binary),
            "json" => Ok(Format::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

/// Construction options shared by both codecs.
#[derive(Clone)]
pub struct CodecOptions {
    /// Idle payload containers kept for reuse.
    pub pool_capacity: usize,
    /// Reject encoded payloads larger than this.
    pub max_payload_bytes: Option<usize>,
    /// Pretty-print JSON output (ignored by the binary codec).
    pub json_pretty: bool,
    /// Registry receiving encode/decode counters.
    pub registry: Option<Arc<dyn Registry>>,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            max_payload_bytes: None,
            json_pretty: false,
            registry: None,
        }
    }
}

impl fmt::Debug for CodecOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecOptions")
            .field("pool_capacity", &self.pool_capacity)
            .field("max_payload_bytes", &self.max_payload_bytes)
            .field("json_pretty", &self.json_pretty)
            .field("registry", &self.registry.is_some())
            .finish()
    }
}

/// Build the codec for `format`.
pub fn codec(format: Format, options: CodecOptions) -> Box<dyn PayloadCodec> {
    match format {
        Format::Binary => Box::new(BinaryCodec::with_options(options)),
        Format::Json => Box::new(JsonCodec::with_options(options)),
    }
}

/// Build the codec matching a received payload's declared content type.
pub fn codec_for_content_type(content_type: &str) -> Option<Box<dyn PayloadCodec>> {
    Format::from_content_type(content_type).map(|f| codec(f, CodecOptions::default()))
}

/// State shared by both adapters: the container pool, the size limit and
/// optional metrics.
pub(crate) struct Shared {
    format: Format,
    pool: PayloadPool,
    max_payload_bytes: Option<usize>,
    metrics: Option<CodecMetrics>,
}

impl Shared {
    pub(crate) fn new(format: Format, options: &CodecOptions) -> Self {
        Self {
            format,
            pool: PayloadPool::new(options.pool_capacity),
            max_payload_bytes: options.max_payload_bytes,
            metrics: options
                .registry
                .clone()
                .map(|registry| CodecMetrics::new(registry, format)),
        }
    }

    /// Check out a container, assemble `snapshot` into it and serialize it.
    /// The container goes back to the pool before this returns.
    pub(crate) fn encode_with<F>(&self, snapshot: &ConnectionSnapshot, serialize: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&WirePayload) -> Result<Vec<u8>>,
    {
        let result = {
            let mut payload = self.pool.acquire();
            assemble_into(snapshot, &mut payload).and_then(|()| serialize(&*payload))
        };
        let result = result.and_then(|bytes| self.check_size(bytes));

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(bytes) => metrics.encoded(bytes.len()),
                Err(_) => metrics.encode_failed(),
            }
        }
        result
    }

    /// Reject bytes produced by the other adapter before parsing them.
    pub(crate) fn decode_with<F>(&self, blob: &[u8], parse: F) -> Result<WirePayload>
    where
        F: FnOnce(&[u8]) -> Result<WirePayload>,
    {
        let result = match Format::sniff(blob) {
            Some(found) if found != self.format => Err(Error::FormatMismatch {
                expected: self.format,
                found,
            }),
            _ => parse(blob).and_then(|payload| {
                payload.validate()?;
                Ok(payload)
            }),
        };

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(_) => metrics.decoded(),
                Err(_) => metrics.decode_failed(),
            }
        }
        result
    }

    fn check_size(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        match self.max_payload_bytes {
            Some(limit) if bytes.len() > limit => Err(Error::PayloadTooLarge {
                size: bytes.len(),
                limit,
            }),
            _ => Ok(bytes),
        }
    }

    pub(crate) fn pool_stats(&self) -> crate::pool::PoolStats {
        self.pool.stats()
    }
}
