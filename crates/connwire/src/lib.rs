// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! connwire - network connection snapshot encoder
//!
//! Turns an in-memory snapshot of tracked connections (per-connection
//! counters, HTTP statistics keyed by flow, DNS statistics, tracer
//! telemetry) into a compact wire message, and back:
//!
//! ```text
//! ConnectionSnapshot
//!        |
//!        v
//!   assemble_into  -- DomainTable (domain -> id, first-seen order)
//!        |         -- HttpKeyTable (flow key -> id, enumeration order)
//!        v
//!   WirePayload (pooled container)
//!        |
//!        +--> BinaryCodec   application/x-connwire
//!        +--> JsonCodec     application/json
//! ```
//!
//! Repeated domain strings and HTTP flow keys are stored once per payload
//! and referenced from connections by index.
//!
//! # Quick Start
//!
//! ```no_run
//! use connwire::{codec, CodecOptions, ConnectionSnapshot, Format};
//!
//! let encoder = codec(Format::Binary, CodecOptions::default());
//! let bytes = encoder.encode(&ConnectionSnapshot::default())?;
//! let payload = encoder.decode(&bytes)?;
//! assert!(payload.connections.is_empty());
//! # Ok::<(), connwire::Error>(())
//! ```

pub mod assemble;
pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod intern;
pub mod launcher;
pub mod network;
pub mod payload;
pub mod telemetry;

mod pool;

pub use assemble::{assemble, assemble_into};
pub use codec::{
    codec, codec_for_content_type, BinaryCodec, CodecOptions, Format, JsonCodec, PayloadCodec,
    CONTENT_TYPE_BINARY, CONTENT_TYPE_JSON,
};
pub use config::{ConfigError, EncoderConfig};
pub use error::Error;
pub use intern::{DomainTable, HttpKeyTable};
pub use network::{
    AddressFamily, ConnectionSnapshot, ConnectionStats, ConnectionType, ConnectionsTelemetry,
    Direction, DnsStats, HttpKey, HttpStats, RequestStats,
};
pub use payload::WirePayload;
pub use pool::{PoolStats, DEFAULT_POOL_CAPACITY};
pub use telemetry::{MemoryRegistry, Registry};

/// Result type for encoder operations.
pub type Result<T> = std::result::Result<T, Error>;
