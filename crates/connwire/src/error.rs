// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Encoder errors.

use crate::codec::Format;
use std::io;
use thiserror::Error;

/// Errors returned by assembly, encoding and decoding.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bytes were produced by the other adapter.
    #[error("format mismatch: expected {expected} payload, found {found}")]
    FormatMismatch { expected: Format, found: Format },

    #[error("invalid payload: {0}")]
    InvalidFormat(String),

    #[error("version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    #[error("CRC mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch { expected: u32, computed: u32 },

    /// A list or string does not fit the 32-bit length prefix.
    #[error("{field} too large to encode ({len} entries)")]
    TooLarge { field: &'static str, len: usize },

    #[error("encoded payload is {size} bytes, limit is {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Formatters were invoked against tables built from another snapshot.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// True for faults raised while parsing bytes.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Error::FormatMismatch { .. }
                | Error::InvalidFormat(_)
                | Error::VersionMismatch { .. }
                | Error::CrcMismatch { .. }
        )
    }
}
