// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON payload format.
//!
//! Field names are the snake_case names of the [`WirePayload`] types.
//! Unknown fields are rejected on decode. Absent optional ids are omitted.

use super::{CodecOptions, Format, PayloadCodec, Shared, CONTENT_TYPE_JSON};
use crate::network::ConnectionSnapshot;
use crate::payload::WirePayload;
use crate::pool::PoolStats;
use crate::{Error, Result};

/// JSON adapter.
pub struct JsonCodec {
    shared: Shared,
    pretty: bool,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::with_options(CodecOptions::default())
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            pretty: options.json_pretty,
            shared: Shared::new(Format::Json, &options),
        }
    }

    /// Counters of the codec's payload pool.
    pub fn pool_stats(&self) -> PoolStats {
        self.shared.pool_stats()
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadCodec for JsonCodec {
    fn encode(&self, snapshot: &ConnectionSnapshot) -> Result<Vec<u8>> {
        let pretty = self.pretty;
        self.shared.encode_with(snapshot, |payload| {
            let bytes = if pretty {
                serde_json::to_vec_pretty(payload)?
            } else {
                serde_json::to_vec(payload)?
            };
            Ok(bytes)
        })
    }

    fn decode(&self, blob: &[u8]) -> Result<WirePayload> {
        self.shared.decode_with(blob, |bytes| {
            serde_json::from_slice(bytes).map_err(|e| Error::InvalidFormat(e.to_string()))
        })
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_JSON
    }
}
