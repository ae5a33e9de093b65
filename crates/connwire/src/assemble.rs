// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Builds the top-level wire message from a snapshot.
//!
//! The HTTP key table must exist before any connection is formatted, so the
//! steps run in a fixed order:
//!
//! 1. enumerate the HTTP map into an [`HttpKeyTable`]
//! 2. format connections in list order, interning domains
//! 3. export the domain table
//! 4. export the HTTP key table
//! 5. attach DNS, HTTP and telemetry sub-messages

use crate::format::{format_connection, format_dns_into, format_http_into, format_telemetry};
use crate::intern::{DomainTable, HttpKeyTable};
use crate::network::ConnectionSnapshot;
use crate::payload::WirePayload;
use crate::Result;

/// Assemble a fresh payload for `snapshot`.
pub fn assemble(snapshot: &ConnectionSnapshot) -> Result<WirePayload> {
    let mut payload = WirePayload::default();
    assemble_into(snapshot, &mut payload)?;
    Ok(payload)
}

/// Assemble into an existing container, replacing whatever it held.
pub fn assemble_into(snapshot: &ConnectionSnapshot, payload: &mut WirePayload) -> Result<()> {
    payload.clear();

    let http_keys = HttpKeyTable::from_keys(snapshot.http.keys());
    let mut domains = DomainTable::new();

    payload.connections.reserve(snapshot.conns.len());
    for conn in &snapshot.conns {
        let wire = format_connection(conn, &mut domains, &http_keys);
        payload.connections.push(wire);
    }

    domains.export_into(&mut payload.domains);
    http_keys.export_into(&mut payload.http_keys);

    format_dns_into(&snapshot.dns, &mut payload.dns);
    format_http_into(&snapshot.http, &http_keys, &mut payload.http_stats)?;
    payload.telemetry = format_telemetry(&snapshot.telemetry);

    Ok(())
}
