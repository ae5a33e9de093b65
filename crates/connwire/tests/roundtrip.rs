// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters
#![allow(clippy::too_many_lines)] // Test code

//! Integration tests for encode/decode through both adapters.
//!
//! # Test Coverage
//!
//! - Round trip per adapter, and both adapters agreeing on the decoded payload
//! - Domain deduplication and first-seen ordering
//! - HTTP key/stats index alignment under shuffled key enumeration
//! - Empty snapshots
//! - Cross-format rejection in both directions
//! - Encode faults returning the pooled container

mod common;

use common::{example_snapshot, flow_key, mixed_snapshot};
use connwire::format::format_http;
use connwire::{
    assemble, codec, BinaryCodec, CodecOptions, ConnectionSnapshot, Error, Format, HttpKeyTable,
    JsonCodec, PayloadCodec, WirePayload,
};

fn roundtrip(codec: &dyn PayloadCodec, snapshot: &ConnectionSnapshot) -> WirePayload {
    let bytes = codec.encode(snapshot).expect("encode");
    codec.decode(&bytes).expect("decode")
}

/// Every connection resolves to its own domain and to the stats of its flow.
fn assert_references_resolve(snapshot: &ConnectionSnapshot, payload: &WirePayload) {
    assert_eq!(payload.connections.len(), snapshot.conns.len());
    assert_eq!(payload.http_keys.len(), payload.http_stats.len());

    for (conn, wire) in snapshot.conns.iter().zip(&payload.connections) {
        assert_eq!(wire.laddr.ip, conn.source.to_string());
        assert_eq!(wire.laddr.port, i32::from(conn.sport));
        assert_eq!(payload.domain_of(wire), conn.domain.as_deref());

        match snapshot.http.get(&conn.http_key()) {
            Some(stats) => {
                let (key, wire_stats) = payload.http_of(wire).expect("http reference");
                assert_eq!(key.source.ip, conn.source.to_string());
                assert_eq!(key.dest.ip, conn.dest.to_string());
                assert_eq!(key.dest.port, i32::from(conn.dport));
                assert_eq!(wire_stats.count, stats.total_count());
            }
            None => assert_eq!(wire.http_key_idx, None),
        }
    }
}

#[test]
fn test_example_snapshot_both_formats() {
    let snapshot = example_snapshot();

    for format in [Format::Binary, Format::Json] {
        let codec = codec(format, CodecOptions::default());
        let payload = roundtrip(codec.as_ref(), &snapshot);

        assert_eq!(payload.domains, vec!["example.com"], "{format}");
        assert_eq!(payload.connections[0].domain_idx, Some(0));
        assert_eq!(payload.connections[1].domain_idx, Some(0));

        assert_eq!(payload.http_keys.len(), 1);
        assert_eq!(payload.http_keys[0].source.ip, "10.0.0.1");
        assert_eq!(payload.http_keys[0].source.port, 0);
        assert_eq!(payload.http_keys[0].dest.ip, "10.0.0.2");
        assert_eq!(payload.http_keys[0].dest.port, 80);
        assert_eq!(payload.http_stats[0].count, 5);
        assert!(payload
            .connections
            .iter()
            .all(|c| c.http_key_idx == Some(0)));

        let classes: Vec<(u32, u32)> = payload.http_stats[0]
            .stats_by_status_class
            .iter()
            .map(|s| (s.status_class, s.count))
            .collect();
        assert_eq!(classes, vec![(200, 4), (500, 1)]);

        assert_eq!(payload.dns.successful_responses, 7);
        assert_eq!(payload.dns.entries[0].names, vec!["example.com"]);
        assert_eq!(payload.telemetry.monotonic_conns_closed, 3);
    }
}

#[test]
fn test_formats_decode_to_same_payload() {
    let snapshot = mixed_snapshot(60, 9);
    let expected = assemble(&snapshot).expect("assemble");

    let binary = roundtrip(&BinaryCodec::new(), &snapshot);
    let json = roundtrip(&JsonCodec::new(), &snapshot);

    assert_eq!(binary, expected);
    assert_eq!(json, expected);
    assert_references_resolve(&snapshot, &binary);
}

#[test]
fn test_domains_deduplicated_in_first_seen_order() {
    let snapshot = mixed_snapshot(40, 3);
    let payload = roundtrip(&BinaryCodec::new(), &snapshot);

    let mut seen = Vec::new();
    for conn in &snapshot.conns {
        if let Some(domain) = &conn.domain {
            if !seen.contains(domain) {
                seen.push(domain.clone());
            }
        }
    }
    assert_eq!(payload.domains, seen);

    for (conn, wire) in snapshot.conns.iter().zip(&payload.connections) {
        assert_eq!(conn.domain.is_none(), wire.domain_idx.is_none());
    }
}

#[test]
fn test_http_index_alignment_under_shuffled_keys() {
    let snapshot = mixed_snapshot(30, 25);
    let mut rng = fastrand::Rng::with_seed(0x5eed);

    for _ in 0..20 {
        let mut keys: Vec<_> = snapshot.http.keys().collect();
        rng.shuffle(&mut keys);

        let table = HttpKeyTable::from_keys(keys.iter().copied());
        let stats = format_http(&snapshot.http, &table).expect("format_http");

        assert_eq!(stats.len(), table.len());
        for (id, key) in table.keys().enumerate() {
            assert_eq!(table.get(key), Some(id as u32));
            assert_eq!(stats[id].count, snapshot.http[key].total_count());
        }
    }
}

#[test]
fn test_http_table_from_other_map_is_rejected() {
    let snapshot = mixed_snapshot(10, 4);
    let other = mixed_snapshot(10, 5);

    let table = HttpKeyTable::from_keys(other.http.keys());
    let err = format_http(&snapshot.http, &table).expect_err("size mismatch");
    assert!(matches!(err, Error::InvariantViolation(_)));

    let unrelated = [flow_key(100), flow_key(101), flow_key(102), flow_key(103)];
    let table = HttpKeyTable::from_keys(unrelated.iter());
    let err = format_http(&snapshot.http, &table).expect_err("missing key");
    assert!(matches!(err, Error::InvariantViolation(_)));
}

#[test]
fn test_empty_snapshot() {
    let snapshot = ConnectionSnapshot::default();
    for format in [Format::Binary, Format::Json] {
        let codec = codec(format, CodecOptions::default());
        let payload = roundtrip(codec.as_ref(), &snapshot);
        assert!(payload.is_empty(), "{format}");
    }
}

#[test]
fn test_cross_format_rejected() {
    let snapshot = example_snapshot();
    let binary = BinaryCodec::new();
    let json = JsonCodec::new();

    let binary_bytes = binary.encode(&snapshot).expect("encode binary");
    let json_bytes = json.encode(&snapshot).expect("encode json");

    let err = json.decode(&binary_bytes).expect_err("binary into json");
    assert!(matches!(
        err,
        Error::FormatMismatch {
            expected: Format::Json,
            found: Format::Binary
        }
    ));

    let err = binary.decode(&json_bytes).expect_err("json into binary");
    assert!(matches!(
        err,
        Error::FormatMismatch {
            expected: Format::Binary,
            found: Format::Json
        }
    ));
}

#[test]
fn test_encode_fault_returns_container() {
    let snapshot = mixed_snapshot(50, 5);
    let options = CodecOptions {
        max_payload_bytes: Some(1024),
        ..Default::default()
    };

    let binary = BinaryCodec::with_options(options.clone());
    let json = JsonCodec::with_options(options);

    for _ in 0..3 {
        let err = binary.encode(&snapshot).expect_err("too large");
        assert!(matches!(err, Error::PayloadTooLarge { limit: 1024, .. }));
        let err = json.encode(&snapshot).expect_err("too large");
        assert!(matches!(err, Error::PayloadTooLarge { limit: 1024, .. }));
    }

    for stats in [binary.pool_stats(), json.pool_stats()] {
        assert_eq!(stats.outstanding(), 0);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.idle, 1);
    }

    // The same codec still encodes small snapshots after a fault.
    let bytes = binary
        .encode(&ConnectionSnapshot::default())
        .expect("small payload");
    assert!(binary.decode(&bytes).expect("decode").is_empty());
}

#[test]
fn test_sequential_encodes_do_not_leak_entries() {
    let codec = BinaryCodec::new();
    let big = mixed_snapshot(80, 10);
    let small = example_snapshot();

    let _ = codec.encode(&big).expect("encode big");
    let payload = roundtrip(&codec, &small);
    assert_eq!(payload, assemble(&small).expect("assemble"));
    assert_eq!(payload.domains.len(), 1);
    assert!(codec.pool_stats().hits >= 1);
}
