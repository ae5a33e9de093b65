// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire schema shared by the binary and JSON adapters.
//!
//! ```text
//! WirePayload
//!   connections[]  -> domain_idx   -> domains[]
//!                  -> http_key_idx -> http_keys[]
//!   http_keys[i]  <-> http_stats[i]
//!   dns
//!   telemetry
//! ```
//!
//! `domains` and `http_keys` are dense zero-based tables addressed by the ids
//! embedded in `connections`. The ids are assigned per encode call and carry
//! no meaning across payloads.

use crate::network::{AddressFamily, ConnectionType, Direction};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Address as rendered on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireAddr {
    pub ip: String,
    pub port: i32,
}

/// One connection, with its domain and HTTP flow replaced by table ids.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireConnection {
    pub pid: u32,
    pub laddr: WireAddr,
    pub raddr: WireAddr,
    pub family: AddressFamily,
    pub conn_type: ConnectionType,
    pub direction: Direction,
    pub net_ns: u32,

    pub monotonic_sent_bytes: u64,
    pub last_sent_bytes: u64,
    pub monotonic_recv_bytes: u64,
    pub last_recv_bytes: u64,
    pub monotonic_sent_packets: u64,
    pub last_sent_packets: u64,
    pub monotonic_recv_packets: u64,
    pub last_recv_packets: u64,
    pub monotonic_retransmits: u32,
    pub last_retransmits: u32,

    pub rtt: u32,
    pub rtt_var: u32,
    pub last_tcp_established: u32,
    pub last_tcp_closed: u32,

    pub dns_successful_responses: u32,
    pub dns_failed_responses: u32,
    pub dns_timeouts: u32,
    pub dns_success_latency_sum: u64,
    pub dns_failure_latency_sum: u64,
    pub dns_count_by_rcode: BTreeMap<u32, u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_idx: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_key_idx: Option<u32>,
}

/// HTTP flow key: source address (port 0) and destination address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireHttpKey {
    pub source: WireAddr,
    pub dest: WireAddr,
}

/// Request statistics for one non-empty status class.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireRequestStats {
    /// 100, 200, 300, 400 or 500.
    pub status_class: u32,
    pub count: u32,
    pub latency_sum_ns: u64,
    pub first_latency_sample_ns: u64,
}

/// HTTP statistics for the key at the same index in `http_keys`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireHttpStats {
    pub count: u64,
    pub stats_by_status_class: Vec<WireRequestStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireDnsEntry {
    pub ip: String,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireDns {
    pub successful_responses: u64,
    pub failed_responses: u64,
    pub timeouts: u64,
    pub success_latency_sum_us: u64,
    pub failure_latency_sum_us: u64,
    pub packets_processed: u64,
    pub entries: Vec<WireDnsEntry>,
}

impl WireDns {
    fn clear(&mut self) {
        let mut entries = std::mem::take(&mut self.entries);
        entries.clear();
        *self = Self {
            entries,
            ..Self::default()
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireTelemetry {
    pub monotonic_kprobes_triggered: u64,
    pub monotonic_kprobes_missed: u64,
    pub monotonic_conntrack_registers: u64,
    pub monotonic_conntrack_registers_dropped: u64,
    pub monotonic_dns_packets_processed: u64,
    pub monotonic_conns_closed: u64,
    pub conns_dropped: u64,
    pub dns_stats_dropped: u64,
    pub http_requests_dropped: u64,
    pub http_requests_missed: u64,
    pub monotonic_udp_sends_processed: u64,
    pub monotonic_udp_sends_missed: u64,
    pub tcp_sent_miscounts: u64,
    pub missed_tcp_close: u64,
    pub missed_udp_close: u64,
}

/// Top-level wire message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WirePayload {
    pub connections: Vec<WireConnection>,
    pub domains: Vec<String>,
    pub http_keys: Vec<WireHttpKey>,
    pub http_stats: Vec<WireHttpStats>,
    pub dns: WireDns,
    pub telemetry: WireTelemetry,
}

impl WirePayload {
    /// Reset every field while keeping the allocated list capacity.
    pub fn clear(&mut self) {
        self.connections.clear();
        self.domains.clear();
        self.http_keys.clear();
        self.http_stats.clear();
        self.dns.clear();
        self.telemetry = WireTelemetry::default();
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
            && self.domains.is_empty()
            && self.http_keys.is_empty()
            && self.http_stats.is_empty()
            && self.dns == WireDns::default()
            && self.telemetry == WireTelemetry::default()
    }

    /// Check that every table id points inside its table and that each HTTP
    /// key has exactly one stats entry.
    pub fn validate(&self) -> Result<()> {
        if self.http_keys.len() != self.http_stats.len() {
            return Err(Error::InvalidFormat(format!(
                "{} http keys but {} http stats entries",
                self.http_keys.len(),
                self.http_stats.len()
            )));
        }
        for (pos, conn) in self.connections.iter().enumerate() {
            if let Some(idx) = conn.domain_idx {
                if idx as usize >= self.domains.len() {
                    return Err(Error::InvalidFormat(format!(
                        "connection {pos}: domain id {idx} out of range ({} domains)",
                        self.domains.len()
                    )));
                }
            }
            if let Some(idx) = conn.http_key_idx {
                if idx as usize >= self.http_keys.len() {
                    return Err(Error::InvalidFormat(format!(
                        "connection {pos}: http key id {idx} out of range ({} keys)",
                        self.http_keys.len()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Domain string referenced by a connection, if any.
    pub fn domain_of(&self, conn: &WireConnection) -> Option<&str> {
        conn.domain_idx
            .and_then(|idx| self.domains.get(idx as usize))
            .map(String::as_str)
    }

    /// HTTP key and stats referenced by a connection, if any.
    pub fn http_of(&self, conn: &WireConnection) -> Option<(&WireHttpKey, &WireHttpStats)> {
        let idx = conn.http_key_idx? as usize;
        Some((self.http_keys.get(idx)?, self.http_stats.get(idx)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WirePayload {
        WirePayload {
            connections: vec![WireConnection {
                pid: 7,
                domain_idx: Some(0),
                http_key_idx: Some(0),
                ..Default::default()
            }],
            domains: vec!["example.com".into()],
            http_keys: vec![WireHttpKey {
                source: WireAddr {
                    ip: "10.0.0.1".into(),
                    port: 0,
                },
                dest: WireAddr {
                    ip: "10.0.0.2".into(),
                    port: 80,
                },
            }],
            http_stats: vec![WireHttpStats {
                count: 5,
                stats_by_status_class: Vec::new(),
            }],
            dns: WireDns {
                timeouts: 3,
                entries: vec![WireDnsEntry {
                    ip: "10.0.0.2".into(),
                    names: vec!["example.com".into()],
                }],
                ..Default::default()
            },
            telemetry: WireTelemetry {
                conns_dropped: 4,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_clear_resets_all_fields_and_keeps_capacity() {
        let mut payload = sample();
        payload.clear();

        assert!(payload.is_empty());
        assert_eq!(payload, WirePayload::default());
        assert!(payload.connections.capacity() >= 1);
        assert!(payload.dns.entries.capacity() >= 1);
    }

    #[test]
    fn test_back_references_resolve() {
        let payload = sample();
        let conn = &payload.connections[0];
        assert_eq!(payload.domain_of(conn), Some("example.com"));
        let (key, stats) = payload.http_of(conn).expect("http entry");
        assert_eq!(key.dest.port, 80);
        assert_eq!(stats.count, 5);

        let orphan = WireConnection::default();
        assert_eq!(payload.domain_of(&orphan), None);
        assert!(payload.http_of(&orphan).is_none());
    }

    #[test]
    fn test_absent_ids_are_omitted_from_json() {
        let json = serde_json::to_string(&WireConnection::default()).expect("serialize");
        assert!(!json.contains("domain_idx"));
        assert!(!json.contains("http_key_idx"));
    }

    #[test]
    fn test_validate_accepts_consistent_payload() {
        sample().validate().expect("valid");
        WirePayload::default().validate().expect("empty is valid");
    }

    #[test]
    fn test_validate_rejects_dangling_ids() {
        let mut payload = sample();
        payload.connections[0].domain_idx = Some(1);
        let err = payload.validate().expect_err("domain id");
        assert!(matches!(err, Error::InvalidFormat(ref msg) if msg.contains("domain id 1")));

        let mut payload = sample();
        payload.connections[0].http_key_idx = Some(4);
        let err = payload.validate().expect_err("http key id");
        assert!(matches!(err, Error::InvalidFormat(ref msg) if msg.contains("http key id 4")));

        let mut payload = sample();
        payload.http_stats.clear();
        let err = payload.validate().expect_err("stats length");
        assert!(matches!(err, Error::InvalidFormat(_)));
    }
}
