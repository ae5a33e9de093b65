// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory connection snapshot handed to the encoder.
//!
//! The snapshot is produced by the network tracer and is read-only from the
//! encoder's point of view. Everything here derives serde so tools can load
//! snapshots from JSON files.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

/// Number of HTTP status classes tracked (1xx..5xx).
pub const NUM_STATUS_CLASSES: usize = 5;

/// Transport protocol of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    #[default]
    Tcp,
    Udp,
}

/// IP address family of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    V4,
    V6,
}

impl AddressFamily {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }
}

/// Connection direction relative to the monitored host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Unknown,
    Incoming,
    Outgoing,
    Local,
}

/// One network connection observed by the tracer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionStats {
    pub pid: u32,
    pub source: IpAddr,
    pub dest: IpAddr,
    pub sport: u16,
    pub dport: u16,
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

    /// Smoothed round trip time (us).
    pub rtt: u32,
    /// Round trip time variance (us).
    pub rtt_var: u32,
    pub last_tcp_established: u32,
    pub last_tcp_closed: u32,

    pub dns_successful_responses: u32,
    pub dns_failed_responses: u32,
    pub dns_timeouts: u32,
    pub dns_success_latency_sum: u64,
    pub dns_failure_latency_sum: u64,
    pub dns_count_by_rcode: BTreeMap<u32, u32>,

    /// Remote domain resolved for `dest`, if any.
    pub domain: Option<String>,
}

impl Default for ConnectionStats {
    fn default() -> Self {
        let unspecified = IpAddr::from([0, 0, 0, 0]);
        Self {
            pid: 0,
            source: unspecified,
            dest: unspecified,
            sport: 0,
            dport: 0,
            family: AddressFamily::V4,
            conn_type: ConnectionType::Tcp,
            direction: Direction::Unknown,
            net_ns: 0,
            monotonic_sent_bytes: 0,
            last_sent_bytes: 0,
            monotonic_recv_bytes: 0,
            last_recv_bytes: 0,
            monotonic_sent_packets: 0,
            last_sent_packets: 0,
            monotonic_recv_packets: 0,
            last_recv_packets: 0,
            monotonic_retransmits: 0,
            last_retransmits: 0,
            rtt: 0,
            rtt_var: 0,
            last_tcp_established: 0,
            last_tcp_closed: 0,
            dns_successful_responses: 0,
            dns_failed_responses: 0,
            dns_timeouts: 0,
            dns_success_latency_sum: 0,
            dns_failure_latency_sum: 0,
            dns_count_by_rcode: BTreeMap::new(),
            domain: None,
        }
    }
}

impl ConnectionStats {
    /// Create a connection between two endpoints; the family follows `source`.
    pub fn new(source: IpAddr, sport: u16, dest: IpAddr, dport: u16) -> Self {
        Self {
            source,
            dest,
            sport,
            dport,
            family: AddressFamily::of(&source),
            ..Default::default()
        }
    }

    /// Flow key under which HTTP stats for this connection are aggregated.
    pub fn http_key(&self) -> HttpKey {
        HttpKey::new(self.source, self.dest, self.dport)
    }
}

/// Client to server HTTP flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HttpKey {
    pub source_ip: IpAddr,
    pub dest_ip: IpAddr,
    pub dest_port: u16,
}

impl HttpKey {
    pub fn new(source_ip: IpAddr, dest_ip: IpAddr, dest_port: u16) -> Self {
        Self {
            source_ip,
            dest_ip,
            dest_port,
        }
    }
}

/// Request statistics for one status class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestStats {
    pub count: u32,
    pub latency_sum_ns: u64,
    /// Latency of the first request seen, kept so single requests carry a value.
    pub first_latency_sample_ns: u64,
}

/// HTTP statistics for one flow, indexed by status class (0 => 1xx).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpStats {
    pub by_status_class: [RequestStats; NUM_STATUS_CLASSES],
}

impl HttpStats {
    /// Record one request. Status codes outside 100..=599 are ignored.
    pub fn add_request(&mut self, status_code: u16, latency_ns: u64) {
        let Some(idx) = status_class_index(status_code) else {
            return;
        };
        let stats = &mut self.by_status_class[idx];
        if stats.count == 0 {
            stats.first_latency_sample_ns = latency_ns;
        }
        stats.count = stats.count.saturating_add(1);
        stats.latency_sum_ns = stats.latency_sum_ns.saturating_add(latency_ns);
    }

    /// Requests across all status classes.
    pub fn total_count(&self) -> u64 {
        self.by_status_class
            .iter()
            .map(|s| u64::from(s.count))
            .sum()
    }
}

fn status_class_index(status_code: u16) -> Option<usize> {
    match status_code {
        100..=599 => Some(usize::from(status_code / 100 - 1)),
        _ => None,
    }
}

/// Aggregated DNS counters plus the reverse-DNS table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsStats {
    pub successful_responses: u64,
    pub failed_responses: u64,
    pub timeouts: u64,
    pub success_latency_sum_us: u64,
    pub failure_latency_sum_us: u64,
    pub packets_processed: u64,
    /// Hostnames observed for each resolved address.
    pub names: BTreeMap<IpAddr, Vec<String>>,
}

/// Tracer telemetry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionsTelemetry {
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

/// Point-in-time bundle of connections, HTTP, DNS and telemetry data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSnapshot {
    pub conns: Vec<ConnectionStats>,
    #[serde(with = "http_entries")]
    pub http: HashMap<HttpKey, HttpStats>,
    pub dns: DnsStats,
    pub telemetry: ConnectionsTelemetry,
}

impl ConnectionSnapshot {
    /// True when no connection, HTTP, DNS or telemetry data is present.
    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
            && self.http.is_empty()
            && self.dns == DnsStats::default()
            && self.telemetry == ConnectionsTelemetry::default()
    }
}

/// JSON object keys must be strings, so the HTTP map is stored as a list of
/// `{key, stats}` entries.
mod http_entries {
    use super::{HttpKey, HttpStats};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct EntryRef<'a> {
        key: &'a HttpKey,
        stats: &'a HttpStats,
    }

    #[derive(Deserialize)]
    struct Entry {
        key: HttpKey,
        #[serde(default)]
        stats: HttpStats,
    }

    pub fn serialize<S: Serializer>(
        map: &HashMap<HttpKey, HttpStats>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.iter().map(|(key, stats)| EntryRef { key, stats }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<HttpKey, HttpStats>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries.into_iter().map(|e| (e.key, e.stats)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().expect("valid ip")
    }

    #[test]
    fn test_http_stats_status_classes() {
        let mut stats = HttpStats::default();
        stats.add_request(200, 1_000);
        stats.add_request(204, 3_000);
        stats.add_request(404, 500);
        stats.add_request(99, 10);
        stats.add_request(600, 10);

        assert_eq!(stats.total_count(), 3);
        assert_eq!(stats.by_status_class[1].count, 2);
        assert_eq!(stats.by_status_class[1].latency_sum_ns, 4_000);
        assert_eq!(stats.by_status_class[1].first_latency_sample_ns, 1_000);
        assert_eq!(stats.by_status_class[3].count, 1);
        assert_eq!(stats.by_status_class[0].count, 0);
    }

    #[test]
    fn test_connection_http_key_uses_dest_port() {
        let conn = ConnectionStats::new(ip("10.0.0.1"), 51234, ip("10.0.0.2"), 80);
        let key = conn.http_key();
        assert_eq!(key, HttpKey::new(ip("10.0.0.1"), ip("10.0.0.2"), 80));
        assert_eq!(conn.family, AddressFamily::V4);

        let v6 = ConnectionStats::new(ip("::1"), 1, ip("::1"), 2);
        assert_eq!(v6.family, AddressFamily::V6);
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let mut snapshot = ConnectionSnapshot::default();
        let mut conn = ConnectionStats::new(ip("10.0.0.1"), 40000, ip("10.0.0.2"), 443);
        conn.domain = Some("example.com".into());
        conn.dns_count_by_rcode.insert(0, 3);
        snapshot.conns.push(conn);

        let mut stats = HttpStats::default();
        stats.add_request(200, 42);
        snapshot
            .http
            .insert(HttpKey::new(ip("10.0.0.1"), ip("10.0.0.2"), 443), stats);
        snapshot
            .dns
            .names
            .insert(ip("10.0.0.2"), vec!["example.com".into()]);

        let json = serde_json::to_string(&snapshot).expect("serialize");
        let decoded: ConnectionSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_snapshot_defaults_missing_fields() {
        let json = r#"{"conns":[{"source":"10.1.1.1","dest":"10.1.1.2","dport":53,"conn_type":"udp"}]}"#;
        let snapshot: ConnectionSnapshot = serde_json::from_str(json).expect("deserialize");
        assert_eq!(snapshot.conns.len(), 1);
        assert_eq!(snapshot.conns[0].conn_type, ConnectionType::Udp);
        assert_eq!(snapshot.conns[0].domain, None);
        assert!(snapshot.http.is_empty());
    }

    #[test]
    fn test_snapshot_is_empty_considers_dns_and_telemetry() {
        let mut snapshot = ConnectionSnapshot::default();
        assert!(snapshot.is_empty());

        snapshot
            .dns
            .names
            .insert(ip("10.0.0.2"), vec!["example.com".into()]);
        assert!(!snapshot.is_empty());

        let mut snapshot = ConnectionSnapshot::default();
        snapshot.telemetry.conns_dropped = 1;
        assert!(!snapshot.is_empty());
    }
}
