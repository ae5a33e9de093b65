// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Conversions from snapshot structures to wire sub-messages.
//!
//! All formatters are pure: given the same input and table state they
//! produce the same output, and the only state they touch is the table
//! passed in.

use crate::intern::{DomainTable, HttpKeyTable};
use crate::network::{ConnectionStats, ConnectionsTelemetry, DnsStats, HttpKey, HttpStats};
use crate::payload::{
    WireAddr, WireConnection, WireDns, WireDnsEntry, WireHttpStats, WireRequestStats,
    WireTelemetry,
};
use crate::{Error, Result};
use std::collections::HashMap;

/// Format one connection, interning its domain and resolving its HTTP flow.
pub fn format_connection<'a>(
    conn: &'a ConnectionStats,
    domains: &mut DomainTable<'a>,
    http_keys: &HttpKeyTable<'_>,
) -> WireConnection {
    WireConnection {
        pid: conn.pid,
        laddr: WireAddr {
            ip: conn.source.to_string(),
            port: i32::from(conn.sport),
        },
        raddr: WireAddr {
            ip: conn.dest.to_string(),
            port: i32::from(conn.dport),
        },
        family: conn.family,
        conn_type: conn.conn_type,
        direction: conn.direction,
        net_ns: conn.net_ns,
        monotonic_sent_bytes: conn.monotonic_sent_bytes,
        last_sent_bytes: conn.last_sent_bytes,
        monotonic_recv_bytes: conn.monotonic_recv_bytes,
        last_recv_bytes: conn.last_recv_bytes,
        monotonic_sent_packets: conn.monotonic_sent_packets,
        last_sent_packets: conn.last_sent_packets,
        monotonic_recv_packets: conn.monotonic_recv_packets,
        last_recv_packets: conn.last_recv_packets,
        monotonic_retransmits: conn.monotonic_retransmits,
        last_retransmits: conn.last_retransmits,
        rtt: conn.rtt,
        rtt_var: conn.rtt_var,
        last_tcp_established: conn.last_tcp_established,
        last_tcp_closed: conn.last_tcp_closed,
        dns_successful_responses: conn.dns_successful_responses,
        dns_failed_responses: conn.dns_failed_responses,
        dns_timeouts: conn.dns_timeouts,
        dns_success_latency_sum: conn.dns_success_latency_sum,
        dns_failure_latency_sum: conn.dns_failure_latency_sum,
        dns_count_by_rcode: conn.dns_count_by_rcode.clone(),
        domain_idx: conn.domain.as_deref().map(|d| domains.intern(d)),
        http_key_idx: http_keys.get(&conn.http_key()),
    }
}

/// Copy aggregated DNS counters; reverse-DNS entries come out in IP order.
pub fn format_dns(dns: &DnsStats) -> WireDns {
    let mut out = WireDns::default();
    format_dns_into(dns, &mut out);
    out
}

pub(crate) fn format_dns_into(dns: &DnsStats, out: &mut WireDns) {
    out.successful_responses = dns.successful_responses;
    out.failed_responses = dns.failed_responses;
    out.timeouts = dns.timeouts;
    out.success_latency_sum_us = dns.success_latency_sum_us;
    out.failure_latency_sum_us = dns.failure_latency_sum_us;
    out.packets_processed = dns.packets_processed;
    out.entries.clear();
    out.entries
        .extend(dns.names.iter().map(|(ip, names)| WireDnsEntry {
            ip: ip.to_string(),
            names: names.clone(),
        }));
}

/// Produce one stats entry per table id, at the position equal to the id.
///
/// Fails if the table and the map disagree, which means the table was not
/// built from this map.
pub fn format_http(
    http: &HashMap<HttpKey, HttpStats>,
    http_keys: &HttpKeyTable<'_>,
) -> Result<Vec<WireHttpStats>> {
    let mut out = Vec::with_capacity(http_keys.len());
    format_http_into(http, http_keys, &mut out)?;
    Ok(out)
}

pub(crate) fn format_http_into(
    http: &HashMap<HttpKey, HttpStats>,
    http_keys: &HttpKeyTable<'_>,
    out: &mut Vec<WireHttpStats>,
) -> Result<()> {
    if http.len() != http_keys.len() {
        return Err(Error::InvariantViolation(format!(
            "http key table has {} keys but the stats map has {}",
            http_keys.len(),
            http.len()
        )));
    }

    out.clear();
    for key in http_keys.keys() {
        let stats = http.get(key).ok_or_else(|| {
            Error::InvariantViolation(format!("http key {key:?} missing from the stats map"))
        })?;
        out.push(format_http_stats(stats));
    }
    Ok(())
}

fn format_http_stats(stats: &HttpStats) -> WireHttpStats {
    let stats_by_status_class = stats
        .by_status_class
        .iter()
        .enumerate()
        .filter(|(_, s)| s.count > 0)
        .map(|(idx, s)| WireRequestStats {
            status_class: (idx as u32 + 1) * 100,
            count: s.count,
            latency_sum_ns: s.latency_sum_ns,
            first_latency_sample_ns: s.first_latency_sample_ns,
        })
        .collect();

    WireHttpStats {
        count: stats.total_count(),
        stats_by_status_class,
    }
}

pub fn format_telemetry(telemetry: &ConnectionsTelemetry) -> WireTelemetry {
    WireTelemetry {
        monotonic_kprobes_triggered: telemetry.monotonic_kprobes_triggered,
        monotonic_kprobes_missed: telemetry.monotonic_kprobes_missed,
        monotonic_conntrack_registers: telemetry.monotonic_conntrack_registers,
        monotonic_conntrack_registers_dropped: telemetry.monotonic_conntrack_registers_dropped,
        monotonic_dns_packets_processed: telemetry.monotonic_dns_packets_processed,
        monotonic_conns_closed: telemetry.monotonic_conns_closed,
        conns_dropped: telemetry.conns_dropped,
        dns_stats_dropped: telemetry.dns_stats_dropped,
        http_requests_dropped: telemetry.http_requests_dropped,
        http_requests_missed: telemetry.http_requests_missed,
        monotonic_udp_sends_processed: telemetry.monotonic_udp_sends_processed,
        monotonic_udp_sends_missed: telemetry.monotonic_udp_sends_missed,
        tcp_sent_miscounts: telemetry.tcp_sent_miscounts,
        missed_tcp_close: telemetry.missed_tcp_close,
        missed_udp_close: telemetry.missed_udp_close,
    }
}
