// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Snapshot builders shared by the integration tests.

#![allow(dead_code)]

use connwire::{
    ConnectionSnapshot, ConnectionStats, ConnectionType, Direction, HttpKey, HttpStats,
};
use std::net::IpAddr;

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid ip")
}

/// Two connections to `example.com` and one HTTP flow
/// `10.0.0.1 -> 10.0.0.2:80` with 5 requests.
pub fn example_snapshot() -> ConnectionSnapshot {
    let mut snapshot = ConnectionSnapshot::default();

    for sport in [40001u16, 40002] {
        let mut conn = ConnectionStats::new(ip("10.0.0.1"), sport, ip("10.0.0.2"), 80);
        conn.pid = 4242;
        conn.direction = Direction::Outgoing;
        conn.domain = Some("example.com".into());
        conn.monotonic_sent_bytes = u64::from(sport);
        snapshot.conns.push(conn);
    }

    let mut stats = HttpStats::default();
    for latency in [100, 200, 300, 400] {
        stats.add_request(200, latency);
    }
    stats.add_request(503, 900);
    snapshot
        .http
        .insert(HttpKey::new(ip("10.0.0.1"), ip("10.0.0.2"), 80), stats);

    snapshot.dns.successful_responses = 7;
    snapshot
        .dns
        .names
        .insert(ip("10.0.0.2"), vec!["example.com".into()]);
    snapshot.telemetry.monotonic_conns_closed = 3;
    snapshot
}

/// `n_conns` connections spread over `n_flows` HTTP flows and a handful of
/// domains; every third connection has no domain.
pub fn mixed_snapshot(n_conns: usize, n_flows: usize) -> ConnectionSnapshot {
    let mut snapshot = ConnectionSnapshot::default();
    let domains = ["a.example", "b.example", "c.example", "d.example"];

    for flow in 0..n_flows {
        let mut stats = HttpStats::default();
        for i in 0..=flow % 4 {
            stats.add_request(200 + 100 * (i as u16 % 4), 1_000 * (i as u64 + 1));
        }
        snapshot.http.insert(flow_key(flow), stats);
    }

    for i in 0..n_conns {
        let flow = i % n_flows.max(1);
        let key = flow_key(flow);
        let mut conn = ConnectionStats::new(key.source_ip, 30_000 + i as u16, key.dest_ip, key.dest_port);
        conn.pid = i as u32;
        conn.conn_type = if i % 5 == 0 {
            ConnectionType::Udp
        } else {
            ConnectionType::Tcp
        };
        conn.domain = (i % 3 != 0).then(|| domains[i % domains.len()].to_string());
        conn.monotonic_recv_bytes = (i * 1500) as u64;
        conn.rtt = 120 + i as u32;
        snapshot.conns.push(conn);
    }

    // A connection whose flow has no HTTP stats.
    snapshot
        .conns
        .push(ConnectionStats::new(ip("192.168.1.1"), 5353, ip("192.168.1.2"), 53));
    snapshot
}

pub fn flow_key(flow: usize) -> HttpKey {
    HttpKey::new(
        ip("10.1.0.1"),
        IpAddr::from([10, 2, (flow / 256) as u8, (flow % 256) as u8]),
        8080,
    )
}
