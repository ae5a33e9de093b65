// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binary payload format.
//!
//! # Layout
//!
//! ```text
//! +---------------------------------------------------------+
//! |                    Header (20 bytes)                     |
//! |  Magic (8) | Version (4) | Flags (4) | BodyLen (4)       |
//! +---------------------------------------------------------+
//! |                    Body                                  |
//! |  connections[] | domains[] | http_keys[] | http_stats[]  |
//! |  dns | telemetry                                         |
//! +---------------------------------------------------------+
//! |  CRC32 of body (4)                                       |
//! +---------------------------------------------------------+
//! ```
//!
//! All integers are little endian. Lists and strings carry a u32 length
//! prefix, optional ids a presence byte, enums a u8 tag. Field order is
//! fixed, so the same payload always encodes to the same bytes.

use super::{CodecOptions, Format, PayloadCodec, Shared, CONTENT_TYPE_BINARY};
use crate::network::{AddressFamily, ConnectionSnapshot, ConnectionType, Direction};
use crate::payload::{
    WireAddr, WireConnection, WireDns, WireDnsEntry, WireHttpKey, WireHttpStats,
    WirePayload, WireRequestStats, WireTelemetry,
};
use crate::pool::PoolStats;
use crate::{Error, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};

/// Magic bytes: "CONNWIR\0"
pub const MAGIC: [u8; 8] = [0x43, 0x4f, 0x4e, 0x4e, 0x57, 0x49, 0x52, 0x00];

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 20;

const CRC_SIZE: usize = 4;
const BODY_LEN_OFFSET: usize = 16;

/// Upper bound on elements reserved up front from a length prefix; longer
/// lists grow as elements are actually decoded.
const MAX_PREALLOC: usize = 1024;

/// Binary adapter.
pub struct BinaryCodec {
    shared: Shared,
}

impl BinaryCodec {
    pub fn new() -> Self {
        Self::with_options(CodecOptions::default())
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            shared: Shared::new(Format::Binary, &options),
        }
    }

    /// Counters of the codec's payload pool.
    pub fn pool_stats(&self) -> PoolStats {
        self.shared.pool_stats()
    }
}

impl Default for BinaryCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadCodec for BinaryCodec {
    fn encode(&self, snapshot: &ConnectionSnapshot) -> Result<Vec<u8>> {
        self.shared.encode_with(snapshot, encode_payload)
    }

    fn decode(&self, blob: &[u8]) -> Result<WirePayload> {
        self.shared.decode_with(blob, decode_payload)
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_BINARY
    }
}

/// Serialize a payload: header, body, CRC.
pub fn encode_payload(payload: &WirePayload) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + 256 * (payload.connections.len() + 1));
    buf.write_all(&MAGIC)?;
    buf.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    buf.write_u32::<LittleEndian>(0)?; // flags, reserved
    buf.write_u32::<LittleEndian>(0)?; // body length, patched below

    payload.encode(&mut buf)?;

    let body_len = buf.len() - HEADER_SIZE;
    let body_len_u32 = u32::try_from(body_len).map_err(|_| Error::TooLarge {
        field: "payload body",
        len: body_len,
    })?;
    LittleEndian::write_u32(
        &mut buf[BODY_LEN_OFFSET..BODY_LEN_OFFSET + 4],
        body_len_u32,
    );

    let crc = crc32fast::hash(&buf[HEADER_SIZE..]);
    buf.write_u32::<LittleEndian>(crc)?;
    Ok(buf)
}

/// Parse a payload, validating header, body length, CRC and full consumption.
pub fn decode_payload(blob: &[u8]) -> Result<WirePayload> {
    if blob.len() < HEADER_SIZE + CRC_SIZE {
        return Err(Error::InvalidFormat(format!(
            "payload too short: {} bytes",
            blob.len()
        )));
    }

    let mut header = Cursor::new(&blob[..HEADER_SIZE]);
    let mut magic = [0u8; 8];
    header.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(Error::InvalidFormat("invalid binary payload magic".into()));
    }

    let version = header.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(Error::VersionMismatch {
            expected: FORMAT_VERSION,
            got: version,
        });
    }
    let _flags = header.read_u32::<LittleEndian>()?;
    let body_len = header.read_u32::<LittleEndian>()? as usize;

    if HEADER_SIZE + body_len + CRC_SIZE != blob.len() {
        return Err(Error::InvalidFormat(format!(
            "body length {} does not match payload size {}",
            body_len,
            blob.len()
        )));
    }

    let body = &blob[HEADER_SIZE..HEADER_SIZE + body_len];
    let expected = LittleEndian::read_u32(&blob[HEADER_SIZE + body_len..]);
    let computed = crc32fast::hash(body);
    if expected != computed {
        return Err(Error::CrcMismatch { expected, computed });
    }

    let mut r = Cursor::new(body);
    let payload = WirePayload::decode(&mut r).map_err(truncated)?;
    let consumed = r.position() as usize;
    if consumed != body.len() {
        return Err(Error::InvalidFormat(format!(
            "{} trailing bytes after payload body",
            body.len() - consumed
        )));
    }
    Ok(payload)
}

fn truncated(err: Error) -> Error {
    match err {
        Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            Error::InvalidFormat("truncated payload body".into())
        }
        other => other,
    }
}

type Reader<'a> = Cursor<&'a [u8]>;

trait WireEncode {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()>;
}

trait WireDecode: Sized {
    fn decode(r: &mut Reader<'_>) -> Result<Self>;
}

// Primitive helpers

fn write_len<W: Write>(w: &mut W, field: &'static str, len: usize) -> Result<()> {
    let len32 = u32::try_from(len).map_err(|_| Error::TooLarge { field, len })?;
    w.write_u32::<LittleEndian>(len32)?;
    Ok(())
}

fn read_len(r: &mut Reader<'_>, field: &'static str) -> Result<usize> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let remaining = r.get_ref().len().saturating_sub(r.position() as usize);
    if len > remaining {
        return Err(Error::InvalidFormat(format!(
            "{field}: length {len} exceeds remaining {remaining} bytes"
        )));
    }
    Ok(len)
}

fn write_str<W: Write>(w: &mut W, field: &'static str, s: &str) -> Result<()> {
    write_len(w, field, s.len())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_str(r: &mut Reader<'_>, field: &'static str) -> Result<String> {
    let len = read_len(r, field)?;
    let data: &[u8] = *r.get_ref();
    let start = r.position() as usize;
    let bytes = &data[start..start + len];
    r.set_position((start + len) as u64);
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::InvalidFormat(format!("{field}: invalid UTF-8")))
}

fn write_opt_u32<W: Write>(w: &mut W, value: Option<u32>) -> Result<()> {
    match value {
        Some(v) => {
            w.write_u8(1)?;
            w.write_u32::<LittleEndian>(v)?;
        }
        None => w.write_u8(0)?,
    }
    Ok(())
}

fn read_opt_u32(r: &mut Reader<'_>, field: &'static str) -> Result<Option<u32>> {
    match r.read_u8()? {
        0 => Ok(None),
        1 => Ok(Some(r.read_u32::<LittleEndian>()?)),
        tag => Err(Error::InvalidFormat(format!(
            "{field}: invalid presence tag {tag}"
        ))),
    }
}

fn write_seq<W: Write, T: WireEncode>(w: &mut W, field: &'static str, items: &[T]) -> Result<()> {
    write_len(w, field, items.len())?;
    for item in items {
        item.encode(w)?;
    }
    Ok(())
}

fn read_seq<T: WireDecode>(r: &mut Reader<'_>, field: &'static str) -> Result<Vec<T>> {
    let len = read_len(r, field)?;
    let mut items = Vec::with_capacity(len.min(MAX_PREALLOC));
    for _ in 0..len {
        items.push(T::decode(r)?);
    }
    Ok(items)
}

fn write_u32_map<W: Write>(w: &mut W, field: &'static str, map: &BTreeMap<u32, u32>) -> Result<()> {
    write_len(w, field, map.len())?;
    for (k, v) in map {
        w.write_u32::<LittleEndian>(*k)?;
        w.write_u32::<LittleEndian>(*v)?;
    }
    Ok(())
}

fn read_u32_map(r: &mut Reader<'_>, field: &'static str) -> Result<BTreeMap<u32, u32>> {
    let len = read_len(r, field)?;
    let mut map = BTreeMap::new();
    for _ in 0..len {
        let k = r.read_u32::<LittleEndian>()?;
        let v = r.read_u32::<LittleEndian>()?;
        if map.insert(k, v).is_some() {
            return Err(Error::InvalidFormat(format!("{field}: duplicate key {k}")));
        }
    }
    Ok(map)
}

// Enums

impl WireEncode for AddressFamily {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        let tag = match self {
            AddressFamily::V4 => 0,
            AddressFamily::V6 => 1,
        };
        w.write_u8(tag)?;
        Ok(())
    }
}

impl WireDecode for AddressFamily {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        match r.read_u8()? {
            0 => Ok(AddressFamily::V4),
            1 => Ok(AddressFamily::V6),
            tag => Err(Error::InvalidFormat(format!("unknown address family {tag}"))),
        }
    }
}

impl WireEncode for ConnectionType {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        let tag = match self {
            ConnectionType::Tcp => 0,
            ConnectionType::Udp => 1,
        };
        w.write_u8(tag)?;
        Ok(())
    }
}

impl WireDecode for ConnectionType {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        match r.read_u8()? {
            0 => Ok(ConnectionType::Tcp),
            1 => Ok(ConnectionType::Udp),
            tag => Err(Error::InvalidFormat(format!("unknown connection type {tag}"))),
        }
    }
}

impl WireEncode for Direction {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        let tag = match self {
            Direction::Unknown => 0,
            Direction::Incoming => 1,
            Direction::Outgoing => 2,
            Direction::Local => 3,
        };
        w.write_u8(tag)?;
        Ok(())
    }
}

impl WireDecode for Direction {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        match r.read_u8()? {
            0 => Ok(Direction::Unknown),
            1 => Ok(Direction::Incoming),
            2 => Ok(Direction::Outgoing),
            3 => Ok(Direction::Local),
            tag => Err(Error::InvalidFormat(format!("unknown direction {tag}"))),
        }
    }
}

// Messages

impl WireEncode for String {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        write_str(w, "string", self)
    }
}

impl WireDecode for String {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        read_str(r, "string")
    }
}

impl WireEncode for WireAddr {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        write_str(w, "ip", &self.ip)?;
        w.write_i32::<LittleEndian>(self.port)?;
        Ok(())
    }
}

impl WireDecode for WireAddr {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            ip: read_str(r, "ip")?,
            port: r.read_i32::<LittleEndian>()?,
        })
    }
}

impl WireEncode for WireConnection {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<LittleEndian>(self.pid)?;
        self.laddr.encode(w)?;
        self.raddr.encode(w)?;
        self.family.encode(w)?;
        self.conn_type.encode(w)?;
        self.direction.encode(w)?;
        w.write_u32::<LittleEndian>(self.net_ns)?;

        for counter in [
            self.monotonic_sent_bytes,
            self.last_sent_bytes,
            self.monotonic_recv_bytes,
            self.last_recv_bytes,
            self.monotonic_sent_packets,
            self.last_sent_packets,
            self.monotonic_recv_packets,
            self.last_recv_packets,
        ] {
            w.write_u64::<LittleEndian>(counter)?;
        }

        for value in [
            self.monotonic_retransmits,
            self.last_retransmits,
            self.rtt,
            self.rtt_var,
            self.last_tcp_established,
            self.last_tcp_closed,
            self.dns_successful_responses,
            self.dns_failed_responses,
            self.dns_timeouts,
        ] {
            w.write_u32::<LittleEndian>(value)?;
        }
        w.write_u64::<LittleEndian>(self.dns_success_latency_sum)?;
        w.write_u64::<LittleEndian>(self.dns_failure_latency_sum)?;
        write_u32_map(w, "dns_count_by_rcode", &self.dns_count_by_rcode)?;

        write_opt_u32(w, self.domain_idx)?;
        write_opt_u32(w, self.http_key_idx)?;
        Ok(())
    }
}

impl WireDecode for WireConnection {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            pid: r.read_u32::<LittleEndian>()?,
            laddr: WireAddr::decode(r)?,
            raddr: WireAddr::decode(r)?,
            family: AddressFamily::decode(r)?,
            conn_type: ConnectionType::decode(r)?,
            direction: Direction::decode(r)?,
            net_ns: r.read_u32::<LittleEndian>()?,
            monotonic_sent_bytes: r.read_u64::<LittleEndian>()?,
            last_sent_bytes: r.read_u64::<LittleEndian>()?,
            monotonic_recv_bytes: r.read_u64::<LittleEndian>()?,
            last_recv_bytes: r.read_u64::<LittleEndian>()?,
            monotonic_sent_packets: r.read_u64::<LittleEndian>()?,
            last_sent_packets: r.read_u64::<LittleEndian>()?,
            monotonic_recv_packets: r.read_u64::<LittleEndian>()?,
            last_recv_packets: r.read_u64::<LittleEndian>()?,
            monotonic_retransmits: r.read_u32::<LittleEndian>()?,
            last_retransmits: r.read_u32::<LittleEndian>()?,
            rtt: r.read_u32::<LittleEndian>()?,
            rtt_var: r.read_u32::<LittleEndian>()?,
            last_tcp_established: r.read_u32::<LittleEndian>()?,
            last_tcp_closed: r.read_u32::<LittleEndian>()?,
            dns_successful_responses: r.read_u32::<LittleEndian>()?,
            dns_failed_responses: r.read_u32::<LittleEndian>()?,
            dns_timeouts: r.read_u32::<LittleEndian>()?,
            dns_success_latency_sum: r.read_u64::<LittleEndian>()?,
            dns_failure_latency_sum: r.read_u64::<LittleEndian>()?,
            dns_count_by_rcode: read_u32_map(r, "dns_count_by_rcode")?,
            domain_idx: read_opt_u32(r, "domain_idx")?,
            http_key_idx: read_opt_u32(r, "http_key_idx")?,
        })
    }
}

impl WireEncode for WireHttpKey {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        self.source.encode(w)?;
        self.dest.encode(w)
    }
}

impl WireDecode for WireHttpKey {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            source: WireAddr::decode(r)?,
            dest: WireAddr::decode(r)?,
        })
    }
}

impl WireEncode for WireRequestStats {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<LittleEndian>(self.status_class)?;
        w.write_u32::<LittleEndian>(self.count)?;
        w.write_u64::<LittleEndian>(self.latency_sum_ns)?;
        w.write_u64::<LittleEndian>(self.first_latency_sample_ns)?;
        Ok(())
    }
}

impl WireDecode for WireRequestStats {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            status_class: r.read_u32::<LittleEndian>()?,
            count: r.read_u32::<LittleEndian>()?,
            latency_sum_ns: r.read_u64::<LittleEndian>()?,
            first_latency_sample_ns: r.read_u64::<LittleEndian>()?,
        })
    }
}

impl WireEncode for WireHttpStats {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u64::<LittleEndian>(self.count)?;
        write_seq(w, "stats_by_status_class", &self.stats_by_status_class)
    }
}

impl WireDecode for WireHttpStats {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            count: r.read_u64::<LittleEndian>()?,
            stats_by_status_class: read_seq(r, "stats_by_status_class")?,
        })
    }
}

impl WireEncode for WireDnsEntry {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        write_str(w, "dns ip", &self.ip)?;
        write_seq(w, "dns names", &self.names)
    }
}

impl WireDecode for WireDnsEntry {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            ip: read_str(r, "dns ip")?,
            names: read_seq(r, "dns names")?,
        })
    }
}

impl WireEncode for WireDns {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        for counter in [
            self.successful_responses,
            self.failed_responses,
            self.timeouts,
            self.success_latency_sum_us,
            self.failure_latency_sum_us,
            self.packets_processed,
        ] {
            w.write_u64::<LittleEndian>(counter)?;
        }
        write_seq(w, "dns entries", &self.entries)
    }
}

impl WireDecode for WireDns {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            successful_responses: r.read_u64::<LittleEndian>()?,
            failed_responses: r.read_u64::<LittleEndian>()?,
            timeouts: r.read_u64::<LittleEndian>()?,
            success_latency_sum_us: r.read_u64::<LittleEndian>()?,
            failure_latency_sum_us: r.read_u64::<LittleEndian>()?,
            packets_processed: r.read_u64::<LittleEndian>()?,
            entries: read_seq(r, "dns entries")?,
        })
    }
}

impl WireEncode for WireTelemetry {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        for counter in [
            self.monotonic_kprobes_triggered,
            self.monotonic_kprobes_missed,
            self.monotonic_conntrack_registers,
            self.monotonic_conntrack_registers_dropped,
            self.monotonic_dns_packets_processed,
            self.monotonic_conns_closed,
            self.conns_dropped,
            self.dns_stats_dropped,
            self.http_requests_dropped,
            self.http_requests_missed,
            self.monotonic_udp_sends_processed,
            self.monotonic_udp_sends_missed,
            self.tcp_sent_miscounts,
            self.missed_tcp_close,
            self.missed_udp_close,
        ] {
            w.write_u64::<LittleEndian>(counter)?;
        }
        Ok(())
    }
}

impl WireDecode for WireTelemetry {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            monotonic_kprobes_triggered: r.read_u64::<LittleEndian>()?,
            monotonic_kprobes_missed: r.read_u64::<LittleEndian>()?,
            monotonic_conntrack_registers: r.read_u64::<LittleEndian>()?,
            monotonic_conntrack_registers_dropped: r.read_u64::<LittleEndian>()?,
            monotonic_dns_packets_processed: r.read_u64::<LittleEndian>()?,
            monotonic_conns_closed: r.read_u64::<LittleEndian>()?,
            conns_dropped: r.read_u64::<LittleEndian>()?,
            dns_stats_dropped: r.read_u64::<LittleEndian>()?,
            http_requests_dropped: r.read_u64::<LittleEndian>()?,
            http_requests_missed: r.read_u64::<LittleEndian>()?,
            monotonic_udp_sends_processed: r.read_u64::<LittleEndian>()?,
            monotonic_udp_sends_missed: r.read_u64::<LittleEndian>()?,
            tcp_sent_miscounts: r.read_u64::<LittleEndian>()?,
            missed_tcp_close: r.read_u64::<LittleEndian>()?,
            missed_udp_close: r.read_u64::<LittleEndian>()?,
        })
    }
}

impl WireEncode for WirePayload {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        write_seq(w, "connections", &self.connections)?;
        write_seq(w, "domains", &self.domains)?;
        write_seq(w, "http_keys", &self.http_keys)?;
        write_seq(w, "http_stats", &self.http_stats)?;
        self.dns.encode(w)?;
        self.telemetry.encode(w)
    }
}

impl WireDecode for WirePayload {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            connections: read_seq(r, "connections")?,
            domains: read_seq(r, "domains")?,
            http_keys: read_seq(r, "http_keys")?,
            http_stats: read_seq(r, "http_stats")?,
            dns: WireDns::decode(r)?,
            telemetry: WireTelemetry::decode(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> WirePayload {
        let mut rcodes = BTreeMap::new();
        rcodes.insert(0, 12);
        rcodes.insert(3, 2);
        WirePayload {
            connections: vec![WireConnection {
                pid: 31337,
                laddr: WireAddr {
                    ip: "10.0.0.1".into(),
                    port: 40000,
                },
                raddr: WireAddr {
                    ip: "2001:db8::1".into(),
                    port: 443,
                },
                family: AddressFamily::V6,
                conn_type: ConnectionType::Udp,
                direction: Direction::Outgoing,
                monotonic_sent_bytes: u64::MAX,
                rtt_var: 17,
                dns_count_by_rcode: rcodes,
                domain_idx: Some(0),
                http_key_idx: None,
                ..Default::default()
            }],
            domains: vec!["example.com".into()],
            telemetry: WireTelemetry {
                missed_udp_close: 2,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode_payload(&WirePayload::default()).expect("encode");
        assert_eq!(&bytes[..8], &MAGIC);
        assert_eq!(LittleEndian::read_u32(&bytes[8..12]), FORMAT_VERSION);
        assert_eq!(LittleEndian::read_u32(&bytes[12..16]), 0);
        let body_len = LittleEndian::read_u32(&bytes[16..20]) as usize;
        assert_eq!(bytes.len(), HEADER_SIZE + body_len + CRC_SIZE);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let payload = sample_payload();
        let a = encode_payload(&payload).expect("encode");
        let b = encode_payload(&payload.clone()).expect("encode");
        assert_eq!(a, b);
        assert_eq!(decode_payload(&a).expect("decode"), payload);
    }

    #[test]
    fn test_decode_rejects_corrupted_body() {
        let mut bytes = encode_payload(&sample_payload()).expect("encode");
        bytes[HEADER_SIZE + 2] ^= 0xff;
        let err = decode_payload(&bytes).expect_err("crc");
        assert!(matches!(err, Error::CrcMismatch { .. }));
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let bytes = encode_payload(&sample_payload()).expect("encode");
        for len in [0, 10, HEADER_SIZE, bytes.len() - 1] {
            let err = decode_payload(&bytes[..len]).expect_err("truncated");
            assert!(err.is_decode_error(), "len {len}: {err}");
        }
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut bytes = encode_payload(&sample_payload()).expect("encode");
        LittleEndian::write_u32(&mut bytes[8..12], 99);
        let err = decode_payload(&bytes).expect_err("version");
        assert!(matches!(err, Error::VersionMismatch { expected: 1, got: 99 }));
    }

    #[test]
    fn test_decode_rejects_oversized_list_length() {
        // Body claiming 1000 connections with nothing behind the count.
        let mut body = Vec::new();
        body.write_u32::<LittleEndian>(1000).expect("write");
        let bytes = frame(&body);
        let err = decode_payload(&bytes).expect_err("length");
        match err {
            Error::InvalidFormat(msg) => assert!(msg.contains("connections"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.write_u32::<LittleEndian>(FORMAT_VERSION).expect("write");
        bytes.write_u32::<LittleEndian>(0).expect("write");
        bytes.write_u32::<LittleEndian>(body.len() as u32).expect("write");
        bytes.extend_from_slice(body);
        bytes
            .write_u32::<LittleEndian>(crc32fast::hash(body))
            .expect("write");
        bytes
    }

    #[test]
    fn test_decode_huge_count_over_zero_body_fails_cleanly() {
        // 4M claimed connections backed by 4 MiB of zeros: the length check
        // passes, each zero connection decodes, and the body runs out long
        // before the count is reached.
        let count: usize = 4 << 20;
        let mut body = Vec::with_capacity(4 + count);
        body.write_u32::<LittleEndian>(count as u32).expect("write");
        body.resize(4 + count, 0);

        let err = decode_payload(&frame(&body)).expect_err("truncated");
        match err {
            Error::InvalidFormat(msg) => assert!(msg.contains("truncated"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_bad_enum_tag() {
        let payload = sample_payload();
        let mut body = Vec::new();
        payload.encode(&mut body).expect("encode body");
        // count(4) pid(4) laddr(4+8+4) raddr(4+11+4) -> family tag
        let family_offset = 4 + 4 + (4 + 8 + 4) + (4 + 11 + 4);
        assert_eq!(body[family_offset], 1);
        body[family_offset] = 9;

        let bytes = frame(&body);
        let err = decode_payload(&bytes).expect_err("enum tag");
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_codec_rejects_http_keys_without_stats() {
        let mut payload = sample_payload();
        payload.http_keys.push(WireHttpKey::default());
        payload.connections[0].http_key_idx = Some(0);
        let bytes = encode_payload(&payload).expect("encode");

        // The frame itself is well formed; only the table check fails.
        decode_payload(&bytes).expect("frame decodes");
        let err = BinaryCodec::new().decode(&bytes).expect_err("unpaired key");
        assert!(matches!(err, Error::InvalidFormat(_)));
    }
}
