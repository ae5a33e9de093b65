// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Metric definitions and an in-process registry.
//!
//! A [`MetricDef`] names a series (`namespace`, `name`, label keys); a
//! [`Counter`] or [`Gauge`] binds it to a [`Registry`]. Recording is a side
//! effect only and never fails. Handles announce their help text to the
//! registry once and drop any label key the definition does not declare.
//!
//! Codecs built with a registry report, labelled by `format`:
//!
//! | Metric | Kind |
//! |--------|------|
//! | `connwire_payloads_encoded` | counter |
//! | `connwire_encode_errors` | counter |
//! | `connwire_bytes_encoded` | counter |
//! | `connwire_payloads_decoded` | counter |
//! | `connwire_decode_errors` | counter |

use crate::codec::Format;
use dashmap::DashMap;
use std::sync::Arc;

/// Sink for metric samples.
pub trait Registry: Send + Sync {
    /// Record one sample. Counters pass increments, gauges pass the new value.
    fn record(&self, name: &str, labels: &[(&str, &str)], value: f64);

    /// Called once per handle with the metric's help text.
    fn describe(&self, _name: &str, _help: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// Static description of a metric series.
#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub kind: MetricKind,
    pub namespace: &'static str,
    pub name: &'static str,
    pub labels: &'static [&'static str],
    pub help: &'static str,
    /// Join namespace and name with `_` instead of `__`.
    pub no_double_underscore: bool,
}

impl MetricDef {
    pub fn full_name(&self) -> String {
        let sep = if self.no_double_underscore { "_" } else { "__" };
        format!("{}{}{}", self.namespace, sep, self.name)
    }

    /// Keep only the labels whose key this metric declares.
    fn declared<'a>(&self, labels: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        labels
            .iter()
            .filter(|(key, _)| self.labels.iter().any(|k| k == key))
            .copied()
            .collect()
    }

    fn register(&self, registry: &dyn Registry) -> String {
        let name = self.full_name();
        registry.describe(&name, self.help);
        name
    }
}

/// Monotonic metric handle.
#[derive(Clone)]
pub struct Counter {
    registry: Arc<dyn Registry>,
    def: MetricDef,
    name: String,
}

impl Counter {
    pub fn new(def: &MetricDef, registry: Arc<dyn Registry>) -> Self {
        debug_assert_eq!(def.kind, MetricKind::Counter);
        let name = def.register(registry.as_ref());
        Self {
            registry,
            def: *def,
            name,
        }
    }

    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(1.0, labels);
    }

    pub fn add(&self, value: f64, labels: &[(&str, &str)]) {
        self.registry
            .record(&self.name, &self.def.declared(labels), value);
    }
}

/// Point-in-time metric handle.
#[derive(Clone)]
pub struct Gauge {
    registry: Arc<dyn Registry>,
    def: MetricDef,
    name: String,
}

impl Gauge {
    pub fn new(def: &MetricDef, registry: Arc<dyn Registry>) -> Self {
        debug_assert_eq!(def.kind, MetricKind::Gauge);
        let name = def.register(registry.as_ref());
        Self {
            registry,
            def: *def,
            name,
        }
    }

    pub fn set(&self, value: f64, labels: &[(&str, &str)]) {
        self.registry
            .record(&self.name, &self.def.declared(labels), value);
    }
}

/// Aggregated samples of one series.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Series {
    pub sum: f64,
    pub last: f64,
    pub count: u64,
}

type SeriesKey = (String, Vec<(String, String)>);

/// In-process registry, mainly for tests and the dump tool.
#[derive(Default)]
pub struct MemoryRegistry {
    series: DashMap<SeriesKey, Series>,
    help: DashMap<String, String>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str, labels: &[(&str, &str)]) -> SeriesKey {
        let mut labels: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        labels.sort();
        (name.to_string(), labels)
    }

    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> Option<Series> {
        self.series.get(&Self::key(name, labels)).map(|s| *s)
    }

    /// Sum of all samples, 0 for an unknown series.
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        self.get(name, labels).map_or(0.0, |s| s.sum)
    }

    /// Last sample of a gauge.
    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.get(name, labels).map(|s| s.last)
    }

    /// Help text announced for `name`.
    pub fn help(&self, name: &str) -> Option<String> {
        self.help.get(name).map(|h| h.value().clone())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// All series sorted by name then labels.
    pub fn snapshot(&self) -> Vec<(SeriesKey, Series)> {
        let mut all: Vec<_> = self
            .series
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

impl Registry for MemoryRegistry {
    fn record(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        let mut entry = self.series.entry(Self::key(name, labels)).or_default();
        entry.sum += value;
        entry.last = value;
        entry.count += 1;
    }

    fn describe(&self, name: &str, help: &str) {
        self.help.insert(name.to_string(), help.to_string());
    }
}

const NAMESPACE: &str = "connwire";
const FORMAT_LABEL: &[&str] = &["format"];

pub const PAYLOADS_ENCODED: MetricDef = MetricDef {
    kind: MetricKind::Counter,
    namespace: NAMESPACE,
    name: "payloads_encoded",
    labels: FORMAT_LABEL,
    help: "Number of payloads encoded",
    no_double_underscore: true,
};

pub const ENCODE_ERRORS: MetricDef = MetricDef {
    kind: MetricKind::Counter,
    namespace: NAMESPACE,
    name: "encode_errors",
    labels: FORMAT_LABEL,
    help: "Number of failed encode calls",
    no_double_underscore: true,
};

pub const BYTES_ENCODED: MetricDef = MetricDef {
    kind: MetricKind::Counter,
    namespace: NAMESPACE,
    name: "bytes_encoded",
    labels: FORMAT_LABEL,
    help: "Total size of encoded payloads",
    no_double_underscore: true,
};

pub const PAYLOADS_DECODED: MetricDef = MetricDef {
    kind: MetricKind::Counter,
    namespace: NAMESPACE,
    name: "payloads_decoded",
    labels: FORMAT_LABEL,
    help: "Number of payloads decoded",
    no_double_underscore: true,
};

pub const DECODE_ERRORS: MetricDef = MetricDef {
    kind: MetricKind::Counter,
    namespace: NAMESPACE,
    name: "decode_errors",
    labels: FORMAT_LABEL,
    help: "Number of rejected payloads",
    no_double_underscore: true,
};

/// Per-codec metric handles.
pub(crate) struct CodecMetrics {
    format: &'static str,
    encoded: Counter,
    encode_errors: Counter,
    bytes: Counter,
    decoded: Counter,
    decode_errors: Counter,
}

impl CodecMetrics {
    pub(crate) fn new(registry: Arc<dyn Registry>, format: Format) -> Self {
        Self {
            format: format.as_str(),
            encoded: Counter::new(&PAYLOADS_ENCODED, Arc::clone(&registry)),
            encode_errors: Counter::new(&ENCODE_ERRORS, Arc::clone(&registry)),
            bytes: Counter::new(&BYTES_ENCODED, Arc::clone(&registry)),
            decoded: Counter::new(&PAYLOADS_DECODED, Arc::clone(&registry)),
            decode_errors: Counter::new(&DECODE_ERRORS, registry),
        }
    }

    fn labels(&self) -> [(&'static str, &'static str); 1] {
        [("format", self.format)]
    }

    pub(crate) fn encoded(&self, len: usize) {
        let labels = self.labels();
        self.encoded.inc(&labels);
        self.bytes.add(len as f64, &labels);
    }

    pub(crate) fn encode_failed(&self) {
        self.encode_errors.inc(&self.labels());
    }

    pub(crate) fn decoded(&self) {
        self.decoded.inc(&self.labels());
    }

    pub(crate) fn decode_failed(&self) {
        self.decode_errors.inc(&self.labels());
    }
}
