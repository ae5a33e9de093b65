// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-call interning tables.
//!
//! Both tables borrow their keys from the snapshot being encoded and live
//! only for the duration of one encode call. Ids are dense and zero based;
//! the id order is whatever the insertion order was and is never stable
//! across calls.

use crate::network::HttpKey;
use crate::payload::{WireAddr, WireHttpKey};
use std::collections::HashMap;

/// Domain string -> id, assigned in first-seen order.
#[derive(Debug, Default)]
pub struct DomainTable<'a> {
    ids: HashMap<&'a str, u32>,
    order: Vec<&'a str>,
}

impl<'a> DomainTable<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `domain`, assigning the next one if unseen.
    pub fn intern(&mut self, domain: &'a str) -> u32 {
        if let Some(&id) = self.ids.get(domain) {
            return id;
        }
        let id = self.order.len() as u32;
        self.ids.insert(domain, id);
        self.order.push(domain);
        id
    }

    pub fn get(&self, domain: &str) -> Option<u32> {
        self.ids.get(domain).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Write the table into `out` so that `out[id]` holds the domain with that id.
    pub fn export_into(&self, out: &mut Vec<String>) {
        out.clear();
        out.extend(self.order.iter().map(|d| (*d).to_owned()));
    }
}

/// HTTP flow key -> id, assigned in enumeration order.
#[derive(Debug, Default)]
pub struct HttpKeyTable<'a> {
    ids: HashMap<&'a HttpKey, u32>,
    keys: Vec<&'a HttpKey>,
}

impl<'a> HttpKeyTable<'a> {
    /// Assign ids to `keys` in the order they are yielded. Duplicates keep
    /// their first id.
    pub fn from_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a HttpKey>,
    {
        let iter = keys.into_iter();
        let mut table = Self {
            ids: HashMap::with_capacity(iter.size_hint().0),
            keys: Vec::with_capacity(iter.size_hint().0),
        };
        for key in iter {
            if table.ids.contains_key(key) {
                continue;
            }
            table.ids.insert(key, table.keys.len() as u32);
            table.keys.push(key);
        }
        table
    }

    pub fn get(&self, key: &HttpKey) -> Option<u32> {
        self.ids.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in id order.
    pub fn keys(&self) -> impl ExactSizeIterator<Item = &'a HttpKey> + '_ {
        self.keys.iter().copied()
    }

    /// Write the wire rendering of the keys into `out` in id order.
    pub fn export_into(&self, out: &mut Vec<WireHttpKey>) {
        out.clear();
        out.extend(self.keys.iter().map(|key| wire_http_key(key)));
    }
}

fn wire_http_key(key: &HttpKey) -> WireHttpKey {
    WireHttpKey {
        source: WireAddr {
            ip: key.source_ip.to_string(),
            port: 0,
        },
        dest: WireAddr {
            ip: key.dest_ip.to_string(),
            port: i32::from(key.dest_port),
        },
    }
}
