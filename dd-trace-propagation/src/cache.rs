// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::carrier::Getter;

/// Most requests carry fewer headers than this
const DEFAULT_CAPACITY: usize = 32;

/// Snapshot of an inbound carrier taken in a single traversal.
///
/// Header names and values are stored verbatim and in visitation order,
/// repeated names included. Every format extractor reads from the snapshot,
/// so the underlying carrier is visited once no matter how many formats are
/// enabled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderCache {
    keys_and_values: Vec<(String, String)>,
}

impl HeaderCache {
    pub fn new<C: ?Sized>(carrier: &C, getter: &dyn Getter<C>) -> Self {
        let mut keys_and_values = Vec::with_capacity(DEFAULT_CAPACITY);
        getter.for_each_key(carrier, &mut |key, value| {
            keys_and_values.push((key.to_string(), value.to_string()));
            true
        });
        Self { keys_and_values }
    }

    /// Replays the captured headers, stopping when `visitor` returns `false`.
    pub fn for_each_key(&self, visitor: &mut dyn FnMut(&str, &str) -> bool) {
        for (key, value) in &self.keys_and_values {
            if !visitor(key, value) {
                break;
            }
        }
    }

    /// First value of a header, the name is matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.keys_and_values
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys_and_values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.keys_and_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys_and_values.is_empty()
    }
}

impl Getter<HeaderCache> for HeaderCache {
    fn for_each_key(&self, carrier: &HeaderCache, visitor: &mut dyn FnMut(&str, &str) -> bool) {
        carrier.for_each_key(visitor)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderCache {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            keys_and_values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}
