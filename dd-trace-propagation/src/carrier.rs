// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Capabilities used to reach into a host carrier.
//!
//! A carrier is never touched directly: outgoing headers go through a
//! [`Setter`], incoming headers are visited through a [`Getter`]. Closures of
//! the right shape implement both traits, so any header map can be adapted in
//! place.
//!
//! Code inspired by the OpenTelemetry Rust project.
//! <https://github.com/open-telemetry/opentelemetry-rust/blob/main/opentelemetry/src/propagation/mod.rs>

use std::{collections::HashMap, hash::BuildHasher};

/// Writes one header into a carrier.
pub trait Setter<C: ?Sized> {
    fn set(&self, carrier: &mut C, key: &str, value: String);
}

/// Visits every header of a carrier, in the carrier's natural order.
///
/// The visitor returns `false` to stop the traversal early.
pub trait Getter<C: ?Sized> {
    fn for_each_key(&self, carrier: &C, visitor: &mut dyn FnMut(&str, &str) -> bool);
}

impl<C: ?Sized, F> Setter<C> for F
where
    F: Fn(&mut C, &str, String),
{
    fn set(&self, carrier: &mut C, key: &str, value: String) {
        self(carrier, key, value)
    }
}

impl<C: ?Sized, F> Getter<C> for F
where
    F: Fn(&C, &mut dyn FnMut(&str, &str) -> bool),
{
    fn for_each_key(&self, carrier: &C, visitor: &mut dyn FnMut(&str, &str) -> bool) {
        self(carrier, visitor)
    }
}

/// Object safe write half handed to each format injector.
pub trait HeaderWriter {
    fn set(&mut self, key: &str, value: String);
}

impl<S: BuildHasher> HeaderWriter for HashMap<String, String, S> {
    /// Set a key and value in the `HashMap`.
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_lowercase(), value);
    }
}

impl HeaderWriter for Vec<(String, String)> {
    fn set(&mut self, key: &str, value: String) {
        self.push((key.to_string(), value));
    }
}

/// Binds a carrier to its setter so both travel as one [`HeaderWriter`].
pub struct SetterWriter<'a, C: ?Sized> {
    carrier: &'a mut C,
    setter: &'a dyn Setter<C>,
}

impl<'a, C: ?Sized> SetterWriter<'a, C> {
    pub fn new(carrier: &'a mut C, setter: &'a dyn Setter<C>) -> Self {
        Self { carrier, setter }
    }
}

impl<C: ?Sized> HeaderWriter for SetterWriter<'_, C> {
    fn set(&mut self, key: &str, value: String) {
        self.setter.set(self.carrier, key, value);
    }
}

/// Setter for `HashMap` carriers, header names are lowercased.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashMapSetter;

impl<S: BuildHasher> Setter<HashMap<String, String, S>> for HashMapSetter {
    fn set(&self, carrier: &mut HashMap<String, String, S>, key: &str, value: String) {
        HeaderWriter::set(carrier, key, value);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HashMapGetter;

impl<S: BuildHasher> Getter<HashMap<String, String, S>> for HashMapGetter {
    fn for_each_key(
        &self,
        carrier: &HashMap<String, String, S>,
        visitor: &mut dyn FnMut(&str, &str) -> bool,
    ) {
        for (key, value) in carrier {
            if !visitor(key, value) {
                break;
            }
        }
    }
}

/// Setter for ordered carriers that keep repeated header names.
#[derive(Debug, Default, Clone, Copy)]
pub struct PairsSetter;

impl Setter<Vec<(String, String)>> for PairsSetter {
    fn set(&self, carrier: &mut Vec<(String, String)>, key: &str, value: String) {
        HeaderWriter::set(carrier, key, value);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PairsGetter;

impl Getter<Vec<(String, String)>> for PairsGetter {
    fn for_each_key(
        &self,
        carrier: &Vec<(String, String)>,
        visitor: &mut dyn FnMut(&str, &str) -> bool,
    ) {
        for (key, value) in carrier {
            if !visitor(key, value) {
                break;
            }
        }
    }
}

#[cfg(feature = "opentelemetry")]
mod otel {
    use super::{Getter, Setter};

    /// Visits an OpenTelemetry extractor through its key list.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct OtelGetter;

    impl<'a> Getter<dyn opentelemetry::propagation::Extractor + 'a> for OtelGetter {
        fn for_each_key(
            &self,
            carrier: &(dyn opentelemetry::propagation::Extractor + 'a),
            visitor: &mut dyn FnMut(&str, &str) -> bool,
        ) {
            for key in carrier.keys() {
                if let Some(value) = carrier.get(key) {
                    if !visitor(key, value) {
                        break;
                    }
                }
            }
        }
    }

    #[derive(Debug, Default, Clone, Copy)]
    pub struct OtelSetter;

    impl<'a> Setter<dyn opentelemetry::propagation::Injector + 'a> for OtelSetter {
        fn set(
            &self,
            carrier: &mut (dyn opentelemetry::propagation::Injector + 'a),
            key: &str,
            value: String,
        ) {
            carrier.set(key, value);
        }
    }
}

#[cfg(feature = "opentelemetry")]
pub use otel::{OtelGetter, OtelSetter};

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn hash_map_set() {
        let mut carrier: HashMap<String, String> = HashMap::new();
        HashMapSetter.set(&mut carrier, "headerName", "value".to_string());

        assert_eq!(
            carrier.get("headername").map(String::as_str),
            Some("value"),
            "keys are lowercased"
        );
    }

    #[test]
    fn hash_map_visits_every_key() {
        let carrier = HashMap::from([
            ("headername1".to_string(), "value1".to_string()),
            ("headername2".to_string(), "value2".to_string()),
        ]);

        let mut got = vec![];
        HashMapGetter.for_each_key(&carrier, &mut |key, value| {
            got.push((key.to_string(), value.to_string()));
            true
        });
        got.sort();

        assert_eq!(
            got,
            vec![
                ("headername1".to_string(), "value1".to_string()),
                ("headername2".to_string(), "value2".to_string()),
            ]
        );
    }

    #[test]
    fn pairs_keep_order_and_duplicates() {
        let mut carrier = vec![];
        PairsSetter.set(&mut carrier, "X-Forwarded-For", "10.0.0.1".to_string());
        PairsSetter.set(&mut carrier, "x-forwarded-for", "10.0.0.2".to_string());

        let mut got = vec![];
        PairsGetter.for_each_key(&carrier, &mut |key, value| {
            got.push(format!("{key}={value}"));
            true
        });

        assert_eq!(
            got,
            vec!["X-Forwarded-For=10.0.0.1", "x-forwarded-for=10.0.0.2"]
        );
    }

    #[test]
    fn visitor_can_stop_early() {
        let carrier = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
            ("c".to_string(), "3".to_string()),
        ];

        let mut visited = 0;
        PairsGetter.for_each_key(&carrier, &mut |_, _| {
            visited += 1;
            visited < 2
        });

        assert_eq!(visited, 2);
    }

    #[test]
    fn closures_are_capabilities() {
        let setter = |carrier: &mut Vec<String>, key: &str, value: String| {
            carrier.push(format!("{key}: {value}"));
        };
        let mut carrier = vec![];
        {
            let mut writer = SetterWriter::new(&mut carrier, &setter);
            writer.set("traceparent", "00-01-02-01".to_string());
        }
        assert_eq!(carrier, vec!["traceparent: 00-01-02-01".to_string()]);

        let getter = |carrier: &Vec<String>, visitor: &mut dyn FnMut(&str, &str) -> bool| {
            for line in carrier {
                if let Some((key, value)) = line.split_once(": ") {
                    if !visitor(key, value) {
                        break;
                    }
                }
            }
        };
        let mut seen = vec![];
        getter.for_each_key(&carrier, &mut |key, value| {
            seen.push((key.to_string(), value.to_string()));
            true
        });
        assert_eq!(
            seen,
            vec![("traceparent".to_string(), "00-01-02-01".to_string())]
        );
    }
}
