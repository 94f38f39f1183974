// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{fmt, str::FromStr};

use crate::configuration::supported_configurations::SupportedConfigurations;
use crate::dd_debug;

/// Where a configuration value was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSourceOrigin {
    EnvVar,
}

impl fmt::Display for ConfigSourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigSourceOrigin::EnvVar => "env_var",
        })
    }
}

/// A raw key/value store for configuration
pub(crate) trait ConfigurationSource {
    fn origin(&self) -> ConfigSourceOrigin;

    fn lookup(&self, key: &str) -> Option<String>;
}

pub(crate) struct EnvSource;

impl ConfigurationSource for EnvSource {
    fn origin(&self) -> ConfigSourceOrigin {
        ConfigSourceOrigin::EnvVar
    }

    fn lookup(&self, key: &str) -> Option<String> {
        #[allow(clippy::disallowed_methods)]
        std::env::var(key).ok()
    }
}

/// In-memory source, used to configure tests without touching the environment
#[cfg(test)]
pub(crate) struct HashMapSource {
    values: std::collections::HashMap<String, String>,
    origin: ConfigSourceOrigin,
}

#[cfg(test)]
impl HashMapSource {
    pub(crate) fn from_iter<K: ToString, V: ToString>(
        values: impl IntoIterator<Item = (K, V)>,
        origin: ConfigSourceOrigin,
    ) -> Self {
        HashMapSource {
            values: values
                .into_iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            origin,
        }
    }
}

#[cfg(test)]
impl ConfigurationSource for HashMapSource {
    fn origin(&self) -> ConfigSourceOrigin {
        self.origin
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// A raw value some source held that did not parse
#[derive(Debug, PartialEq)]
pub(crate) struct Rejected {
    pub raw: String,
    pub reason: String,
    pub origin: ConfigSourceOrigin,
}

/// Outcome of resolving one configuration key across every source
#[derive(Debug, PartialEq)]
pub(crate) struct Resolved<T> {
    pub name: SupportedConfigurations,
    pub value: Option<(T, ConfigSourceOrigin)>,
    pub rejected: Vec<Rejected>,
}

impl<T> Resolved<T> {
    /// Keeps the parsed value, logging what was rejected on the way
    pub fn into_value(self) -> Option<T> {
        for rejected in &self.rejected {
            dd_debug!(
                "Configuration: ignoring {}={:?} from {} as {}: {}",
                self.name.as_str(),
                rejected.raw,
                rejected.origin,
                std::any::type_name::<T>(),
                rejected.reason
            );
        }
        self.value.map(|(value, _)| value)
    }
}

/// Sources ordered by precedence, the first one holding a valid value wins
pub(crate) struct CompositeSource {
    sources: Vec<Box<dyn ConfigurationSource>>,
}

impl CompositeSource {
    pub fn new() -> Self {
        CompositeSource {
            sources: Vec::new(),
        }
    }

    pub fn default_sources() -> Self {
        let mut sources = Self::new();
        sources.add_source(EnvSource);
        sources
    }

    pub fn add_source<C: ConfigurationSource + 'static>(&mut self, source: C) {
        self.sources.push(Box::new(source));
    }

    #[cfg(test)]
    pub fn get(&self, name: SupportedConfigurations) -> Resolved<String> {
        self.get_parse(name)
    }

    /// Parses the first value that can be parsed, remembering those that could not
    pub fn get_parse<T>(&self, name: SupportedConfigurations) -> Resolved<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let mut rejected = Vec::new();
        let value = self.sources.iter().find_map(|source| {
            let raw = source.lookup(name.as_str())?;
            match raw.parse::<T>() {
                Ok(value) => Some((value, source.origin())),
                Err(e) => {
                    rejected.push(Rejected {
                        reason: e.to_string(),
                        raw,
                        origin: source.origin(),
                    });
                    None
                }
            }
        });
        Resolved {
            name,
            value,
            rejected,
        }
    }
}
