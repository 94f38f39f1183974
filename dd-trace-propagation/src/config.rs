// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use dd_trace::{
    configuration::{TracePropagationStyle, MAX_DATADOG_TAGS_LENGTH},
    Config,
};
use lazy_static::lazy_static;

#[cfg(feature = "serde_config")]
use crate::trace_propagation_style::deserialize_trace_propagation_style;

#[cfg(feature = "serde_config")]
use serde::Deserialize;

lazy_static! {
    pub static ref DEFAULT_PROPAGATION_STYLES: Vec<TracePropagationStyle> = vec![
        TracePropagationStyle::Datadog,
        TracePropagationStyle::TraceContext,
    ];
}

/// Propagation settings, resolved once from [`Config`] and shared by every
/// codec.
#[derive(Debug, PartialEq, Clone)]
#[cfg_attr(feature = "serde_config", derive(Deserialize), serde(default))]
pub struct PropagationConfig {
    #[cfg_attr(
        feature = "serde_config",
        serde(deserialize_with = "deserialize_trace_propagation_style")
    )]
    pub style: Option<Vec<TracePropagationStyle>>,
    #[cfg_attr(
        feature = "serde_config",
        serde(deserialize_with = "deserialize_trace_propagation_style")
    )]
    pub style_extract: Option<Vec<TracePropagationStyle>>,
    #[cfg_attr(
        feature = "serde_config",
        serde(deserialize_with = "deserialize_trace_propagation_style")
    )]
    pub style_inject: Option<Vec<TracePropagationStyle>>,
    pub extract_first: bool,

    /// Lowercase header name to span tag
    pub header_tags: HashMap<String, String>,
    /// Lowercase header name to baggage key
    pub baggage_mapping: HashMap<String, String>,
    /// Baggage key to header name
    pub inverted_baggage_mapping: HashMap<String, String>,
    pub b3_padding_enabled: bool,
    pub datadog_tags_max_length: usize,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        PropagationConfig {
            style: None,
            style_extract: None,
            style_inject: None,
            extract_first: false,
            header_tags: HashMap::new(),
            baggage_mapping: HashMap::new(),
            inverted_baggage_mapping: HashMap::new(),
            b3_padding_enabled: true,
            datadog_tags_max_length: MAX_DATADOG_TAGS_LENGTH,
        }
    }
}

impl PropagationConfig {
    pub fn from(config: &Config) -> Self {
        let baggage_mapping: HashMap<String, String> = config
            .trace_header_baggage()
            .iter()
            .map(|(header, key)| (header.to_lowercase(), key.clone()))
            .collect();

        PropagationConfig {
            style: config
                .trace_propagation_style()
                .map(<[TracePropagationStyle]>::to_vec),
            style_extract: config
                .trace_propagation_style_extract()
                .map(<[TracePropagationStyle]>::to_vec),
            style_inject: config
                .trace_propagation_style_inject()
                .map(<[TracePropagationStyle]>::to_vec),
            extract_first: config.trace_propagation_extract_first(),
            header_tags: config
                .trace_header_tags()
                .iter()
                .map(|(header, tag)| (header.to_lowercase(), tag.clone()))
                .collect(),
            inverted_baggage_mapping: invert(&baggage_mapping),
            baggage_mapping,
            b3_padding_enabled: config.trace_propagation_b3_padding_enabled(),
            datadog_tags_max_length: config
                .trace_x_datadog_tags_max_length()
                .min(MAX_DATADOG_TAGS_LENGTH),
        }
    }

    /// Extraction order: the extract list, else the shared list, else the
    /// defaults
    pub fn get_extractors(&self) -> &[TracePropagationStyle] {
        if let Some(extractors) = &self.style_extract {
            extractors.as_slice()
        } else if let Some(styles) = &self.style {
            styles.as_slice()
        } else {
            DEFAULT_PROPAGATION_STYLES.as_slice()
        }
    }

    pub fn get_injectors(&self) -> &[TracePropagationStyle] {
        if let Some(injectors) = &self.style_inject {
            injectors.as_slice()
        } else if let Some(styles) = &self.style {
            styles.as_slice()
        } else {
            DEFAULT_PROPAGATION_STYLES.as_slice()
        }
    }

    /// Header name under which a baggage item is injected, when one is mapped
    pub fn baggage_header(&self, key: &str) -> Option<&str> {
        self.inverted_baggage_mapping.get(key).map(String::as_str)
    }
}

fn invert(mapping: &HashMap<String, String>) -> HashMap<String, String> {
    mapping
        .iter()
        .map(|(header, key)| (key.clone(), header.clone()))
        .collect()
}
