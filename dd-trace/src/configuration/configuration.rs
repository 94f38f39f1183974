// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{fmt::Display, str::FromStr};

use super::sources::CompositeSource;
use super::supported_configurations::SupportedConfigurations;
use crate::{dd_warn, log::LevelFilter};

/// Upper bound applied to `DD_TRACE_X_DATADOG_TAGS_MAX_LENGTH`
pub const MAX_DATADOG_TAGS_LENGTH: usize = 512;

/// Prefix of the span tag name used when a header tag is configured without one
const DEFAULT_HEADER_TAG_PREFIX: &str = "http.request.headers.";

/// Trace context header format.
///
/// | Style | Headers |
/// |-------|---------|
/// | Datadog | `x-datadog-*` |
/// | B3Multi | `x-b3-traceid`, `x-b3-spanid`, `x-b3-sampled`, `x-b3-flags` |
/// | B3Single | `b3` |
/// | Haystack | `Trace-ID`, `Span-ID`, `Baggage-*` |
/// | Xray | `X-Amzn-Trace-Id` |
/// | TraceContext | `traceparent`, `tracestate` |
/// | None | - |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TracePropagationStyle {
    Datadog,
    B3Multi,
    B3Single,
    Haystack,
    Xray,
    TraceContext,
    /// Disables propagation when it is the only configured style
    None,
}

impl TracePropagationStyle {
    pub const ALL: [TracePropagationStyle; 6] = [
        TracePropagationStyle::Datadog,
        TracePropagationStyle::B3Multi,
        TracePropagationStyle::B3Single,
        TracePropagationStyle::Haystack,
        TracePropagationStyle::Xray,
        TracePropagationStyle::TraceContext,
    ];

    fn from_tags(tags: Option<Vec<String>>) -> Option<Vec<TracePropagationStyle>> {
        match tags {
            Some(tags) if !tags.is_empty() => Some(
                tags.iter()
                    .filter_map(|value| match TracePropagationStyle::from_str(value) {
                        Ok(style) => Some(style),
                        Err(err) => {
                            dd_warn!("Error parsing: {err}");
                            None
                        }
                    })
                    .fold(Vec::new(), |mut styles, style| {
                        if !styles.contains(&style) {
                            styles.push(style);
                        }
                        styles
                    }),
            ),
            Some(_) => None,
            None => None,
        }
    }
}

impl FromStr for TracePropagationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "datadog" => Ok(TracePropagationStyle::Datadog),
            "b3multi" => Ok(TracePropagationStyle::B3Multi),
            "b3" | "b3single" | "b3 single header" => Ok(TracePropagationStyle::B3Single),
            "haystack" => Ok(TracePropagationStyle::Haystack),
            "xray" => Ok(TracePropagationStyle::Xray),
            "tracecontext" => Ok(TracePropagationStyle::TraceContext),
            "none" => Ok(TracePropagationStyle::None),
            _ => Err(format!("Unknown trace propagation style: '{s}'")),
        }
    }
}

impl Display for TracePropagationStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let style = match self {
            TracePropagationStyle::Datadog => "datadog",
            TracePropagationStyle::B3Multi => "b3multi",
            TracePropagationStyle::B3Single => "b3",
            TracePropagationStyle::Haystack => "haystack",
            TracePropagationStyle::Xray => "xray",
            TracePropagationStyle::TraceContext => "tracecontext",
            TracePropagationStyle::None => "none",
        };
        write!(f, "{style}")
    }
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
/// Configuration of the trace context propagation layer
///
/// # Usage
/// ```
/// use dd_trace::{configuration::TracePropagationStyle, Config};
///
/// // This pulls configuration from the environment
/// let mut builder = Config::builder();
///
/// // Manual overrides
/// builder
///     .set_trace_propagation_style(vec![TracePropagationStyle::TraceContext])
///     .set_trace_propagation_extract_first(true);
///
/// // Finalize the configuration
/// let config = builder.build();
/// ```
pub struct Config {
    /// The log level for the tracer
    log_level_filter: LevelFilter,

    // # Propagation
    /// Styles used for both extraction and injection
    trace_propagation_style: Option<Vec<TracePropagationStyle>>,
    /// Overrides `trace_propagation_style` for extraction
    trace_propagation_style_extract: Option<Vec<TracePropagationStyle>>,
    /// Overrides `trace_propagation_style` for injection
    trace_propagation_style_inject: Option<Vec<TracePropagationStyle>>,
    /// Stop at the first style yielding a full context
    trace_propagation_extract_first: bool,
    /// Pad B3 ids to their full hex width on injection
    trace_propagation_b3_padding_enabled: bool,
    /// Lowercased header name to span tag name
    trace_header_tags: Vec<(String, String)>,
    /// Lowercased header name to baggage key
    trace_header_baggage: Vec<(String, String)>,
    trace_x_datadog_tags_max_length: usize,
}

impl Config {
    fn from_sources(sources: &CompositeSource) -> Self {
        let default = Config::default();

        /// Wrapper to parse "," separated string to vector
        struct DdTags(Vec<String>);

        impl FromStr for DdTags {
            type Err = &'static str;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(DdTags(
                    s.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect::<Vec<String>>(),
                ))
            }
        }

        /// Wrapper to parse "," separated header:value pairs, keeping the value optional
        struct DdHeaderMapping(Vec<(String, Option<String>)>);

        impl FromStr for DdHeaderMapping {
            type Err = &'static str;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(DdHeaderMapping(
                    s.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|entry| match entry.split_once(':') {
                            Some((header, value)) => (
                                header.trim().to_lowercase(),
                                Some(value.trim().to_string()).filter(|v| !v.is_empty()),
                            ),
                            None => (entry.to_lowercase(), None),
                        })
                        .filter(|(header, _)| !header.is_empty())
                        .collect(),
                ))
            }
        }

        fn styles(
            sources: &CompositeSource,
            key: SupportedConfigurations,
        ) -> Option<Option<Vec<TracePropagationStyle>>> {
            sources
                .get_parse::<DdTags>(key)
                .into_value()
                .map(|DdTags(tags)| TracePropagationStyle::from_tags(Some(tags)))
        }

        let trace_header_tags = sources
            .get_parse::<DdHeaderMapping>(SupportedConfigurations::DD_TRACE_HEADER_TAGS)
            .into_value()
            .map(|DdHeaderMapping(mapping)| {
                mapping
                    .into_iter()
                    .map(|(header, tag)| {
                        let tag =
                            tag.unwrap_or_else(|| default_header_tag_name(header.as_str()));
                        (header, tag)
                    })
                    .collect()
            })
            .unwrap_or(default.trace_header_tags);

        let trace_header_baggage = sources
            .get_parse::<DdHeaderMapping>(SupportedConfigurations::DD_TRACE_HEADER_BAGGAGE)
            .into_value()
            .map(|DdHeaderMapping(mapping)| {
                mapping
                    .into_iter()
                    .filter_map(|(header, key)| match key {
                        Some(key) => Some((header, key)),
                        None => {
                            dd_warn!("Ignoring header baggage mapping without a key: {header}");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or(default.trace_header_baggage);

        Self {
            log_level_filter: sources
                .get_parse(SupportedConfigurations::DD_LOG_LEVEL)
                .into_value()
                .unwrap_or(default.log_level_filter),
            trace_propagation_style: styles(
                sources,
                SupportedConfigurations::DD_TRACE_PROPAGATION_STYLE,
            )
            .unwrap_or(default.trace_propagation_style),
            trace_propagation_style_extract: styles(
                sources,
                SupportedConfigurations::DD_TRACE_PROPAGATION_STYLE_EXTRACT,
            )
            .unwrap_or(default.trace_propagation_style_extract),
            trace_propagation_style_inject: styles(
                sources,
                SupportedConfigurations::DD_TRACE_PROPAGATION_STYLE_INJECT,
            )
            .unwrap_or(default.trace_propagation_style_inject),
            trace_propagation_extract_first: sources
                .get_parse(SupportedConfigurations::DD_TRACE_PROPAGATION_EXTRACT_FIRST)
                .into_value()
                .unwrap_or(default.trace_propagation_extract_first),
            trace_propagation_b3_padding_enabled: sources
                .get_parse(SupportedConfigurations::DD_TRACE_PROPAGATION_STYLE_B3_PADDING_ENABLED)
                .into_value()
                .unwrap_or(default.trace_propagation_b3_padding_enabled),
            trace_header_tags,
            trace_header_baggage,
            trace_x_datadog_tags_max_length: sources
                .get_parse::<usize>(SupportedConfigurations::DD_TRACE_X_DATADOG_TAGS_MAX_LENGTH)
                .into_value()
                .map(|len| len.min(MAX_DATADOG_TAGS_LENGTH))
                .unwrap_or(default.trace_x_datadog_tags_max_length),
        }
    }

    fn builder_with_sources(sources: &CompositeSource) -> ConfigBuilder {
        ConfigBuilder {
            config: Config::from_sources(sources),
        }
    }

    /// Creates a new builder to set overrides detected configuration
    pub fn builder() -> ConfigBuilder {
        Self::builder_with_sources(&CompositeSource::default_sources())
    }

    pub fn log_level_filter(&self) -> &LevelFilter {
        &self.log_level_filter
    }

    pub fn trace_propagation_style(&self) -> Option<&[TracePropagationStyle]> {
        self.trace_propagation_style.as_deref()
    }

    pub fn trace_propagation_style_extract(&self) -> Option<&[TracePropagationStyle]> {
        self.trace_propagation_style_extract.as_deref()
    }

    pub fn trace_propagation_style_inject(&self) -> Option<&[TracePropagationStyle]> {
        self.trace_propagation_style_inject.as_deref()
    }

    pub fn trace_propagation_extract_first(&self) -> bool {
        self.trace_propagation_extract_first
    }

    pub fn trace_propagation_b3_padding_enabled(&self) -> bool {
        self.trace_propagation_b3_padding_enabled
    }

    pub fn trace_header_tags(&self) -> &[(String, String)] {
        &self.trace_header_tags
    }

    pub fn trace_header_baggage(&self) -> &[(String, String)] {
        &self.trace_header_baggage
    }

    pub fn trace_x_datadog_tags_max_length(&self) -> usize {
        self.trace_x_datadog_tags_max_length
    }
}

fn default_header_tag_name(header: &str) -> String {
    let normalized: String = header
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{DEFAULT_HEADER_TAG_PREFIX}{normalized}")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level_filter: LevelFilter::default(),
            trace_propagation_style: Some(vec![
                TracePropagationStyle::Datadog,
                TracePropagationStyle::TraceContext,
            ]),
            trace_propagation_style_extract: None,
            trace_propagation_style_inject: None,
            trace_propagation_extract_first: false,
            trace_propagation_b3_padding_enabled: true,
            trace_header_tags: Vec::new(),
            trace_header_baggage: Vec::new(),
            trace_x_datadog_tags_max_length: MAX_DATADOG_TAGS_LENGTH,
        }
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Finalizes the builder and returns the configuration
    pub fn build(self) -> Config {
        crate::log::set_max_level(self.config.log_level_filter);
        self.config
    }

    pub fn set_log_level_filter(&mut self, filter: LevelFilter) -> &mut Self {
        self.config.log_level_filter = filter;
        self
    }

    /// A list of propagation styles to use for both extraction and injection.
    ///
    /// Env variable: `DD_TRACE_PROPAGATION_STYLE`
    pub fn set_trace_propagation_style(&mut self, styles: Vec<TracePropagationStyle>) -> &mut Self {
        self.config.trace_propagation_style = Some(styles);
        self
    }

    /// Env variable: `DD_TRACE_PROPAGATION_STYLE_EXTRACT`
    pub fn set_trace_propagation_style_extract(
        &mut self,
        styles: Vec<TracePropagationStyle>,
    ) -> &mut Self {
        self.config.trace_propagation_style_extract = Some(styles);
        self
    }

    /// Env variable: `DD_TRACE_PROPAGATION_STYLE_INJECT`
    pub fn set_trace_propagation_style_inject(
        &mut self,
        styles: Vec<TracePropagationStyle>,
    ) -> &mut Self {
        self.config.trace_propagation_style_inject = Some(styles);
        self
    }

    /// Env variable: `DD_TRACE_PROPAGATION_EXTRACT_FIRST`
    pub fn set_trace_propagation_extract_first(&mut self, extract_first: bool) -> &mut Self {
        self.config.trace_propagation_extract_first = extract_first;
        self
    }

    pub fn set_trace_propagation_b3_padding_enabled(&mut self, enabled: bool) -> &mut Self {
        self.config.trace_propagation_b3_padding_enabled = enabled;
        self
    }

    /// Header names are matched case-insensitively
    pub fn set_trace_header_tags(&mut self, tags: Vec<(String, String)>) -> &mut Self {
        self.config.trace_header_tags = tags
            .into_iter()
            .map(|(header, tag)| (header.to_lowercase(), tag))
            .collect();
        self
    }

    pub fn set_trace_header_baggage(&mut self, baggage: Vec<(String, String)>) -> &mut Self {
        self.config.trace_header_baggage = baggage
            .into_iter()
            .map(|(header, key)| (header.to_lowercase(), key))
            .collect();
        self
    }

    pub fn set_trace_x_datadog_tags_max_length(&mut self, max_length: usize) -> &mut Self {
        self.config.trace_x_datadog_tags_max_length = max_length.min(MAX_DATADOG_TAGS_LENGTH);
        self
    }
}

impl From<Config> for ConfigBuilder {
    fn from(config: Config) -> Self {
        ConfigBuilder { config }
    }
}
