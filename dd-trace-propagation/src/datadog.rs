// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{str::FromStr, sync::Arc};

use dd_trace::{
    configuration::TracePropagationStyle,
    constants::{
        HIGHER_ORDER_TRACE_ID_BITS_TAG, PROPAGATION_ERROR_TAG_KEY, PROPAGATION_TAG_PREFIX,
        SAMPLING_DECISION_MAKER_TAG_KEY,
    },
    dd_debug, dd_warn,
    log::Level,
    sampling::{SamplingMechanism, SamplingPriority},
};
use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    cache::HeaderCache,
    carrier::HeaderWriter,
    codec::{Extractor, Injector},
    config::PropagationConfig,
    context::{combine_trace_id, Extracted, PropagationTags, Sampling, SpanContext},
    encoding::encode,
    error::Error,
    extraction::ExtractedHeaders,
};

// Datadog Keys
const DATADOG_TRACE_ID_KEY: &str = "x-datadog-trace-id";
const DATADOG_PARENT_ID_KEY: &str = "x-datadog-parent-id";
const DATADOG_SAMPLING_PRIORITY_KEY: &str = "x-datadog-sampling-priority";
const DATADOG_ORIGIN_KEY: &str = "x-datadog-origin";
const DATADOG_TAGS_KEY: &str = "x-datadog-tags";
pub const OT_BAGGAGE_PREFIX: &str = "ot-baggage-";

const PROPAGATOR_NAME: &str = "datadog";

lazy_static! {
    static ref VALID_SAMPLING_DECISION_REGEX: Regex =
        Regex::new(r"^-[0-9]+$").expect("failed creating regex");
    static ref VALID_HIGHER_ORDER_BITS_REGEX: Regex =
        Regex::new(r"^[0-9a-f]{16}$").expect("failed creating regex");
}

/// `x-datadog-*` headers
pub struct DatadogCodec {
    config: Arc<PropagationConfig>,
}

impl DatadogCodec {
    pub const KEYS: &'static [&'static str] = &[
        DATADOG_TRACE_ID_KEY,
        DATADOG_PARENT_ID_KEY,
        DATADOG_SAMPLING_PRIORITY_KEY,
        DATADOG_ORIGIN_KEY,
        DATADOG_TAGS_KEY,
    ];

    pub fn new(config: Arc<PropagationConfig>) -> Self {
        Self { config }
    }

    fn inject_tags(&self, context: &SpanContext, headers: &mut dyn HeaderWriter) {
        let max_length = self.config.datadog_tags_max_length;
        if max_length == 0 {
            dd_debug!("Propagator (datadog): x-datadog-tags injection is disabled");
            return;
        }

        let higher_bits = context.trace_id.high_bits().map(|bits| format!("{bits:016x}"));
        let tags = context
            .propagation_tags
            .iter()
            .filter(|(key, _)| *key != HIGHER_ORDER_TRACE_ID_BITS_TAG)
            .map(|(key, value)| format!("{key}={value}"))
            .chain(
                higher_bits.map(|bits| format!("{HIGHER_ORDER_TRACE_ID_BITS_TAG}={bits}")),
            )
            .collect::<Vec<_>>()
            .join(",");

        if tags.is_empty() {
            return;
        }

        if tags.len() > max_length {
            dd_warn!(
                "Propagator (datadog): x-datadog-tags of {} bytes exceeds the {max_length} bytes limit, inject_max_size",
                tags.len()
            );
            return;
        }

        headers.set(DATADOG_TAGS_KEY, tags);
    }
}

impl Injector for DatadogCodec {
    fn style(&self) -> TracePropagationStyle {
        TracePropagationStyle::Datadog
    }

    fn inject(&self, context: &SpanContext, headers: &mut dyn HeaderWriter) -> Result<(), Error> {
        headers.set(DATADOG_TRACE_ID_KEY, context.trace_id.to_u64().to_string());
        headers.set(DATADOG_PARENT_ID_KEY, context.span_id.to_string());

        if let Some(priority) = context.sampling.priority {
            headers.set(DATADOG_SAMPLING_PRIORITY_KEY, priority.to_string());
        }

        if let Some(origin) = &context.origin {
            headers.set(DATADOG_ORIGIN_KEY, origin.clone());
        }

        self.inject_tags(context, headers);

        for (key, value) in &context.baggage {
            match self.config.baggage_header(key) {
                Some(header) => headers.set(header, encode(value)),
                None => headers.set(&format!("{OT_BAGGAGE_PREFIX}{key}"), encode(value)),
            }
        }

        Ok(())
    }

    fn keys(&self) -> &'static [&'static str] {
        Self::KEYS
    }
}

impl Extractor for DatadogCodec {
    fn style(&self) -> TracePropagationStyle {
        TracePropagationStyle::Datadog
    }

    fn extract(&self, headers: &HeaderCache) -> Result<Extracted, Error> {
        let collected = ExtractedHeaders::collect(headers, &self.config, Some(OT_BAGGAGE_PREFIX));
        let origin = headers.get(DATADOG_ORIGIN_KEY).map(str::to_string);

        let lower_trace_id = match extract_trace_id(headers)? {
            Some(trace_id) => trace_id,
            None => return Ok(collected.into_partial(origin, TracePropagationStyle::Datadog)),
        };

        let span_id = extract_parent_id(headers)?;
        let priority = extract_sampling_priority(headers)?;

        let (propagation_tags, propagation_error) =
            extract_tags(headers.get(DATADOG_TAGS_KEY), self.config.datadog_tags_max_length);

        let trace_id = combine_trace_id(
            lower_trace_id,
            propagation_tags.higher_order_trace_id_bits(),
        );

        let mechanism = propagation_tags
            .get(SAMPLING_DECISION_MAKER_TAG_KEY)
            .and_then(|dm| SamplingMechanism::from_str(dm).ok());

        let mut context = SpanContext {
            trace_id,
            span_id,
            sampling: Sampling {
                priority,
                mechanism,
            },
            origin,
            propagation_tags,
            style: Some(TracePropagationStyle::Datadog),
            is_remote: true,
            ..Default::default()
        };

        if let Some(error) = propagation_error {
            context
                .tags
                .insert(PROPAGATION_ERROR_TAG_KEY.to_string(), error);
        }

        Ok(collected.into_full(context))
    }
}

/// `None` when the trace id is absent or zero
fn extract_trace_id(headers: &HeaderCache) -> Result<Option<u64>, Error> {
    let Some(trace_id) = headers.get(DATADOG_TRACE_ID_KEY) else {
        return Ok(None);
    };

    let trace_id = trace_id.trim().parse::<u64>().map_err(|_| {
        Error::extract_with_level("Failed to decode `trace_id`", PROPAGATOR_NAME, Level::Debug)
    })?;

    Ok((trace_id != 0).then_some(trace_id))
}

fn extract_parent_id(headers: &HeaderCache) -> Result<u64, Error> {
    match headers.get(DATADOG_PARENT_ID_KEY) {
        Some(parent_id) => parent_id.trim().parse::<u64>().map_err(|_| {
            Error::extract_with_level("Failed to decode `parent_id`", PROPAGATOR_NAME, Level::Debug)
        }),
        None => Ok(0),
    }
}

fn extract_sampling_priority(headers: &HeaderCache) -> Result<Option<SamplingPriority>, Error> {
    match headers.get(DATADOG_SAMPLING_PRIORITY_KEY) {
        Some(priority) => SamplingPriority::from_str(priority)
            .map(Some)
            .map_err(|_| {
                Error::extract_with_level(
                    "Failed to decode `sampling_priority`",
                    PROPAGATOR_NAME,
                    Level::Debug,
                )
            }),
        None => Ok(None),
    }
}

/// Parses `x-datadog-tags`, keeping `_dd.p.*` entries only.
///
/// Returns the tags and the value of `_dd.propagation_error`, if any.
pub(crate) fn extract_tags(
    header: Option<&str>,
    max_length: usize,
) -> (PropagationTags, Option<String>) {
    let mut tags = PropagationTags::new();

    let Some(header) = header.filter(|header| !header.is_empty()) else {
        return (tags, None);
    };

    if max_length == 0 {
        return (tags, Some("disabled".to_string()));
    }

    if header.len() > max_length {
        dd_warn!(
            "Propagator (datadog): x-datadog-tags of {} bytes exceeds the {max_length} bytes limit",
            header.len()
        );
        return (tags, Some("extract_max_size".to_string()));
    }

    for pair in header.split(',') {
        match pair.split_once('=') {
            Some((key, value)) if key.starts_with(PROPAGATION_TAG_PREFIX) => {
                tags.insert(key, value);
            }
            Some(_) => {}
            None => {
                dd_debug!("Propagator (datadog): malformed x-datadog-tags entry {pair}");
                return (PropagationTags::new(), Some("decoding_error".to_string()));
            }
        }
    }

    let mut error = None;

    // Handle 128bit trace ID
    if let Some(higher_bits) = tags.higher_order_trace_id_bits() {
        if !VALID_HIGHER_ORDER_BITS_REGEX.is_match(higher_bits) {
            dd_warn!("Malformed Trace ID: {higher_bits} Failed to decode trace ID from carrier.");
            error = Some(format!("malformed_tid {higher_bits}"));
            tags.remove(HIGHER_ORDER_TRACE_ID_BITS_TAG);
        }
    }

    if let Some(decision) = tags.get(SAMPLING_DECISION_MAKER_TAG_KEY) {
        if !VALID_SAMPLING_DECISION_REGEX.is_match(decision) {
            dd_warn!("Failed to decode `_dd.p.dm`: {decision}");
            tags.remove(SAMPLING_DECISION_MAKER_TAG_KEY);
            error = Some("decoding_error".to_string());
        }
    }

    (tags, error)
}
