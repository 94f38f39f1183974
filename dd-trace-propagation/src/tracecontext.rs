// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{collections::HashMap, str::FromStr, sync::Arc};

use lazy_static::lazy_static;
use regex::Regex;

use dd_trace::{
    configuration::TracePropagationStyle,
    constants::{PROPAGATION_TAG_PREFIX, SAMPLING_DECISION_MAKER_TAG_KEY},
    dd_debug, dd_warn,
    sampling::{mechanism, priority, SamplingMechanism, SamplingPriority},
};

use crate::{
    cache::HeaderCache,
    carrier::HeaderWriter,
    codec::{Extractor, Injector},
    config::PropagationConfig,
    context::{
        decode_tag_value, encode_tag_value, Extracted, PropagationTags, Sampling, SpanContext,
        TraceId,
    },
    datadog::OT_BAGGAGE_PREFIX,
    encoding::encode_baggage,
    error::Error,
    extraction::ExtractedHeaders,
};

// Traceparent Keys
pub const TRACEPARENT_KEY: &str = "traceparent";
pub const TRACESTATE_KEY: &str = "tracestate";
pub const DATADOG_LAST_PARENT_ID_KEY: &str = "_dd.parent_id";

const PROPAGATOR_NAME: &str = "tracecontext";

const TRACESTATE_DD_KEY_MAX_LENGTH: usize = 256;
const TRACESTATE_MAX_FOREIGN_MEMBERS: usize = 31;
const TRACESTATE_VALUES_SEPARATOR: &str = ",";
const TRACESTATE_DD_PAIR_SEPARATOR: &str = ";";
const TRACESTATE_SAMPLING_PRIORITY_KEY: &str = "s";
const TRACESTATE_ORIGIN_KEY: &str = "o";
const TRACESTATE_LAST_PARENT_KEY: &str = "p";
const TRACESTATE_DATADOG_PROPAGATION_TAG_PREFIX: &str = "t.";
const INVALID_CHAR_REPLACEMENT: &str = "_";

lazy_static! {
    static ref TRACEPARENT_REGEX: Regex =
        Regex::new(r"^([a-f0-9]{2})-([a-f0-9]{32})-([a-f0-9]{16})-([a-f0-9]{2})(-.*)?$")
            .expect("failed creating regex");

    static ref INVALID_ASCII_CHARACTERS_REGEX: Regex =
        Regex::new(r"[^\x20-\x7E]+").expect("failed creating regex");

    // Origin value in tracestate replaces '~', ',' and ';' with '_"
    static ref TRACESTATE_ORIGIN_FILTER_REGEX: Regex =
        Regex::new(r"[^\x20-\x2b\x2d-\x3a\x3c-\x7d]").expect("failed creating regex");

    static ref TRACESTATE_TAG_KEY_FILTER_REGEX: Regex =
        Regex::new(r"[^\x21-\x2b\x2d-\x3c\x3e-\x7e]").expect("failed creating regex");

    static ref TRACESTATE_TAG_VALUE_FILTER_REGEX: Regex =
        Regex::new(r"[^\x20-\x2b\x2d-\x3a\x3c-\x7d]").expect("failed creating regex");
}

#[derive(Clone, Debug, PartialEq)]
struct Traceparent {
    sampling_priority: SamplingPriority,
    trace_id: u128,
    span_id: u64,
}

/// Parsed `tracestate` header
#[derive(Clone, Default, Debug, PartialEq)]
struct Tracestate {
    sampling_priority: Option<SamplingPriority>,
    origin: Option<String>,
    lower_order_trace_id: Option<String>,
    propagation_tags: Vec<(String, String)>,
    has_dd_member: bool,
    /// Members of other vendors, in their original order
    additional_values: Vec<(String, String)>,
}

impl FromStr for Tracestate {
    type Err = String;

    fn from_str(tracestate: &str) -> Result<Self, Self::Err> {
        let ts_v = tracestate.split(',').map(str::trim);
        let ts = ts_v.clone().collect::<Vec<&str>>().join(",");

        if INVALID_ASCII_CHARACTERS_REGEX.is_match(&ts) {
            dd_debug!("Received invalid tracestate header {tracestate}");
            return Err(String::from("Invalid tracestate"));
        }

        let mut parsed = Tracestate::default();
        for v in ts_v {
            if let Some(stripped) = v.strip_prefix("dd=") {
                parsed.has_dd_member = true;
                for (key, value) in stripped
                    .trim()
                    .split(TRACESTATE_DD_PAIR_SEPARATOR)
                    .filter_map(|item| item.split_once(':'))
                {
                    match key {
                        TRACESTATE_SAMPLING_PRIORITY_KEY => {
                            parsed.sampling_priority = SamplingPriority::from_str(value).ok()
                        }
                        TRACESTATE_ORIGIN_KEY => parsed.origin = Some(decode_tag_value(value)),
                        TRACESTATE_LAST_PARENT_KEY => {
                            parsed.lower_order_trace_id = Some(value.to_string())
                        }
                        _ => {
                            if let Some(stripped) =
                                key.strip_prefix(TRACESTATE_DATADOG_PROPAGATION_TAG_PREFIX)
                            {
                                parsed.propagation_tags.push((
                                    format!("{PROPAGATION_TAG_PREFIX}{stripped}"),
                                    decode_tag_value(value),
                                ));
                            }
                        }
                    }
                }
            } else if let Some((key, value)) = v.split_once('=') {
                parsed
                    .additional_values
                    .push((key.to_string(), value.to_string()));
            }
        }

        Ok(parsed)
    }
}

/// W3C `traceparent` and `tracestate` headers
pub struct TraceContextCodec {
    config: Arc<PropagationConfig>,
}

impl TraceContextCodec {
    pub const KEYS: &'static [&'static str] = &[TRACEPARENT_KEY, TRACESTATE_KEY];

    pub fn new(config: Arc<PropagationConfig>) -> Self {
        Self { config }
    }
}

impl Injector for TraceContextCodec {
    fn style(&self) -> TracePropagationStyle {
        TracePropagationStyle::TraceContext
    }

    fn inject(&self, context: &SpanContext, headers: &mut dyn HeaderWriter) -> Result<(), Error> {
        if context.trace_id.is_zero() || context.span_id == 0 {
            dd_debug!("Propagator (tracecontext): skipping inject");
            return Ok(());
        }

        inject_traceparent(context, headers);
        inject_tracestate(context, headers);

        for (key, value) in &context.baggage {
            match self.config.baggage_header(key) {
                Some(header) => headers.set(header, encode_baggage(value)),
                None => headers.set(&format!("{OT_BAGGAGE_PREFIX}{key}"), encode_baggage(value)),
            }
        }

        Ok(())
    }

    fn keys(&self) -> &'static [&'static str] {
        Self::KEYS
    }
}

fn inject_traceparent(context: &SpanContext, headers: &mut dyn HeaderWriter) {
    let trace_id = format!("{:032x}", context.trace_id.to_u128());
    let parent_id = format!("{:016x}", context.span_id);

    let flags = context
        .sampling
        .priority
        .map(|priority| if priority.is_keep() { "01" } else { "00" })
        .unwrap_or("00");

    let traceparent = format!("00-{trace_id}-{parent_id}-{flags}");

    dd_debug!("Propagator (tracecontext): injecting traceparent: {traceparent}");

    headers.set(TRACEPARENT_KEY, traceparent);
}

fn inject_tracestate(context: &SpanContext, headers: &mut dyn HeaderWriter) {
    let mut tracestate_parts = vec![];

    let priority = context.sampling.priority.unwrap_or(priority::USER_KEEP);

    tracestate_parts.push(format!("{TRACESTATE_SAMPLING_PRIORITY_KEY}:{priority}"));

    if let Some(origin) = context.origin.as_ref().map(|origin| {
        encode_tag_value(
            TRACESTATE_ORIGIN_FILTER_REGEX.replace_all(origin.as_ref(), INVALID_CHAR_REPLACEMENT),
        )
    }) {
        tracestate_parts.push(format!("{TRACESTATE_ORIGIN_KEY}:{origin}"));
    };

    tracestate_parts.push(format!(
        "{TRACESTATE_LAST_PARENT_KEY}:{:016x}",
        context.span_id
    ));

    for (key, value) in context.propagation_tags.iter() {
        let Some(stripped) = key.strip_prefix(PROPAGATION_TAG_PREFIX) else {
            continue;
        };
        if stripped == "tid" {
            continue;
        }

        let t_key = format!(
            "{TRACESTATE_DATADOG_PROPAGATION_TAG_PREFIX}{}",
            TRACESTATE_TAG_KEY_FILTER_REGEX.replace_all(stripped, INVALID_CHAR_REPLACEMENT)
        );
        let value = encode_tag_value(
            TRACESTATE_TAG_VALUE_FILTER_REGEX.replace_all(value, INVALID_CHAR_REPLACEMENT),
        );

        tracestate_parts.push(format!("{t_key}:{value}"));
    }

    let dd = tracestate_parts
        .into_iter()
        .reduce(|dd, part| {
            if dd.len() + part.len() + 1 < TRACESTATE_DD_KEY_MAX_LENGTH {
                format!("{dd}{TRACESTATE_DD_PAIR_SEPARATOR}{part}")
            } else {
                dd
            }
        })
        .unwrap_or_default();

    // If the resulting tracestate exceeds 32 list-members, remove the rightmost list-member
    let additional_parts = context
        .propagation_tags
        .tracestate()
        .into_iter()
        .flat_map(|tracestate| tracestate.split(TRACESTATE_VALUES_SEPARATOR))
        .map(str::trim)
        .filter(|member| !member.is_empty() && !member.starts_with("dd="))
        .take(TRACESTATE_MAX_FOREIGN_MEMBERS);

    let tracestate = std::iter::once(format!("dd={dd}"))
        .chain(additional_parts.map(str::to_string))
        .collect::<Vec<_>>()
        .join(TRACESTATE_VALUES_SEPARATOR);

    dd_debug!("Propagator (tracecontext): injecting tracestate: {tracestate}");

    headers.set(TRACESTATE_KEY, tracestate);
}

impl Extractor for TraceContextCodec {
    fn style(&self) -> TracePropagationStyle {
        TracePropagationStyle::TraceContext
    }

    fn extract(&self, headers: &HeaderCache) -> Result<Extracted, Error> {
        let collected = ExtractedHeaders::collect(headers, &self.config, Some(OT_BAGGAGE_PREFIX));

        let Some(tp) = headers.get(TRACEPARENT_KEY).map(str::trim) else {
            return Ok(collected.into_partial(None, TracePropagationStyle::TraceContext));
        };

        let traceparent = Traceparent::from_str(tp)?;
        dd_debug!("Propagator (tracecontext): traceparent extracted successfully");

        let mut tags = HashMap::new();
        let mut propagation_tags = PropagationTags::new();
        let mut origin = None;
        let mut sampling_priority = traceparent.sampling_priority;

        match headers.get(TRACESTATE_KEY) {
            Some(ts) => match Tracestate::from_str(ts) {
                Ok(tracestate) => {
                    dd_debug!("Propagator (tracecontext): tracestate header parsed successfully");

                    propagation_tags.set_tracestate(Some(ts.to_string()));
                    for (key, value) in tracestate.propagation_tags {
                        propagation_tags.insert(key, value);
                    }

                    if let Some(lpid) = tracestate.lower_order_trace_id {
                        tags.insert(DATADOG_LAST_PARENT_ID_KEY.to_string(), lpid);
                    }

                    origin = tracestate.origin;

                    sampling_priority = resolve_sampling_priority(
                        traceparent.sampling_priority,
                        tracestate.sampling_priority,
                        &mut propagation_tags,
                    );
                }
                Err(_) => {
                    dd_debug!("Propagator (tracecontext): unable to parse tracestate header");
                }
            },
            None => {
                dd_debug!("Propagator (tracecontext): no tracestate header found");
            }
        }

        let mechanism = propagation_tags
            .get(SAMPLING_DECISION_MAKER_TAG_KEY)
            .and_then(|sm| SamplingMechanism::from_str(sm).ok());

        let context = SpanContext {
            trace_id: TraceId::Bits128(traceparent.trace_id),
            span_id: traceparent.span_id,
            sampling: Sampling {
                priority: Some(sampling_priority),
                mechanism,
            },
            origin,
            tags,
            propagation_tags,
            style: Some(TracePropagationStyle::TraceContext),
            is_remote: true,
            ..Default::default()
        };

        Ok(collected.into_full(context))
    }
}

/// The `tracestate` priority refines the sampled flag only when both agree on
/// keeping the trace. Otherwise the flag wins and `_dd.p.dm` follows it.
fn resolve_sampling_priority(
    sampled: SamplingPriority,
    tracestate: Option<SamplingPriority>,
    tags: &mut PropagationTags,
) -> SamplingPriority {
    match tracestate {
        Some(priority) if priority.is_keep() == sampled.is_keep() => priority,
        _ => {
            if sampled.is_keep() {
                tags.insert(SAMPLING_DECISION_MAKER_TAG_KEY, mechanism::DEFAULT.to_cow());
            } else {
                tags.remove(SAMPLING_DECISION_MAKER_TAG_KEY);
            }
            sampled
        }
    }
}

impl FromStr for Traceparent {
    type Err = Error;

    fn from_str(traceparent: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &'static str| Error::extract(message, PROPAGATOR_NAME);

        let captures = TRACEPARENT_REGEX
            .captures(traceparent)
            .ok_or_else(|| invalid("invalid traceparent"))?;
        let version = &captures[1];
        let tail = captures.get(5).map_or("", |m| m.as_str());

        let trace_id = u128::from_str_radix(&captures[2], 16)
            .map_err(|_| invalid("Failed to decode trace_id"))?;
        if trace_id == 0 {
            return Err(invalid("`0` value for trace_id is invalid"));
        }

        let span_id = u64::from_str_radix(&captures[3], 16)
            .map_err(|_| invalid("Failed to decode span_id"))?;
        if span_id == 0 {
            return Err(invalid("`0` value for span_id is invalid"));
        }

        let flags = u8::from_str_radix(&captures[4], 16)
            .map_err(|_| invalid("Failed to decode trace_flags"))?;

        match version {
            "ff" => return Err(invalid("`ff` is an invalid traceparent version")),
            "00" if !tail.is_empty() && tail != "-" => {
                return Err(invalid(
                    "Traceparent with version `00` should contain only 4 values delimited by `-`",
                ))
            }
            "00" if flags > 2 => return Err(invalid("invalid trace flags for version 00")),
            "00" => {}
            _ => dd_warn!(
                "Propagator (tracecontext): Unsupported traceparent version {version}, still attempting to parse"
            ),
        }

        let sampling_priority = if flags & 0x1 == 1 {
            priority::AUTO_KEEP
        } else {
            priority::AUTO_REJECT
        };

        Ok(Traceparent {
            sampling_priority,
            trace_id,
            span_id,
        })
    }
}
