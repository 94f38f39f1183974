// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use dd_trace::{
    configuration::TracePropagationStyle,
    constants::ORIGIN_TAG,
    dd_debug,
    log::Level,
    sampling::{priority, SamplingPriority},
};

use crate::{
    cache::HeaderCache,
    carrier::HeaderWriter,
    codec::{Extractor, Injector},
    config::PropagationConfig,
    context::{Extracted, Sampling, SpanContext, TraceId},
    encoding::{decode, encode},
    error::Error,
    extraction::ExtractedHeaders,
};

const XRAY_TRACE_HEADER_KEY: &str = "X-Amzn-Trace-Id";

const ROOT_KEY: &str = "Root";
const PARENT_KEY: &str = "Parent";
const SAMPLED_KEY: &str = "Sampled";
const SELF_KEY: &str = "Self";

const ROOT_PREFIX: &str = "1-";
// The epoch part is left unset
const ROOT_EPOCH_AND_PADDING: &str = "1-00000000-00000000";

const XRAY_HEADER_MAX_LENGTH: usize = 256;

const PROPAGATOR_NAME: &str = "xray";

/// AWS `X-Amzn-Trace-Id` header
pub struct XrayCodec {
    config: Arc<PropagationConfig>,
}

impl XrayCodec {
    pub const KEYS: &'static [&'static str] = &[XRAY_TRACE_HEADER_KEY];

    pub fn new(config: Arc<PropagationConfig>) -> Self {
        Self { config }
    }
}

impl Injector for XrayCodec {
    fn style(&self) -> TracePropagationStyle {
        TracePropagationStyle::Xray
    }

    fn inject(&self, context: &SpanContext, headers: &mut dyn HeaderWriter) -> Result<(), Error> {
        if context.trace_id.is_zero() {
            dd_debug!("Propagator (xray): skipping inject, no trace id");
            return Ok(());
        }

        let mut header = format!(
            "{ROOT_KEY}={ROOT_EPOCH_AND_PADDING}{:016x};{PARENT_KEY}={:016x}",
            context.trace_id.to_u64(),
            context.span_id
        );

        if let Some(priority) = context.sampling.priority {
            let sampled = if priority.is_keep() { "1" } else { "0" };
            header.push_str(&format!(";{SAMPLED_KEY}={sampled}"));
        }

        if let Some(origin) = &context.origin {
            header.push_str(&format!(";{ORIGIN_TAG}={origin}"));
        }

        for (key, value) in &context.baggage {
            if let Some(mapped) = self.config.baggage_header(key) {
                headers.set(mapped, encode(value));
                continue;
            }

            let member = format!(";{key}={}", encode(value));
            if header.len() + member.len() > XRAY_HEADER_MAX_LENGTH {
                dd_debug!("Propagator (xray): dropping baggage {key}, header is full");
                continue;
            }
            header.push_str(&member);
        }

        headers.set(XRAY_TRACE_HEADER_KEY, header);

        Ok(())
    }

    fn keys(&self) -> &'static [&'static str] {
        Self::KEYS
    }
}

impl Extractor for XrayCodec {
    fn style(&self) -> TracePropagationStyle {
        TracePropagationStyle::Xray
    }

    fn extract(&self, headers: &HeaderCache) -> Result<Extracted, Error> {
        let mut collected = ExtractedHeaders::collect(headers, &self.config, None);

        let Some(value) = headers.get(XRAY_TRACE_HEADER_KEY) else {
            return Ok(collected.into_partial(None, TracePropagationStyle::Xray));
        };

        let mut trace_id = None;
        let mut span_id = 0;
        let mut priority = None;
        let mut origin = None;

        for (key, value) in value
            .split(';')
            .filter_map(|member| member.split_once('='))
            .map(|(key, value)| (key.trim(), value.trim()))
        {
            if key.eq_ignore_ascii_case(ROOT_KEY) {
                trace_id = Some(parse_root(value)?);
            } else if key.eq_ignore_ascii_case(PARENT_KEY) {
                span_id = u64::from_str_radix(value, 16)
                    .map_err(|_| invalid("Failed to decode `parent_id`"))?;
            } else if key.eq_ignore_ascii_case(SAMPLED_KEY) {
                priority = parse_sampled(value);
            } else if key.eq_ignore_ascii_case(SELF_KEY) {
                continue;
            } else if key == ORIGIN_TAG {
                origin = Some(value.to_string());
            } else if !key.is_empty() {
                collected.baggage.insert(key.to_string(), decode(value));
            }
        }

        let Some(trace_id) = trace_id.filter(|trace_id: &TraceId| !trace_id.is_zero()) else {
            return Ok(collected.into_partial(origin, TracePropagationStyle::Xray));
        };

        let context = SpanContext {
            trace_id,
            span_id,
            sampling: Sampling {
                priority,
                mechanism: None,
            },
            origin,
            style: Some(TracePropagationStyle::Xray),
            is_remote: true,
            ..Default::default()
        };

        Ok(collected.into_full(context))
    }
}

fn invalid(message: &'static str) -> Error {
    Error::extract_with_level(message, PROPAGATOR_NAME, Level::Debug)
}

/// `1-<8 hex epoch>-<24 hex>`, the last 16 hex digits hold the trace id
fn parse_root(root: &str) -> Result<TraceId, Error> {
    let error = || invalid("Failed to decode `trace_id`");

    let ids = root.strip_prefix(ROOT_PREFIX).ok_or_else(error)?;
    let (epoch, unique) = ids.split_once('-').ok_or_else(error)?;
    if epoch.len() != 8 || unique.len() != 24 || !unique.is_ascii() {
        return Err(error());
    }

    u64::from_str_radix(&unique[8..], 16)
        .map(TraceId::Bits64)
        .map_err(|_| error())
}

fn parse_sampled(value: &str) -> Option<SamplingPriority> {
    match value {
        "1" => Some(priority::AUTO_KEEP),
        "0" => Some(priority::AUTO_REJECT),
        _ => None,
    }
}
