// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Zipkin B3 headers, both the multi header and the single `b3` header
//! encodings.

use std::sync::Arc;

use dd_trace::{
    configuration::TracePropagationStyle,
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
    error::Error,
    extraction::ExtractedHeaders,
};

const B3_TRACE_ID_KEY: &str = "x-b3-traceid";
const B3_SPAN_ID_KEY: &str = "x-b3-spanid";
const B3_SAMPLED_KEY: &str = "x-b3-sampled";
const B3_FLAGS_KEY: &str = "x-b3-flags";
const B3_SINGLE_KEY: &str = "b3";

const B3_MULTI_PROPAGATOR_NAME: &str = "b3multi";
const B3_SINGLE_PROPAGATOR_NAME: &str = "b3";

/// `x-b3-*` headers
pub struct B3MultiCodec {
    config: Arc<PropagationConfig>,
}

impl B3MultiCodec {
    pub const KEYS: &'static [&'static str] =
        &[B3_TRACE_ID_KEY, B3_SPAN_ID_KEY, B3_SAMPLED_KEY, B3_FLAGS_KEY];

    pub fn new(config: Arc<PropagationConfig>) -> Self {
        Self { config }
    }
}

impl Injector for B3MultiCodec {
    fn style(&self) -> TracePropagationStyle {
        TracePropagationStyle::B3Multi
    }

    fn inject(&self, context: &SpanContext, headers: &mut dyn HeaderWriter) -> Result<(), Error> {
        if context.trace_id.is_zero() {
            dd_debug!("Propagator (b3multi): skipping inject, no trace id");
            return Ok(());
        }

        let padded = self.config.b3_padding_enabled;
        headers.set(B3_TRACE_ID_KEY, format_trace_id(context.trace_id, padded));
        headers.set(B3_SPAN_ID_KEY, format_span_id(context.span_id, padded));

        if let Some(priority) = context.sampling.priority {
            headers.set(B3_SAMPLED_KEY, sampled_flag(priority).to_string());
            if priority == priority::USER_KEEP {
                headers.set(B3_FLAGS_KEY, "1".to_string());
            }
        }

        Ok(())
    }

    fn keys(&self) -> &'static [&'static str] {
        Self::KEYS
    }
}

impl Extractor for B3MultiCodec {
    fn style(&self) -> TracePropagationStyle {
        TracePropagationStyle::B3Multi
    }

    fn extract(&self, headers: &HeaderCache) -> Result<Extracted, Error> {
        let collected = ExtractedHeaders::collect(headers, &self.config, None);

        let trace_id = match headers.get(B3_TRACE_ID_KEY) {
            Some(trace_id) => parse_trace_id(trace_id, B3_MULTI_PROPAGATOR_NAME)?,
            None => TraceId::default(),
        };
        if trace_id.is_zero() {
            return Ok(collected.into_partial(None, TracePropagationStyle::B3Multi));
        }

        let span_id = match headers.get(B3_SPAN_ID_KEY) {
            Some(span_id) => parse_span_id(span_id, B3_MULTI_PROPAGATOR_NAME)?,
            None => 0,
        };

        let priority = if headers.get(B3_FLAGS_KEY).map(str::trim) == Some("1") {
            Some(priority::USER_KEEP)
        } else {
            headers.get(B3_SAMPLED_KEY).and_then(parse_sampled)
        };

        let context = SpanContext {
            trace_id,
            span_id,
            sampling: Sampling {
                priority,
                mechanism: None,
            },
            style: Some(TracePropagationStyle::B3Multi),
            is_remote: true,
            ..Default::default()
        };

        Ok(collected.into_full(context))
    }
}

/// `b3: {trace}-{span}[-{sampled}[-{parent}]]`
pub struct B3SingleCodec {
    config: Arc<PropagationConfig>,
}

impl B3SingleCodec {
    pub const KEYS: &'static [&'static str] = &[B3_SINGLE_KEY];

    pub fn new(config: Arc<PropagationConfig>) -> Self {
        Self { config }
    }
}

impl Injector for B3SingleCodec {
    fn style(&self) -> TracePropagationStyle {
        TracePropagationStyle::B3Single
    }

    fn inject(&self, context: &SpanContext, headers: &mut dyn HeaderWriter) -> Result<(), Error> {
        if context.trace_id.is_zero() {
            dd_debug!("Propagator (b3): skipping inject, no trace id");
            return Ok(());
        }

        let padded = self.config.b3_padding_enabled;
        let mut value = format!(
            "{}-{}",
            format_trace_id(context.trace_id, padded),
            format_span_id(context.span_id, padded)
        );

        match context.sampling.priority {
            Some(priority::USER_KEEP) => value.push_str("-d"),
            Some(priority) => {
                value.push('-');
                value.push_str(sampled_flag(priority));
            }
            None => {}
        }

        headers.set(B3_SINGLE_KEY, value);

        Ok(())
    }

    fn keys(&self) -> &'static [&'static str] {
        Self::KEYS
    }
}

impl Extractor for B3SingleCodec {
    fn style(&self) -> TracePropagationStyle {
        TracePropagationStyle::B3Single
    }

    fn extract(&self, headers: &HeaderCache) -> Result<Extracted, Error> {
        let collected = ExtractedHeaders::collect(headers, &self.config, None);

        let Some(value) = headers.get(B3_SINGLE_KEY).map(str::trim) else {
            return Ok(collected.into_partial(None, TracePropagationStyle::B3Single));
        };

        let parts = value.split('-').collect::<Vec<_>>();

        // a lone sampling state carries no identifiers
        if parts.len() == 1 {
            dd_debug!("Propagator (b3): header {value} only carries a sampling decision");
            return Ok(collected.into_partial(None, TracePropagationStyle::B3Single));
        }

        if parts.len() > 4 {
            return Err(Error::extract_with_level(
                "Invalid `b3` header",
                B3_SINGLE_PROPAGATOR_NAME,
                Level::Debug,
            ));
        }

        let trace_id = parse_trace_id(parts[0], B3_SINGLE_PROPAGATOR_NAME)?;
        if trace_id.is_zero() {
            return Ok(collected.into_partial(None, TracePropagationStyle::B3Single));
        }
        let span_id = parse_span_id(parts[1], B3_SINGLE_PROPAGATOR_NAME)?;

        let priority = match parts.get(2) {
            Some(&"d") => Some(priority::USER_KEEP),
            Some(sampled) => parse_sampled(sampled),
            None => None,
        };

        let context = SpanContext {
            trace_id,
            span_id,
            sampling: Sampling {
                priority,
                mechanism: None,
            },
            style: Some(TracePropagationStyle::B3Single),
            is_remote: true,
            ..Default::default()
        };

        Ok(collected.into_full(context))
    }
}

fn format_trace_id(trace_id: TraceId, padded: bool) -> String {
    if padded {
        trace_id.to_hex()
    } else {
        format!("{:x}", trace_id.to_u128())
    }
}

fn format_span_id(span_id: u64, padded: bool) -> String {
    if padded {
        format!("{span_id:016x}")
    } else {
        format!("{span_id:x}")
    }
}

fn sampled_flag(priority: SamplingPriority) -> &'static str {
    if priority.is_keep() {
        "1"
    } else {
        "0"
    }
}

/// Ids up to 16 hex digits are 64 bits wide, up to 32 are 128 bits wide.
fn parse_trace_id(value: &str, propagator_name: &'static str) -> Result<TraceId, Error> {
    let value = value.trim();
    let invalid =
        || Error::extract_with_level("Failed to decode `trace_id`", propagator_name, Level::Debug);

    match value.len() {
        1..=16 => u64::from_str_radix(value, 16)
            .map(TraceId::Bits64)
            .map_err(|_| invalid()),
        17..=32 => u128::from_str_radix(value, 16)
            .map(TraceId::Bits128)
            .map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn parse_span_id(value: &str, propagator_name: &'static str) -> Result<u64, Error> {
    let value = value.trim();
    if value.is_empty() || value.len() > 16 {
        return Err(Error::extract_with_level(
            "Failed to decode `span_id`",
            propagator_name,
            Level::Debug,
        ));
    }

    u64::from_str_radix(value, 16).map_err(|_| {
        Error::extract_with_level("Failed to decode `span_id`", propagator_name, Level::Debug)
    })
}

fn parse_sampled(value: &str) -> Option<SamplingPriority> {
    match value.trim() {
        "1" | "true" => Some(priority::AUTO_KEEP),
        "0" | "false" => Some(priority::AUTO_REJECT),
        other => {
            dd_debug!("Propagator (b3): ignoring sampling state {other}");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn config(b3_padding_enabled: bool) -> Arc<PropagationConfig> {
        Arc::new(PropagationConfig {
            b3_padding_enabled,
            ..Default::default()
        })
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderCache {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_extract_multi_64_bit() {
        let codec = B3MultiCodec::new(config(true));
        let context = codec
            .extract(&headers(&[
                ("X-B3-TraceId", "0000000000003039"),
                ("X-B3-SpanId", "00000000000004d2"),
                ("X-B3-Sampled", "1"),
            ]))
            .unwrap()
            .into_full()
            .unwrap();

        assert_eq!(context.trace_id, TraceId::Bits64(12345));
        assert_eq!(context.span_id, 1234);
        assert_eq!(context.sampling.priority, Some(priority::AUTO_KEEP));
        assert_eq!(context.style, Some(TracePropagationStyle::B3Multi));
        assert!(context.is_remote);
    }

    #[test]
    fn test_extract_multi_128_bit_and_debug_flag() {
        let codec = B3MultiCodec::new(config(true));
        let context = codec
            .extract(&headers(&[
                ("x-b3-traceid", "80f198ee56343ba864fe8b2a57d3eff7"),
                ("x-b3-spanid", "e457b5a2e4d86bd1"),
                ("x-b3-sampled", "0"),
                ("x-b3-flags", "1"),
            ]))
            .unwrap()
            .into_full()
            .unwrap();

        assert_eq!(
            context.trace_id,
            TraceId::Bits128(0x80f198ee56343ba864fe8b2a57d3eff7)
        );
        assert_eq!(context.span_id, 0xe457b5a2e4d86bd1);
        assert_eq!(context.sampling.priority, Some(priority::USER_KEEP));
    }

    #[test]
    fn test_extract_multi_sampled_values() {
        let codec = B3MultiCodec::new(config(true));
        for (sampled, expected) in [
            ("true", Some(priority::AUTO_KEEP)),
            ("false", Some(priority::AUTO_REJECT)),
            ("maybe", None),
        ] {
            let context = codec
                .extract(&headers(&[("x-b3-traceid", "a"), ("x-b3-sampled", sampled)]))
                .unwrap()
                .into_full()
                .unwrap();

            assert_eq!(context.sampling.priority, expected, "sampled: {sampled}");
        }
    }

    #[test]
    fn test_extract_multi_invalid_and_missing() {
        let codec = B3MultiCodec::new(config(true));

        let error = codec
            .extract(&headers(&[("x-b3-traceid", "not-hex")]))
            .unwrap_err();
        assert_eq!(error.propagator_name(), "b3multi");
        assert_eq!(error.log_level, Level::Debug);

        assert!(codec
            .extract(&headers(&[("x-b3-traceid", "f".repeat(33).as_str())]))
            .is_err());

        assert!(codec.extract(&headers(&[])).unwrap().is_none());

        let partial = codec
            .extract(&headers(&[("x-b3-traceid", "0"), ("x-real-ip", "10.0.0.1")]))
            .unwrap();
        assert_eq!(
            partial.as_partial().and_then(|p| p.http_headers.client_ip()),
            Some("10.0.0.1")
        );
    }

    #[test]
    fn test_extract_single() {
        let codec = B3SingleCodec::new(config(true));

        let context = codec
            .extract(&headers(&[(
                "b3",
                "80f198ee56343ba864fe8b2a57d3eff7-e457b5a2e4d86bd1-d-05e3ac9a4f6e3b90",
            )]))
            .unwrap()
            .into_full()
            .unwrap();
        assert_eq!(
            context.trace_id,
            TraceId::Bits128(0x80f198ee56343ba864fe8b2a57d3eff7)
        );
        assert_eq!(context.span_id, 0xe457b5a2e4d86bd1);
        assert_eq!(context.sampling.priority, Some(priority::USER_KEEP));
        assert_eq!(context.style, Some(TracePropagationStyle::B3Single));

        let context = codec
            .extract(&headers(&[("b3", "3039-4d2")]))
            .unwrap()
            .into_full()
            .unwrap();
        assert_eq!(context.trace_id, TraceId::Bits64(12345));
        assert_eq!(context.sampling.priority, None);
    }

    #[test]
    fn test_extract_single_sampling_only_and_invalid() {
        let codec = B3SingleCodec::new(config(true));

        assert!(codec.extract(&headers(&[("b3", "0")])).unwrap().is_none());
        assert!(codec.extract(&headers(&[("b3", "1-2-3-4-5")])).is_err());
        assert!(codec.extract(&headers(&[("b3", "xyz-2")])).is_err());
    }

    fn context_to_inject(priority: Option<SamplingPriority>) -> SpanContext {
        SpanContext {
            trace_id: TraceId::Bits64(0x3039),
            span_id: 0x4d2,
            sampling: Sampling {
                priority,
                mechanism: None,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_inject_multi_padded() {
        let codec = B3MultiCodec::new(config(true));
        let mut carrier: HashMap<String, String> = HashMap::new();

        codec
            .inject(&context_to_inject(Some(priority::USER_KEEP)), &mut carrier)
            .unwrap();

        assert_eq!(
            carrier,
            HashMap::from([
                ("x-b3-traceid".to_string(), "0000000000003039".to_string()),
                ("x-b3-spanid".to_string(), "00000000000004d2".to_string()),
                ("x-b3-sampled".to_string(), "1".to_string()),
                ("x-b3-flags".to_string(), "1".to_string()),
            ])
        );
    }

    #[test]
    fn test_inject_multi_minimal_128_bit() {
        let codec = B3MultiCodec::new(config(false));
        let mut carrier: HashMap<String, String> = HashMap::new();
        let mut context = context_to_inject(None);
        context.trace_id = TraceId::Bits128((1u128 << 64) + 0x3039);

        codec.inject(&context, &mut carrier).unwrap();

        assert_eq!(carrier["x-b3-traceid"], "10000000000003039");
        assert_eq!(carrier["x-b3-spanid"], "4d2");
        assert!(!carrier.contains_key("x-b3-sampled"));
    }

    #[test]
    fn test_inject_single() {
        let mut carrier: HashMap<String, String> = HashMap::new();
        B3SingleCodec::new(config(true))
            .inject(&context_to_inject(Some(priority::AUTO_REJECT)), &mut carrier)
            .unwrap();
        assert_eq!(carrier["b3"], "0000000000003039-00000000000004d2-0");

        B3SingleCodec::new(config(false))
            .inject(&context_to_inject(Some(priority::USER_KEEP)), &mut carrier)
            .unwrap();
        assert_eq!(carrier["b3"], "3039-4d2-d");
    }

    #[test]
    fn test_inject_skips_zero_trace_id() {
        let mut carrier: HashMap<String, String> = HashMap::new();
        B3SingleCodec::new(config(true))
            .inject(&SpanContext::default(), &mut carrier)
            .unwrap();
        B3MultiCodec::new(config(true))
            .inject(&SpanContext::default(), &mut carrier)
            .unwrap();

        assert!(carrier.is_empty());
    }
}
