// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{str::FromStr, sync::Arc};

use dd_trace::{
    configuration::TracePropagationStyle, log::Level, sampling::SamplingPriority,
};

use crate::{
    cache::HeaderCache,
    carrier::HeaderWriter,
    codec::{Extractor, Injector},
    config::PropagationConfig,
    context::{Extracted, Sampling, SpanContext, TraceId},
    encoding::encode,
    error::Error,
    extraction::ExtractedHeaders,
};

const HAYSTACK_TRACE_ID_KEY: &str = "Trace-ID";
const HAYSTACK_SPAN_ID_KEY: &str = "Span-ID";
const HAYSTACK_BAGGAGE_PREFIX: &str = "Baggage-";
const DD_TRACE_ID_BAGGAGE_KEY: &str = "Baggage-Datadog-Trace-Id";
const DD_SPAN_ID_BAGGAGE_KEY: &str = "Baggage-Datadog-Span-Id";
const DD_SAMPLING_PRIORITY_BAGGAGE_KEY: &str = "Baggage-Datadog-Sampling-Priority";

/// Lowercase baggage keys reserved for the Datadog identity
const RESERVED_BAGGAGE_KEYS: [&str; 3] = [
    "datadog-trace-id",
    "datadog-span-id",
    "datadog-sampling-priority",
];

/// "Datadog!" in hex, the first three UUID groups of ids we produce
const DATADOG_UUID_SIGNATURE: &str = "44617461-646f-6721";

const PROPAGATOR_NAME: &str = "haystack";

/// Haystack `Trace-ID`, `Span-ID` and `Baggage-*` headers
pub struct HaystackCodec {
    config: Arc<PropagationConfig>,
}

impl HaystackCodec {
    pub const KEYS: &'static [&'static str] = &[
        HAYSTACK_TRACE_ID_KEY,
        HAYSTACK_SPAN_ID_KEY,
        DD_TRACE_ID_BAGGAGE_KEY,
        DD_SPAN_ID_BAGGAGE_KEY,
        DD_SAMPLING_PRIORITY_BAGGAGE_KEY,
    ];

    pub fn new(config: Arc<PropagationConfig>) -> Self {
        Self { config }
    }
}

impl Injector for HaystackCodec {
    fn style(&self) -> TracePropagationStyle {
        TracePropagationStyle::Haystack
    }

    fn inject(&self, context: &SpanContext, headers: &mut dyn HeaderWriter) -> Result<(), Error> {
        let trace_id = context.trace_id.to_u64();

        headers.set(HAYSTACK_TRACE_ID_KEY, to_uuid(trace_id));
        headers.set(DD_TRACE_ID_BAGGAGE_KEY, trace_id.to_string());
        headers.set(HAYSTACK_SPAN_ID_KEY, to_uuid(context.span_id));
        headers.set(DD_SPAN_ID_BAGGAGE_KEY, context.span_id.to_string());

        if let Some(priority) = context.sampling.priority {
            headers.set(DD_SAMPLING_PRIORITY_BAGGAGE_KEY, priority.to_string());
        }

        for (key, value) in &context.baggage {
            match self.config.baggage_header(key) {
                Some(header) => headers.set(header, encode(value)),
                None => headers.set(&format!("{HAYSTACK_BAGGAGE_PREFIX}{key}"), encode(value)),
            }
        }

        Ok(())
    }

    fn keys(&self) -> &'static [&'static str] {
        Self::KEYS
    }
}

impl Extractor for HaystackCodec {
    fn style(&self) -> TracePropagationStyle {
        TracePropagationStyle::Haystack
    }

    fn extract(&self, headers: &HeaderCache) -> Result<Extracted, Error> {
        let baggage_prefix = HAYSTACK_BAGGAGE_PREFIX.to_ascii_lowercase();
        let mut collected = ExtractedHeaders::collect(headers, &self.config, Some(&baggage_prefix));
        for key in RESERVED_BAGGAGE_KEYS {
            collected.baggage.remove(key);
        }

        let trace_id = match headers.get(HAYSTACK_TRACE_ID_KEY) {
            Some(trace_id) => parse_trace_id(trace_id)?,
            None => TraceId::default(),
        };
        if trace_id.is_zero() {
            return Ok(collected.into_partial(None, TracePropagationStyle::Haystack));
        }

        let span_id = match headers.get(HAYSTACK_SPAN_ID_KEY) {
            Some(span_id) => parse_span_id(span_id)?,
            None => 0,
        };

        let priority = match headers.get(DD_SAMPLING_PRIORITY_BAGGAGE_KEY) {
            Some(priority) => Some(SamplingPriority::from_str(priority.trim()).map_err(|_| {
                Error::extract_with_level(
                    "Failed to decode `sampling_priority`",
                    PROPAGATOR_NAME,
                    Level::Debug,
                )
            })?),
            None => None,
        };

        let context = SpanContext {
            trace_id,
            span_id,
            sampling: Sampling {
                priority,
                mechanism: None,
            },
            style: Some(TracePropagationStyle::Haystack),
            is_remote: true,
            ..Default::default()
        };

        Ok(collected.into_full(context))
    }
}

fn to_uuid(id: u64) -> String {
    let hex = format!("{id:016x}");
    format!("{DATADOG_UUID_SIGNATURE}-{}-{}", &hex[..4], &hex[4..])
}

/// Hex digits of a UUID, `None` when `value` is not shaped like one.
fn uuid_hex(value: &str) -> Option<String> {
    let groups = value.split('-').collect::<Vec<_>>();
    let shaped = groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(group, len)| group.len() == len);

    shaped.then(|| groups.concat())
}

fn invalid(field: &'static str) -> Error {
    Error::extract_with_level(field, PROPAGATOR_NAME, Level::Debug)
}

/// Our own UUIDs hold a 64-bit id, foreign UUIDs a 128-bit one. Plain
/// decimal ids are accepted too.
fn parse_trace_id(value: &str) -> Result<TraceId, Error> {
    let value = value.trim();
    let error = || invalid("Failed to decode `trace_id`");

    match uuid_hex(value) {
        Some(hex) if value.starts_with(DATADOG_UUID_SIGNATURE) => u64::from_str_radix(&hex[16..], 16)
            .map(TraceId::Bits64)
            .map_err(|_| error()),
        Some(hex) => u128::from_str_radix(&hex, 16)
            .map(TraceId::Bits128)
            .map_err(|_| error()),
        None => value.parse::<u64>().map(TraceId::Bits64).map_err(|_| error()),
    }
}

fn parse_span_id(value: &str) -> Result<u64, Error> {
    let value = value.trim();
    let error = || invalid("Failed to decode `span_id`");

    match uuid_hex(value) {
        Some(hex) => u64::from_str_radix(&hex[16..], 16).map_err(|_| error()),
        None => value.parse::<u64>().map_err(|_| error()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use dd_trace::sampling::priority;
    use pretty_assertions::assert_eq;

    use super::*;

    fn codec() -> HaystackCodec {
        HaystackCodec::new(Arc::new(PropagationConfig::default()))
    }

    fn extract(pairs: &[(&str, &str)]) -> Result<Extracted, Error> {
        let headers: HeaderCache = pairs.iter().copied().collect();
        codec().extract(&headers)
    }

    #[test]
    fn test_uuid_format() {
        assert_eq!(to_uuid(12345), "44617461-646f-6721-0000-000000003039");
        assert_eq!(
            to_uuid(u64::MAX),
            "44617461-646f-6721-ffff-ffffffffffff"
        );
    }

    #[test]
    fn test_extract_datadog_uuids() {
        let context = extract(&[
            ("Trace-ID", "44617461-646f-6721-0000-000000003039"),
            ("Span-ID", "44617461-646f-6721-0000-0000000004d2"),
            ("Baggage-Datadog-Sampling-Priority", "2"),
            ("Baggage-Datadog-Trace-Id", "12345"),
            ("Baggage-User", "jane+doe"),
        ])
        .unwrap()
        .into_full()
        .unwrap();

        assert_eq!(context.trace_id, TraceId::Bits64(12345));
        assert_eq!(context.span_id, 1234);
        assert_eq!(context.sampling.priority, Some(priority::USER_KEEP));
        assert_eq!(context.style, Some(TracePropagationStyle::Haystack));
        assert_eq!(
            context.baggage,
            BTreeMap::from([("user".to_string(), "jane doe".to_string())])
        );
    }

    #[test]
    fn test_extract_foreign_uuid_and_decimal() {
        let context = extract(&[
            ("trace-id", "80f198ee-5634-3ba8-64fe-8b2a57d3eff7"),
            ("span-id", "1234"),
        ])
        .unwrap()
        .into_full()
        .unwrap();

        assert_eq!(
            context.trace_id,
            TraceId::Bits128(0x80f198ee56343ba864fe8b2a57d3eff7)
        );
        assert_eq!(context.span_id, 1234);
        assert_eq!(context.sampling.priority, None);
    }

    #[test]
    fn test_extract_invalid_and_missing() {
        let error = extract(&[("Trace-ID", "not-an-id")]).unwrap_err();
        assert_eq!(error.propagator_name(), "haystack");

        assert!(extract(&[
            ("Trace-ID", "12345"),
            ("Baggage-Datadog-Sampling-Priority", "high"),
        ])
        .is_err());

        let partial = extract(&[("Baggage-Foo", "bar")]).unwrap();
        assert_eq!(
            partial.as_partial().map(|p| p.baggage.clone()),
            Some(BTreeMap::from([("foo".to_string(), "bar".to_string())]))
        );
    }

    #[test]
    fn test_inject() {
        let mut context = SpanContext {
            trace_id: TraceId::Bits128((7u128 << 64) + 12345),
            span_id: 1234,
            sampling: Sampling {
                priority: Some(priority::AUTO_KEEP),
                mechanism: None,
            },
            ..Default::default()
        };
        context
            .baggage
            .insert("user".to_string(), "jane doe".to_string());

        let mut carrier: HashMap<String, String> = HashMap::new();
        codec().inject(&context, &mut carrier).unwrap();

        assert_eq!(
            carrier,
            HashMap::from([
                (
                    "trace-id".to_string(),
                    "44617461-646f-6721-0000-000000003039".to_string()
                ),
                ("baggage-datadog-trace-id".to_string(), "12345".to_string()),
                (
                    "span-id".to_string(),
                    "44617461-646f-6721-0000-0000000004d2".to_string()
                ),
                ("baggage-datadog-span-id".to_string(), "1234".to_string()),
                (
                    "baggage-datadog-sampling-priority".to_string(),
                    "1".to_string()
                ),
                ("baggage-user".to_string(), "jane+doe".to_string()),
            ])
        );
    }
}
