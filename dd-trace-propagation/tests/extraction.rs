// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use dd_trace::{
    configuration::TracePropagationStyle,
    log::{test_logger, Level},
    sampling::priority,
};
use dd_trace_propagation::{
    cache::HeaderCache,
    carrier::{Getter, HashMapGetter, PairsGetter},
    codec::Extractor,
    compound::CompoundExtractor,
    config::PropagationConfig,
    context::{Extracted, Sampling, SpanContext, TraceId},
    create_extractor,
    error::Error,
};
use pretty_assertions::assert_eq;

fn config(styles: &[TracePropagationStyle], extract_first: bool) -> Arc<PropagationConfig> {
    Arc::new(PropagationConfig {
        style_extract: Some(styles.to_vec()),
        extract_first,
        ..Default::default()
    })
}

fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Full context for a fixed trace id, counting its invocations
struct CountingExtractor {
    style: TracePropagationStyle,
    trace_id: TraceId,
    calls: Arc<AtomicUsize>,
}

impl Extractor for CountingExtractor {
    fn style(&self) -> TracePropagationStyle {
        self.style
    }

    fn extract(&self, _headers: &HeaderCache) -> Result<Extracted, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Extracted::Full(SpanContext {
            trace_id: self.trace_id,
            span_id: 1,
            sampling: Sampling {
                priority: Some(priority::AUTO_KEEP),
                mechanism: None,
            },
            style: Some(self.style),
            is_remote: true,
            ..Default::default()
        }))
    }
}

#[test]
fn test_every_format_reads_one_traversal() {
    let extractor = create_extractor(&config(&TracePropagationStyle::ALL, false));
    let carrier = headers(&[
        ("x-datadog-trace-id", "12345"),
        ("x-datadog-parent-id", "1"),
        ("traceparent", "00-00000000000000000000000000003039-0000000000000001-01"),
        ("x-forwarded-for", "203.0.113.1, 70.41.3.18"),
    ]);

    let traversals = AtomicUsize::new(0);
    let getter = |carrier: &Vec<(String, String)>, visitor: &mut dyn FnMut(&str, &str) -> bool| {
        traversals.fetch_add(1, Ordering::SeqCst);
        PairsGetter.for_each_key(carrier, visitor);
    };

    let extracted = extractor.extract(&carrier, &getter);

    assert_eq!(traversals.load(Ordering::SeqCst), 1);
    let context = extracted.into_full().expect("full context");
    assert_eq!(context.trace_id, TraceId::Bits64(12345));
    assert_eq!(context.http_headers.client_ip(), Some("203.0.113.1"));
}

#[test]
fn test_extract_first_skips_remaining_formats() {
    let first_calls = Arc::new(AtomicUsize::new(0));
    let second_calls = Arc::new(AtomicUsize::new(0));

    let extractor = CompoundExtractor::new(
        vec![
            Box::new(CountingExtractor {
                style: TracePropagationStyle::Datadog,
                trace_id: TraceId::Bits64(42),
                calls: first_calls.clone(),
            }),
            Box::new(CountingExtractor {
                style: TracePropagationStyle::TraceContext,
                trace_id: TraceId::Bits128(42),
                calls: second_calls.clone(),
            }),
        ],
        true,
    );

    let extracted = extractor.extract(&Vec::<(String, String)>::new(), &PairsGetter);

    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    assert_eq!(extracted.style(), Some(TracePropagationStyle::Datadog));
}

#[test]
fn test_conflicting_trace_ids_are_linked() {
    let extractor = create_extractor(&config(
        &[TracePropagationStyle::Datadog, TracePropagationStyle::B3Multi],
        false,
    ));
    let carrier = HashMap::from([
        ("x-datadog-trace-id".to_string(), "12345".to_string()),
        ("x-datadog-parent-id".to_string(), "1".to_string()),
        ("x-b3-traceid".to_string(), format!("{:016x}", 67890)),
        ("x-b3-spanid".to_string(), format!("{:016x}", 2)),
        ("x-b3-sampled".to_string(), "0".to_string()),
    ]);

    let context = extractor
        .extract(&carrier, &HashMapGetter)
        .into_full()
        .expect("full context");

    assert_eq!(context.trace_id, TraceId::Bits64(12345));
    assert_eq!(context.links.len(), 1);

    let link = &context.links[0];
    assert_eq!(link.trace_id, 67890);
    assert_eq!(link.trace_id_high, None);
    assert_eq!(link.span_id, 2);
    assert_eq!(link.flags, Some(0));
    assert_eq!(
        link.attributes,
        Some(HashMap::from([
            ("reason".to_string(), "terminated_context".to_string()),
            ("context_headers".to_string(), "b3multi".to_string()),
        ]))
    );
}

#[test]
fn test_trace_id_width_equivalence() {
    let narrow = TraceId::Bits64(0x64fe8b2a57d3eff7);
    let wide = TraceId::Bits128(0x80f198ee56343ba864fe8b2a57d3eff7);
    let other = TraceId::Bits128(0x80f198ee56343ba80000000000000001);

    assert!(narrow.matches(&wide));
    assert!(wide.matches(&narrow));
    assert!(!narrow.matches(&other));
    assert!(!other.matches(&narrow));
    assert!(!wide.matches(&other));

    // a 64-bit Datadog id corroborates a 128-bit W3C id with the same low bits
    let extractor = create_extractor(&config(
        &[TracePropagationStyle::Datadog, TracePropagationStyle::TraceContext],
        false,
    ));
    let carrier = headers(&[
        ("x-datadog-trace-id", 0x64fe8b2a57d3eff7u64.to_string().as_str()),
        ("x-datadog-parent-id", "1"),
        ("traceparent", "00-80f198ee56343ba864fe8b2a57d3eff7-00f067aa0ba902b7-01"),
        ("tracestate", "dd=s:1,foo=bar"),
    ]);

    let context = extractor
        .extract(&carrier, &PairsGetter)
        .into_full()
        .expect("full context");

    assert_eq!(context.trace_id, narrow);
    assert!(context.links.is_empty());
    assert_eq!(context.propagation_tags.tracestate(), Some("dd=s:1,foo=bar"));
}

#[test]
fn test_partial_context_fallback() {
    let extractor = create_extractor(&config(
        &[TracePropagationStyle::Datadog, TracePropagationStyle::TraceContext],
        false,
    ));
    let carrier = headers(&[
        ("X-Forwarded-For", "203.0.113.1, 70.41.3.18, 150.172.238.178"),
        ("User-Agent", "curl/8.0"),
    ]);

    let extracted = extractor.extract(&carrier, &PairsGetter);

    let partial = extracted.as_partial().expect("partial context");
    assert_eq!(partial.style, Some(TracePropagationStyle::Datadog));
    assert_eq!(partial.http_headers.client_ip(), Some("203.0.113.1"));
    assert_eq!(partial.http_headers.user_agent.as_deref(), Some("curl/8.0"));

    assert!(extractor.extract(&Vec::<(String, String)>::new(), &PairsGetter).is_none());
}

#[test]
fn test_malformed_format_is_logged_and_skipped() {
    let _guard = test_logger::activate_test_logger();

    let extractor = create_extractor(&config(
        &[TracePropagationStyle::TraceContext, TracePropagationStyle::Datadog],
        false,
    ));
    let carrier = headers(&[
        ("traceparent", "00-00000000000000000000000000000000-00f067aa0ba902b7-01"),
        ("x-datadog-trace-id", "777"),
        ("x-datadog-parent-id", "1"),
    ]);

    let context = extractor
        .extract(&carrier, &PairsGetter)
        .into_full()
        .expect("full context");

    assert_eq!(context.trace_id, TraceId::Bits64(777));
    assert_eq!(context.style, Some(TracePropagationStyle::Datadog));

    let logs = test_logger::take_test_logs().unwrap_or_default();
    assert!(logs.contains(&(
        Level::Error,
        "Cannot extract from tracecontext, `0` value for trace_id is invalid".to_string()
    )));
}

#[test]
fn test_header_tags_and_mapped_baggage() {
    let config = Arc::new(PropagationConfig {
        style_extract: Some(vec![TracePropagationStyle::B3Single]),
        header_tags: HashMap::from([("x-team".to_string(), "team".to_string())]),
        baggage_mapping: HashMap::from([("x-user".to_string(), "user".to_string())]),
        ..Default::default()
    });
    let extractor = create_extractor(&config);
    let carrier = headers(&[
        ("b3", "3039-4d2-1"),
        ("X-Team", "tracing"),
        ("X-User", "jane%20doe"),
    ]);

    let context = extractor
        .extract(&carrier, &PairsGetter)
        .into_full()
        .expect("full context");

    assert_eq!(context.tags.get("team").map(String::as_str), Some("tracing"));
    assert_eq!(
        context.baggage.get("user").map(String::as_str),
        Some("jane doe")
    );
}
