// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{collections::HashMap, sync::Arc};

use dd_trace::{
    configuration::TracePropagationStyle,
    constants::SESSION_ID_TAG,
    log::{test_logger, Level},
    sampling::{mechanism, priority},
};
use dd_trace_propagation::{
    cache::HeaderCache,
    carrier::{HashMapGetter, HashMapSetter, HeaderWriter, PairsSetter},
    codec::{Extractor, Injector},
    compound::CompoundInjector,
    config::PropagationConfig,
    context::{Sampling, SpanContext, TraceId},
    create_extractor, create_injector,
    datadog::DatadogCodec,
    encoding::{decode, encode_baggage, first_header_value},
    error::Error,
};
use pretty_assertions::assert_eq;

fn context() -> SpanContext {
    let mut context = SpanContext {
        trace_id: TraceId::Bits128((0x4321u128 << 64) + 1234),
        span_id: 5678,
        sampling: Sampling {
            priority: Some(priority::USER_KEEP),
            mechanism: Some(mechanism::MANUAL),
        },
        origin: Some("rum".to_string()),
        ..Default::default()
    };
    context.propagation_tags.insert("_dd.p.dm", "-4");
    context
        .baggage
        .insert("user".to_string(), "jane doe".to_string());
    context
}

#[test]
fn test_injection_is_deterministic() {
    let config = Arc::new(PropagationConfig::default());
    let injector = create_injector(&config, &TracePropagationStyle::ALL);

    let mut first: Vec<(String, String)> = Vec::new();
    let mut second: Vec<(String, String)> = Vec::new();
    injector.inject(&mut context(), &mut first, &PairsSetter);
    injector.inject(&mut context(), &mut second, &PairsSetter);

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_last_format_wins_on_collision() {
    let config = Arc::new(PropagationConfig {
        inverted_baggage_mapping: HashMap::from([("user".to_string(), "x-user".to_string())]),
        ..Default::default()
    });
    let datadog_then_w3c = [TracePropagationStyle::Datadog, TracePropagationStyle::TraceContext];
    let w3c_then_datadog = [TracePropagationStyle::TraceContext, TracePropagationStyle::Datadog];

    // the mapped baggage header is written by both formats with their own encoding
    let mut carrier: HashMap<String, String> = HashMap::new();
    create_injector(&config, &datadog_then_w3c).inject(&mut context(), &mut carrier, &HashMapSetter);
    assert_eq!(carrier["x-user"], "jane%20doe");

    let mut carrier: HashMap<String, String> = HashMap::new();
    create_injector(&config, &w3c_then_datadog).inject(&mut context(), &mut carrier, &HashMapSetter);
    assert_eq!(carrier["x-user"], "jane+doe");
}

#[test]
fn test_session_id_reaches_datadog_tags() {
    let config = Arc::new(PropagationConfig::default());
    let injector = create_injector(&config, &[TracePropagationStyle::Datadog]);

    let mut context = context();
    context
        .tags
        .insert(SESSION_ID_TAG.to_string(), "session-1".to_string());

    let mut carrier: HashMap<String, String> = HashMap::new();
    injector.inject(&mut context, &mut carrier, &HashMapSetter);

    assert_eq!(context.propagation_tags.session_id(), Some("session-1"));
    assert_eq!(
        carrier["x-datadog-tags"],
        "_dd.p.dm=-4,_dd.p.rsid=session-1,_dd.p.tid=0000000000004321"
    );
}

#[test]
fn test_round_trip_through_every_format() {
    for style in TracePropagationStyle::ALL {
        let config = Arc::new(PropagationConfig {
            style_extract: Some(vec![style]),
            ..Default::default()
        });

        let mut carrier: HashMap<String, String> = HashMap::new();
        create_injector(&config, &[style]).inject(&mut context(), &mut carrier, &HashMapSetter);

        let extracted = create_extractor(&config)
            .extract(&carrier, &HashMapGetter)
            .into_full()
            .unwrap_or_else(|| panic!("{style} did not round trip"));

        assert!(
            extracted.trace_id.matches(&context().trace_id),
            "{style} trace id"
        );
        assert_eq!(extracted.span_id, 5678, "{style} span id");
        assert_eq!(extracted.style, Some(style));
    }
}

struct FailingInjector;

impl Injector for FailingInjector {
    fn style(&self) -> TracePropagationStyle {
        TracePropagationStyle::Xray
    }

    fn inject(&self, _context: &SpanContext, _headers: &mut dyn HeaderWriter) -> Result<(), Error> {
        Err(Error::inject("no room left", "xray"))
    }

    fn keys(&self) -> &'static [&'static str] {
        &[]
    }
}

#[test]
fn test_failing_format_does_not_stop_siblings() {
    let _guard = test_logger::activate_test_logger();

    let config = Arc::new(PropagationConfig::default());
    let injector = CompoundInjector::new(vec![
        Box::new(FailingInjector),
        Box::new(DatadogCodec::new(config)),
    ]);

    let mut carrier: HashMap<String, String> = HashMap::new();
    injector.inject(&mut context(), &mut carrier, &HashMapSetter);

    assert_eq!(carrier["x-datadog-trace-id"], "1234");
    assert!(test_logger::take_test_logs()
        .unwrap_or_default()
        .contains(&(Level::Error, "Cannot inject from xray, no room left".to_string())));
}

#[test]
fn test_header_cache_replays_duplicates() {
    let carrier = vec![
        ("X-Forwarded-For".to_string(), "203.0.113.1".to_string()),
        ("x-forwarded-for".to_string(), "70.41.3.18".to_string()),
    ];
    let cache = HeaderCache::new(&carrier, &dd_trace_propagation::carrier::PairsGetter);

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("x-forwarded-for"), Some("203.0.113.1"));
    assert_eq!(
        cache.get_all("X-FORWARDED-FOR").collect::<Vec<_>>(),
        vec!["203.0.113.1", "70.41.3.18"]
    );

    let extracted = DatadogCodec::new(Arc::new(PropagationConfig::default()))
        .extract(&cache)
        .expect("no trace headers is not an error");
    assert_eq!(
        extracted.as_partial().and_then(|p| p.http_headers.client_ip()),
        Some("203.0.113.1")
    );
}

#[test]
fn test_baggage_encoding_round_trip() {
    for value in [
        "jane doe",
        "a+b=c",
        "100% sure",
        "émoji 🎉 ünïcode",
        "!\"#$&'()*,/:;<=>?@[\\]^`{|}~",
        "",
    ] {
        assert_eq!(decode(&encode_baggage(value)), value);
    }
}

#[test]
fn test_first_header_value() {
    assert_eq!(
        first_header_value(Some("203.0.113.1, 70.41.3.18, 150.172.238.178")),
        Some("203.0.113.1")
    );
    assert_eq!(first_header_value(Some("203.0.113.1")), Some("203.0.113.1"));
    assert_eq!(first_header_value(None), None);
}
