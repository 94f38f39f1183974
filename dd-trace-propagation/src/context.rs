// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    fmt,
};

use dd_trace::{
    configuration::TracePropagationStyle,
    constants::{HIGHER_ORDER_TRACE_ID_BITS_TAG, PROPAGATION_TAG_PREFIX, RUM_SESSION_ID_TAG_KEY},
    sampling::{SamplingMechanism, SamplingPriority},
};

use crate::http_headers::HttpHeaders;

/// Trace identifier as carried by a header format.
///
/// Formats that only know 64 bits produce [`TraceId::Bits64`]; the low 64 bits
/// of a [`TraceId::Bits128`] are its 64-bit projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TraceId {
    Bits64(u64),
    Bits128(u128),
}

impl TraceId {
    /// Low 64 bits
    pub fn to_u64(&self) -> u64 {
        match *self {
            TraceId::Bits64(id) => id,
            TraceId::Bits128(id) => id as u64,
        }
    }

    pub fn to_u128(&self) -> u128 {
        match *self {
            TraceId::Bits64(id) => u128::from(id),
            TraceId::Bits128(id) => id,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.to_u128() == 0
    }

    /// Upper 64 bits, `None` when they are all zero
    pub fn high_bits(&self) -> Option<u64> {
        split_trace_id(self.to_u128()).0
    }

    /// Lowercase hex, 16 characters for 64-bit ids and 32 for 128-bit ids
    pub fn to_hex(&self) -> String {
        match *self {
            TraceId::Bits64(id) => format!("{id:016x}"),
            TraceId::Bits128(id) => format!("{id:032x}"),
        }
    }

    /// Whether two ids name the same trace.
    ///
    /// Ids of the same width compare structurally. A 64-bit id matches a
    /// 128-bit id when it equals the 128-bit id's low 64 bits.
    pub fn matches(&self, other: &TraceId) -> bool {
        match (self, other) {
            (TraceId::Bits64(a), TraceId::Bits64(b)) => a == b,
            (TraceId::Bits128(a), TraceId::Bits128(b)) => a == b,
            _ => self.to_u64() == other.to_u64(),
        }
    }
}

impl Default for TraceId {
    fn default() -> Self {
        TraceId::Bits64(0)
    }
}

impl From<u64> for TraceId {
    fn from(id: u64) -> Self {
        TraceId::Bits64(id)
    }
}

impl From<u128> for TraceId {
    fn from(id: u128) -> Self {
        TraceId::Bits128(id)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_u128())
    }
}

#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct Sampling {
    pub priority: Option<SamplingPriority>,
    pub mechanism: Option<SamplingMechanism>,
}

/// Tags that travel with the trace rather than with a single span.
///
/// Holds the `_dd.p.*` tags, the raw W3C `tracestate` of the last
/// `tracecontext` extraction, and the RUM session id slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropagationTags {
    tags: BTreeMap<String, String>,
    tracestate: Option<String>,
}

impl PropagationTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Keys outside of the `_dd.p.` namespace are ignored
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if key.starts_with(PROPAGATION_TAG_PREFIX) {
            self.tags.insert(key, value.into());
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.tags.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    /// Tags in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tracestate(&self) -> Option<&str> {
        self.tracestate.as_deref()
    }

    pub fn set_tracestate(&mut self, tracestate: Option<String>) {
        self.tracestate = tracestate;
    }

    pub fn take_tracestate(&mut self) -> Option<String> {
        self.tracestate.take()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.get(RUM_SESSION_ID_TAG_KEY)
    }

    pub fn update_session_id(&mut self, session_id: &str) {
        self.tags
            .insert(RUM_SESSION_ID_TAG_KEY.to_string(), session_id.to_string());
    }

    /// Upper trace id bits carried by `_dd.p.tid`
    pub fn higher_order_trace_id_bits(&self) -> Option<&str> {
        self.get(HIGHER_ORDER_TRACE_ID_BITS_TAG)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropagationTags {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut tags = PropagationTags::new();
        for (key, value) in iter {
            tags.insert(key, value);
        }
        tags
    }
}

/// A context recovered with a usable trace identity
#[derive(Clone, Default, Debug, PartialEq)]
pub struct SpanContext {
    pub trace_id: TraceId,
    pub span_id: u64,
    pub sampling: Sampling,
    pub origin: Option<String>,
    pub tags: HashMap<String, String>,
    pub propagation_tags: PropagationTags,
    pub baggage: BTreeMap<String, String>,
    pub http_headers: HttpHeaders,
    pub links: Vec<SpanLink>,
    /// Format the context was extracted from
    pub style: Option<TracePropagationStyle>,
    pub is_remote: bool,
}

/// Context-adjacent data found without a trace identity
#[derive(Clone, Default, Debug, PartialEq)]
pub struct TagContext {
    pub origin: Option<String>,
    pub tags: HashMap<String, String>,
    pub baggage: BTreeMap<String, String>,
    pub http_headers: HttpHeaders,
    pub style: Option<TracePropagationStyle>,
}

impl TagContext {
    /// Nothing worth returning was collected
    pub fn is_empty(&self) -> bool {
        self.origin.is_none()
            && self.tags.is_empty()
            && self.baggage.is_empty()
            && self.http_headers.is_empty()
    }
}

/// Outcome of an extraction
#[derive(Clone, Default, Debug, PartialEq)]
pub enum Extracted {
    #[default]
    NoContext,
    Partial(TagContext),
    Full(SpanContext),
}

impl Extracted {
    pub fn is_none(&self) -> bool {
        matches!(self, Extracted::NoContext)
    }

    pub fn as_full(&self) -> Option<&SpanContext> {
        match self {
            Extracted::Full(context) => Some(context),
            _ => None,
        }
    }

    pub fn into_full(self) -> Option<SpanContext> {
        match self {
            Extracted::Full(context) => Some(context),
            _ => None,
        }
    }

    pub fn as_partial(&self) -> Option<&TagContext> {
        match self {
            Extracted::Partial(context) => Some(context),
            _ => None,
        }
    }

    pub fn style(&self) -> Option<TracePropagationStyle> {
        match self {
            Extracted::NoContext => None,
            Extracted::Partial(context) => context.style,
            Extracted::Full(context) => context.style,
        }
    }
}

impl From<SpanContext> for Extracted {
    fn from(context: SpanContext) -> Self {
        Extracted::Full(context)
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
pub struct SpanLink {
    pub trace_id: u64,
    pub trace_id_high: Option<u64>,
    pub span_id: u64,
    pub attributes: Option<HashMap<String, String>>,
    pub tracestate: Option<String>,
    pub flags: Option<u32>,
}

impl SpanLink {
    /// Link to a context that lost against the canonical one.
    pub fn terminated_context(context: &SpanContext) -> Self {
        let flags = context
            .sampling
            .priority
            .map(|priority| u32::from(priority.is_keep()));

        let tracestate = match context.style {
            Some(TracePropagationStyle::TraceContext) => {
                context.propagation_tags.tracestate().map(str::to_string)
            }
            _ => None,
        };

        let context_headers = context
            .style
            .map(|style| style.to_string())
            .unwrap_or_default();

        let attributes = Some(HashMap::from([
            ("reason".to_string(), "terminated_context".to_string()),
            ("context_headers".to_string(), context_headers),
        ]));

        let (trace_id_high, trace_id) = split_trace_id(context.trace_id.to_u128());

        SpanLink {
            trace_id,
            trace_id_high,
            span_id: context.span_id,
            attributes,
            tracestate,
            flags,
        }
    }
}

pub(crate) fn decode_tag_value(value: &str) -> String {
    value.replace('~', "=")
}

pub(crate) fn encode_tag_value(value: Cow<'_, str>) -> String {
    value.replace('=', "~")
}

pub fn split_trace_id(trace_id: u128) -> (Option<u64>, u64) {
    let trace_id_lower_order_bits = trace_id as u64;

    let higher = (trace_id >> 64) as u64;
    let trace_id_higher_order_bits = if higher > 0 { Some(higher) } else { None };

    (trace_id_higher_order_bits, trace_id_lower_order_bits)
}

/// Joins the lower bits with the hex encoded upper bits of `_dd.p.tid`.
///
/// Without valid upper bits the id stays 64 bits wide.
pub fn combine_trace_id(trace_id: u64, higher_bits_hex: Option<&str>) -> TraceId {
    match higher_bits_hex.and_then(|higher| u64::from_str_radix(higher, 16).ok()) {
        Some(higher) => TraceId::Bits128((u128::from(higher) << 64) + u128::from(trace_id)),
        None => TraceId::Bits64(trace_id),
    }
}
