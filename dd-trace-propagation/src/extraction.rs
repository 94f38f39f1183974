// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Context-adjacent data every format extractor collects alongside its own
//! trace headers.

use std::collections::{BTreeMap, HashMap};

use dd_trace::configuration::TracePropagationStyle;

use crate::{
    cache::HeaderCache,
    config::PropagationConfig,
    context::{Extracted, SpanContext, TagContext},
    encoding::decode,
    http_headers::HttpHeaders,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ExtractedHeaders {
    pub tags: HashMap<String, String>,
    pub baggage: BTreeMap<String, String>,
    pub http_headers: HttpHeaders,
}

impl ExtractedHeaders {
    /// Collects configured header tags, baggage and client address headers.
    ///
    /// Headers matching `baggage_prefix` become baggage items keyed by the
    /// lowercase remainder of their name. Baggage values are decoded.
    pub fn collect(
        headers: &HeaderCache,
        config: &PropagationConfig,
        baggage_prefix: Option<&str>,
    ) -> Self {
        let mut collected = ExtractedHeaders::default();

        for (key, value) in headers.iter() {
            let lower = key.to_ascii_lowercase();

            if let Some(tag) = config.header_tags.get(&lower) {
                collected.tags.insert(tag.clone(), value.to_string());
            }

            if let Some(baggage_key) = config.baggage_mapping.get(&lower) {
                collected.baggage.insert(baggage_key.clone(), decode(value));
            } else if let Some(baggage_key) = baggage_prefix
                .and_then(|prefix| lower.strip_prefix(prefix))
                .filter(|baggage_key| !baggage_key.is_empty())
            {
                collected
                    .baggage
                    .insert(baggage_key.to_string(), decode(value));
            }

            collected.http_headers.record(&lower, value);
        }

        collected
    }

    /// Partial context when anything was collected, otherwise no context
    pub fn into_partial(
        self,
        origin: Option<String>,
        style: TracePropagationStyle,
    ) -> Extracted {
        let context = TagContext {
            origin,
            tags: self.tags,
            baggage: self.baggage,
            http_headers: self.http_headers,
            style: Some(style),
        };

        if context.is_empty() {
            Extracted::NoContext
        } else {
            Extracted::Partial(context)
        }
    }

    /// Moves the collected data into a full context; collected tags do not
    /// override tags the format already set.
    pub fn into_full(self, mut context: SpanContext) -> Extracted {
        for (tag, value) in self.tags {
            context.tags.entry(tag).or_insert(value);
        }
        context.baggage.extend(self.baggage);
        context.http_headers = self.http_headers;

        Extracted::Full(context)
    }
}
