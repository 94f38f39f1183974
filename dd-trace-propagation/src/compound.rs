// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Drives several header formats over one carrier.

use dd_trace::{catch_panic, configuration::TracePropagationStyle, constants::SESSION_ID_TAG};

use crate::{
    cache::HeaderCache,
    carrier::{Getter, Setter, SetterWriter},
    codec::{Extractor, Injector},
    context::{Extracted, SpanContext, SpanLink, TagContext},
    error::Error,
    trace_propagation_style::StyleCodecs,
};

/// Injects with every configured format, in configuration order.
///
/// Formats do not coordinate: on a header name collision the last one wins.
pub struct CompoundInjector {
    injectors: Vec<Box<dyn Injector>>,
}

impl CompoundInjector {
    pub fn new(injectors: Vec<Box<dyn Injector>>) -> Self {
        Self { injectors }
    }

    pub fn styles(&self) -> impl Iterator<Item = TracePropagationStyle> + '_ {
        self.injectors.iter().map(|injector| injector.style())
    }

    /// Header names written by the configured formats, without duplicates
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> = Vec::new();
        for key in self.injectors.iter().flat_map(|injector| injector.keys()) {
            if !keys.contains(key) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.injectors.is_empty()
    }

    /// Writes `context` into `carrier`.
    ///
    /// A session id found in the span tags is copied into the propagation tags
    /// before any format runs. Failures of one format are logged and do not
    /// stop the others.
    pub fn inject<C: ?Sized>(
        &self,
        context: &mut SpanContext,
        carrier: &mut C,
        setter: &dyn Setter<C>,
    ) {
        if let Some(session_id) = context.tags.get(SESSION_ID_TAG) {
            context.propagation_tags.update_session_id(session_id);
        }

        let context = &*context;
        let mut writer = SetterWriter::new(carrier, setter);
        for injector in &self.injectors {
            let style = injector.style();
            let result = catch_panic!(
                injector.inject(context, &mut writer),
                Err(Error::inject("codec panicked", style.propagator_name()))
            );

            if let Err(e) = result {
                e.log();
            }
        }
    }
}

/// Reconciles every configured format into one context.
///
/// The first full context, in configuration order, is canonical. Later full
/// contexts of the same trace only contribute their W3C `tracestate`; those of
/// another trace are attached to the canonical context as terminated links.
pub struct CompoundExtractor {
    extractors: Vec<Box<dyn Extractor>>,
    extract_first: bool,
}

impl CompoundExtractor {
    pub fn new(extractors: Vec<Box<dyn Extractor>>, extract_first: bool) -> Self {
        Self {
            extractors,
            extract_first,
        }
    }

    pub fn styles(&self) -> impl Iterator<Item = TracePropagationStyle> + '_ {
        self.extractors.iter().map(|extractor| extractor.style())
    }

    pub fn extract_first(&self) -> bool {
        self.extract_first
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Snapshots `carrier` in one traversal and resolves the formats over the
    /// snapshot. Without any configured format the carrier is not read.
    pub fn extract<C: ?Sized>(&self, carrier: &C, getter: &dyn Getter<C>) -> Extracted {
        if self.extractors.is_empty() {
            return Extracted::NoContext;
        }

        let headers = HeaderCache::new(carrier, getter);
        self.extract_from_cache(&headers)
    }

    pub fn extract_from_cache(&self, headers: &HeaderCache) -> Extracted {
        let mut canonical: Option<SpanContext> = None;
        let mut first_partial: Option<TagContext> = None;

        for extractor in &self.extractors {
            let style = extractor.style();
            let result = catch_panic!(
                extractor.extract(headers),
                Err(Error::extract("codec panicked", style.propagator_name()))
            );

            match result {
                Ok(Extracted::Full(context)) => match canonical.as_mut() {
                    None => {
                        canonical = Some(context);
                        if self.extract_first {
                            break;
                        }
                    }
                    Some(canonical) => {
                        if canonical.trace_id.matches(&context.trace_id) {
                            if context.style == Some(TracePropagationStyle::TraceContext) {
                                let mut propagation_tags = context.propagation_tags;
                                canonical
                                    .propagation_tags
                                    .set_tracestate(propagation_tags.take_tracestate());
                            }
                        } else {
                            canonical.links.push(SpanLink::terminated_context(&context));
                        }
                    }
                },
                Ok(Extracted::Partial(context)) => {
                    if first_partial.is_none() {
                        first_partial = Some(context);
                    }
                }
                Ok(Extracted::NoContext) => {}
                Err(e) => e.log(),
            }
        }

        match (canonical, first_partial) {
            (Some(context), _) => Extracted::Full(context),
            (None, Some(context)) => Extracted::Partial(context),
            (None, None) => Extracted::NoContext,
        }
    }

    pub fn cleanup(&self) {
        for extractor in &self.extractors {
            extractor.cleanup();
        }
    }
}
