// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{collections::HashMap, sync::Arc};

use dd_trace::{configuration::TracePropagationStyle, dd_debug, Config};

use crate::{
    carrier::{Getter, Setter},
    codec::Injector,
    compound::{CompoundExtractor, CompoundInjector},
    config::PropagationConfig,
    context::{Extracted, SpanContext},
    trace_propagation_style::StyleCodecs,
};

pub mod b3;
pub mod cache;
pub mod carrier;
pub mod codec;
pub mod compound;
pub mod config;
pub mod context;
pub mod datadog;
pub mod encoding;
pub mod error;
mod extraction;
pub mod haystack;
pub mod http_headers;
pub mod trace_propagation_style;
pub mod tracecontext;
pub mod xray;

/// Keeps the first occurrence of each style
fn dedup_styles(styles: &[TracePropagationStyle]) -> Vec<TracePropagationStyle> {
    let mut unique = Vec::with_capacity(styles.len());
    for style in styles {
        if unique.contains(style) {
            dd_debug!("Propagation style {style} is configured more than once");
            continue;
        }
        unique.push(*style);
    }
    unique
}

/// Compound injector over `styles`, in order. `none` contributes nothing.
pub fn create_injector(
    config: &Arc<PropagationConfig>,
    styles: &[TracePropagationStyle],
) -> CompoundInjector {
    let injectors = dedup_styles(styles)
        .iter()
        .filter_map(|style| style.injector(config))
        .collect();

    CompoundInjector::new(injectors)
}

/// One injector per known style
pub fn all_injectors_for(
    config: &Arc<PropagationConfig>,
) -> HashMap<TracePropagationStyle, Box<dyn Injector>> {
    TracePropagationStyle::ALL
        .iter()
        .filter_map(|style| style.injector(config).map(|injector| (*style, injector)))
        .collect()
}

/// Compound extractor over the configured extraction styles.
pub fn create_extractor(config: &Arc<PropagationConfig>) -> CompoundExtractor {
    let extractors = dedup_styles(config.get_extractors())
        .iter()
        .filter_map(|style| style.extractor(config))
        .collect();

    CompoundExtractor::new(extractors, config.extract_first)
}

/// Injects and extracts with every format enabled in the configuration.
pub struct DatadogCompositePropagator {
    config: Arc<Config>,
    injector: CompoundInjector,
    extractor: CompoundExtractor,
    keys: Vec<&'static str>,
}

impl DatadogCompositePropagator {
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        let propagation_config = Arc::new(PropagationConfig::from(&config));

        let injector = create_injector(&propagation_config, propagation_config.get_injectors());
        let extractor = create_extractor(&propagation_config);
        let keys = injector.keys();

        Self {
            config,
            injector,
            extractor,
            keys,
        }
    }

    pub fn inject<C: ?Sized>(
        &self,
        context: &mut SpanContext,
        carrier: &mut C,
        setter: &dyn Setter<C>,
    ) {
        self.injector.inject(context, carrier, setter);
    }

    pub fn extract<C: ?Sized>(&self, carrier: &C, getter: &dyn Getter<C>) -> Extracted {
        self.extractor.extract(carrier, getter)
    }

    /// Header names this propagator may write
    pub fn keys(&self) -> &[&'static str] {
        &self.keys
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
