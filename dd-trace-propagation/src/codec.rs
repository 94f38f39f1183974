// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Contracts implemented by every header format.

use dd_trace::configuration::TracePropagationStyle;

use crate::{
    cache::HeaderCache,
    carrier::HeaderWriter,
    context::{Extracted, SpanContext},
    error::Error,
};

/// Writes one header format.
///
/// Implementations only write through `headers`. A failure is returned to
/// the compound injector, which logs it and moves on to the next format.
pub trait Injector: Send + Sync {
    fn style(&self) -> TracePropagationStyle;

    fn inject(&self, context: &SpanContext, headers: &mut dyn HeaderWriter) -> Result<(), Error>;

    /// Header names this format writes
    fn keys(&self) -> &'static [&'static str];
}

/// Reads one header format from a snapshot of the inbound carrier.
///
/// Extraction has no side effects: the same snapshot always yields the same
/// result.
///
/// Extractors read a [`HeaderCache`] rather than an arbitrary carrier and
/// getter. Every dispatch snapshots the carrier into the cache first, so an
/// extractor is never handed a raw carrier. Run a codec on its own by
/// building the cache with [`HeaderCache::new`].
pub trait Extractor: Send + Sync {
    fn style(&self) -> TracePropagationStyle;

    fn extract(&self, headers: &HeaderCache) -> Result<Extracted, Error>;

    /// Releases per-call scratch state, if any
    fn cleanup(&self) {}
}
