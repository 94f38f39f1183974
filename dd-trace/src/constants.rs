// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub const PROPAGATION_TAG_PREFIX: &str = "_dd.p.";
pub const HIGHER_ORDER_TRACE_ID_BITS_TAG: &str = "_dd.p.tid";
pub const SAMPLING_DECISION_MAKER_TAG_KEY: &str = "_dd.p.dm";
pub const RUM_SESSION_ID_TAG_KEY: &str = "_dd.p.rsid";
pub const PROPAGATION_ERROR_TAG_KEY: &str = "_dd.propagation_error";

/// Span tag under which a RUM session id is recorded
pub const SESSION_ID_TAG: &str = "session_id";

pub const ORIGIN_TAG: &str = "_dd.origin";
