// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Environment variables read by [`crate::Config`]
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SupportedConfigurations {
    DD_LOG_LEVEL,
    DD_TRACE_PROPAGATION_STYLE,
    DD_TRACE_PROPAGATION_STYLE_EXTRACT,
    DD_TRACE_PROPAGATION_STYLE_INJECT,
    DD_TRACE_PROPAGATION_EXTRACT_FIRST,
    DD_TRACE_PROPAGATION_STYLE_B3_PADDING_ENABLED,
    DD_TRACE_HEADER_TAGS,
    DD_TRACE_HEADER_BAGGAGE,
    DD_TRACE_X_DATADOG_TAGS_MAX_LENGTH,
}

impl SupportedConfigurations {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DD_LOG_LEVEL => "DD_LOG_LEVEL",
            Self::DD_TRACE_PROPAGATION_STYLE => "DD_TRACE_PROPAGATION_STYLE",
            Self::DD_TRACE_PROPAGATION_STYLE_EXTRACT => "DD_TRACE_PROPAGATION_STYLE_EXTRACT",
            Self::DD_TRACE_PROPAGATION_STYLE_INJECT => "DD_TRACE_PROPAGATION_STYLE_INJECT",
            Self::DD_TRACE_PROPAGATION_EXTRACT_FIRST => "DD_TRACE_PROPAGATION_EXTRACT_FIRST",
            Self::DD_TRACE_PROPAGATION_STYLE_B3_PADDING_ENABLED => {
                "DD_TRACE_PROPAGATION_STYLE_B3_PADDING_ENABLED"
            }
            Self::DD_TRACE_HEADER_TAGS => "DD_TRACE_HEADER_TAGS",
            Self::DD_TRACE_HEADER_BAGGAGE => "DD_TRACE_HEADER_BAGGAGE",
            Self::DD_TRACE_X_DATADOG_TAGS_MAX_LENGTH => "DD_TRACE_X_DATADOG_TAGS_MAX_LENGTH",
        }
    }
}
