// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use dd_trace::configuration::TracePropagationStyle;
#[cfg(feature = "serde_config")]
use serde::{Deserialize, Deserializer};

use crate::{
    b3::{B3MultiCodec, B3SingleCodec},
    codec::{Extractor, Injector},
    config::PropagationConfig,
    datadog::DatadogCodec,
    haystack::HaystackCodec,
    tracecontext::TraceContextCodec,
    xray::XrayCodec,
};

const NONE_KEYS: [&str; 0] = [];

/// Maps a style to the codec implementing it.
pub trait StyleCodecs {
    fn injector(&self, config: &Arc<PropagationConfig>) -> Option<Box<dyn Injector>>;

    fn extractor(&self, config: &Arc<PropagationConfig>) -> Option<Box<dyn Extractor>>;

    /// Header names written by the style
    fn keys(&self) -> &'static [&'static str];

    /// Name used when reporting codec failures
    fn propagator_name(&self) -> &'static str;
}

impl StyleCodecs for TracePropagationStyle {
    fn injector(&self, config: &Arc<PropagationConfig>) -> Option<Box<dyn Injector>> {
        let config = config.clone();
        match self {
            Self::Datadog => Some(Box::new(DatadogCodec::new(config))),
            Self::B3Multi => Some(Box::new(B3MultiCodec::new(config))),
            Self::B3Single => Some(Box::new(B3SingleCodec::new(config))),
            Self::Haystack => Some(Box::new(HaystackCodec::new(config))),
            Self::Xray => Some(Box::new(XrayCodec::new(config))),
            Self::TraceContext => Some(Box::new(TraceContextCodec::new(config))),
            Self::None => None,
        }
    }

    fn extractor(&self, config: &Arc<PropagationConfig>) -> Option<Box<dyn Extractor>> {
        let config = config.clone();
        match self {
            Self::Datadog => Some(Box::new(DatadogCodec::new(config))),
            Self::B3Multi => Some(Box::new(B3MultiCodec::new(config))),
            Self::B3Single => Some(Box::new(B3SingleCodec::new(config))),
            Self::Haystack => Some(Box::new(HaystackCodec::new(config))),
            Self::Xray => Some(Box::new(XrayCodec::new(config))),
            Self::TraceContext => Some(Box::new(TraceContextCodec::new(config))),
            Self::None => None,
        }
    }

    fn keys(&self) -> &'static [&'static str] {
        match self {
            Self::Datadog => DatadogCodec::KEYS,
            Self::B3Multi => B3MultiCodec::KEYS,
            Self::B3Single => B3SingleCodec::KEYS,
            Self::Haystack => HaystackCodec::KEYS,
            Self::Xray => XrayCodec::KEYS,
            Self::TraceContext => TraceContextCodec::KEYS,
            Self::None => &NONE_KEYS,
        }
    }

    fn propagator_name(&self) -> &'static str {
        match self {
            Self::Datadog => "datadog",
            Self::B3Multi => "b3multi",
            Self::B3Single => "b3",
            Self::Haystack => "haystack",
            Self::Xray => "xray",
            Self::TraceContext => "tracecontext",
            Self::None => "none",
        }
    }
}

#[cfg(feature = "serde_config")]
#[allow(clippy::module_name_repetitions)]
pub fn deserialize_trace_propagation_style<'de, D>(
    deserializer: D,
) -> Result<Option<Vec<TracePropagationStyle>>, D::Error>
where
    D: Deserializer<'de>,
{
    use std::str::FromStr;

    use dd_trace::dd_warn;

    let s: String = String::deserialize(deserializer)?;

    if s.is_empty() {
        Ok(None)
    } else {
        let styles = s
            .split(',')
            .filter_map(|style| match TracePropagationStyle::from_str(style.trim()) {
                Ok(style) => Some(style),
                Err(e) => {
                    dd_warn!("Failed to deserialize propagation style: {e}");
                    None
                }
            })
            .fold(Vec::new(), |mut styles, style| {
                if !styles.contains(&style) {
                    styles.push(style);
                }
                styles
            });

        Ok(Some(styles))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_every_style_but_none_has_codecs() {
        let config = Arc::new(PropagationConfig::default());

        for style in TracePropagationStyle::ALL {
            let injector = style.injector(&config).map(|i| i.style());
            let extractor = style.extractor(&config).map(|e| e.style());

            assert_eq!(injector, Some(style));
            assert_eq!(extractor, Some(style));
            assert!(!style.keys().is_empty());
            assert_eq!(style.propagator_name(), style.to_string());
        }

        assert!(TracePropagationStyle::None.injector(&config).is_none());
        assert!(TracePropagationStyle::None.extractor(&config).is_none());
        assert!(TracePropagationStyle::None.keys().is_empty());
    }

    #[cfg(feature = "serde_config")]
    #[test]
    fn test_deserialize_style_list() {
        let config: PropagationConfig = serde_json::from_str(
            r#"{"style": "datadog, B3 single header,unknown,datadog", "extract_first": true}"#,
        )
        .expect("valid config");

        assert_eq!(
            config.style,
            Some(vec![
                TracePropagationStyle::Datadog,
                TracePropagationStyle::B3Single
            ])
        );
        assert!(config.extract_first);
        assert!(config.b3_padding_enabled);
    }
}
