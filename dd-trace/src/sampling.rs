// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sampling values carried by a propagated trace context.
//!
//! This layer never takes a sampling decision, it only moves the upstream one
//! between header formats.

use std::{borrow::Cow, fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplingPriority {
    value: i8,
}

impl SamplingPriority {
    pub const fn from_i8(value: i8) -> Self {
        Self { value }
    }

    pub fn into_i8(self) -> i8 {
        self.value
    }

    pub fn is_keep(&self) -> bool {
        self.value > 0
    }

    /// Priorities set explicitly by a user or a rule, as opposed to the
    /// automatic keep/reject pair.
    pub fn is_user(&self) -> bool {
        self.value > priority::AUTO_KEEP.value || self.value < priority::AUTO_REJECT.value
    }
}

pub mod priority {
    use super::SamplingPriority;

    pub const USER_REJECT: SamplingPriority = SamplingPriority::from_i8(-1);
    pub const USER_KEEP: SamplingPriority = SamplingPriority::from_i8(2);
    pub const AUTO_REJECT: SamplingPriority = SamplingPriority::from_i8(0);
    pub const AUTO_KEEP: SamplingPriority = SamplingPriority::from_i8(1);
}

impl fmt::Display for SamplingPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for SamplingPriority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i8>()
            .map(SamplingPriority::from_i8)
            .map_err(drop)
    }
}

/// The component that took the sampling decision, rendered as `-N` in the
/// `_dd.p.dm` propagation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplingMechanism {
    value: u8,
}

impl SamplingMechanism {
    pub const fn from_u8(value: u8) -> Self {
        Self { value }
    }

    pub fn into_u8(self) -> u8 {
        self.value
    }

    /// Tag value of the mechanism, borrowed for the well known ones
    pub fn to_cow(&self) -> Cow<'static, str> {
        const RENDERED: [&str; 9] = ["-0", "-1", "-2", "-3", "-4", "-5", "-6", "-7", "-8"];
        match RENDERED.get(usize::from(self.value)) {
            Some(rendered) => Cow::Borrowed(*rendered),
            None => Cow::Owned(self.to_string()),
        }
    }
}

pub mod mechanism {
    use super::SamplingMechanism;

    pub const DEFAULT: SamplingMechanism = SamplingMechanism::from_u8(0);
    pub const AGENT_RATE_BY_SERVICE: SamplingMechanism = SamplingMechanism::from_u8(1);
    pub const REMOTE_RATE: SamplingMechanism = SamplingMechanism::from_u8(2);
    pub const LOCAL_USER_TRACE_SAMPLING_RULE: SamplingMechanism = SamplingMechanism::from_u8(3);
    pub const MANUAL: SamplingMechanism = SamplingMechanism::from_u8(4);
    pub const APPSEC: SamplingMechanism = SamplingMechanism::from_u8(5);
    pub const SPAN_SAMPLING_RULE: SamplingMechanism = SamplingMechanism::from_u8(8);
}

impl fmt::Display for SamplingMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{}", self.into_u8())
    }
}

impl FromStr for SamplingMechanism {
    type Err = ();

    /// Parses the `-N` form used in `_dd.p.dm`
    fn from_str(s: &str) -> Result<Self, ()> {
        let digits = s.strip_prefix('-').ok_or(())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        digits.parse::<u8>().map(SamplingMechanism::from_u8).map_err(drop)
    }
}
