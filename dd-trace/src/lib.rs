// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub mod configuration;
pub mod constants;
pub use configuration::Config;

pub mod log;
pub mod sampling;

/// Evaluates `$operation`, logging any panic instead of unwinding further.
///
/// The fallback is only evaluated if a panic occurs
#[macro_export]
#[doc(hidden)]
macro_rules! catch_panic {
    ($operation:expr, $fallback:expr) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $operation)) {
            Ok(result) => result,
            Err(error) => {
                $crate::dd_error!("Panic caught {error:?}");
                $fallback
            }
        }
    };

    ($operation:expr) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $operation)) {
            Ok(result) => result,
            Err(error) => {
                $crate::dd_error!("Panic caught {error:?}");
            }
        }
    };
}
