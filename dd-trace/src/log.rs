// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Level filtered logging for the propagation layer.
//!
//! Records go to stderr (errors) or stdout through the `dd_debug!`,
//! `dd_info!`, `dd_warn!` and `dd_error!` macros.

use std::{
    cmp::Ordering as CmpOrdering,
    fmt,
    str::FromStr,
    sync::atomic::{AtomicUsize, Ordering},
};

static MAX_LOG_LEVEL: AtomicUsize = AtomicUsize::new(LevelFilter::Error as usize);

/// Sets the most verbose level the `dd_*!` macros will print
pub fn set_max_level(filter: LevelFilter) {
    MAX_LOG_LEVEL.store(filter as usize, Ordering::Relaxed)
}

pub fn max_level() -> LevelFilter {
    LevelFilter::from_usize(MAX_LOG_LEVEL.load(Ordering::Relaxed))
}

/// The most verbose level that gets printed
#[repr(usize)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum LevelFilter {
    Off,
    #[default]
    Error,
    Warn,
    Info,
    Debug,
}

impl LevelFilter {
    fn from_usize(value: usize) -> Self {
        match value {
            0 => LevelFilter::Off,
            1 => LevelFilter::Error,
            2 => LevelFilter::Warn,
            3 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LevelFilter::Off => "OFF",
            LevelFilter::Error => "ERROR",
            LevelFilter::Warn => "WARN",
            LevelFilter::Info => "INFO",
            LevelFilter::Debug => "DEBUG",
        }
    }
}

impl FromStr for LevelFilter {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            LevelFilter::Off,
            LevelFilter::Error,
            LevelFilter::Warn,
            LevelFilter::Info,
            LevelFilter::Debug,
        ]
        .into_iter()
        .find(|filter| s.trim().eq_ignore_ascii_case(filter.as_str()))
        .ok_or("log level filter should be one of DEBUG, INFO, WARN, ERROR, OFF")
    }
}

impl fmt::Display for LevelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a single record
#[repr(usize)]
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Level {
    Error = LevelFilter::Error as usize,
    Warn = LevelFilter::Warn as usize,
    Info = LevelFilter::Info as usize,
    Debug = LevelFilter::Debug as usize,
}

impl Level {
    /// Filter that lets this level and everything more severe through
    pub fn as_filter(&self) -> LevelFilter {
        LevelFilter::from_usize(*self as usize)
    }

    pub fn as_str(&self) -> &'static str {
        self.as_filter().as_str()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<LevelFilter> for Level {
    fn eq(&self, other: &LevelFilter) -> bool {
        self.as_filter() == *other
    }
}

impl PartialOrd<LevelFilter> for Level {
    fn partial_cmp(&self, other: &LevelFilter) -> Option<CmpOrdering> {
        Some(self.as_filter().cmp(other))
    }
}

#[cfg(feature = "test-utils")]
pub mod test_logger {
    //! Captures records on the current thread so tests can assert on them.
    //!
    //! ```no_run
    //! let _guard = dd_trace::log::test_logger::activate_test_logger();
    //! dd_trace::dd_debug!("my log");
    //! let logs = dd_trace::log::test_logger::take_test_logs().unwrap();
    //! // logs == [(Level::Debug, "my log")]
    //! ```
    //!
    //! Threads spawned by a test only share the capture when their closure is
    //! wrapped with [`with_local_logger`].
    use std::{
        cell::RefCell,
        sync::{Arc, Mutex},
    };

    use crate::log::Level;

    type Records = Arc<Mutex<Vec<(Level, String)>>>;

    thread_local! {
        static CAPTURE: RefCell<Option<Records>> = const { RefCell::new(None) };
    }

    /// Records every level, whatever the configured maximum.
    pub fn print_log(level: Level, log: std::fmt::Arguments, _file: &str, _line: u32) {
        let _ = CAPTURE.try_with(|capture| {
            if let Some(records) = &*capture.borrow() {
                if let Ok(mut records) = records.lock() {
                    records.push((level, log.to_string()));
                }
            }
        });
    }

    /// Restores the previous capture of the thread when dropped
    pub struct LoggerGuard {
        previous: Option<Records>,
    }

    impl Drop for LoggerGuard {
        fn drop(&mut self) {
            let previous = self.previous.take();
            let _ = CAPTURE.try_with(|capture| *capture.borrow_mut() = previous);
        }
    }

    fn install(records: Option<Records>) -> LoggerGuard {
        let previous = CAPTURE
            .try_with(|capture| capture.replace(records))
            .ok()
            .flatten();
        LoggerGuard { previous }
    }

    pub fn activate_test_logger() -> LoggerGuard {
        install(Some(Records::default()))
    }

    pub fn with_local_logger<F: FnOnce() -> R, R>(f: F) -> impl FnOnce() -> R {
        let records = CAPTURE
            .try_with(|capture| capture.borrow().clone())
            .ok()
            .flatten();
        move || {
            let _guard = install(records);
            f()
        }
    }

    /// Drains the records captured so far, `None` without an active capture
    pub fn take_test_logs() -> Option<Vec<(Level, String)>> {
        CAPTURE
            .try_with(|capture| {
                capture
                    .borrow()
                    .as_ref()
                    .and_then(|records| records.lock().ok().map(|mut r| std::mem::take(&mut *r)))
            })
            .ok()
            .flatten()
    }
}

/// Carries the thread's test capture into `f`, a no-op outside of tests
pub fn with_local_logger<F: FnOnce() -> R, R>(f: F) -> impl FnOnce() -> R {
    #[cfg(feature = "test-utils")]
    {
        test_logger::with_local_logger(f)
    }
    #[cfg(not(feature = "test-utils"))]
    {
        f
    }
}

#[doc(hidden)]
pub fn print_log(level: Level, log: fmt::Arguments, file: &str, line: u32) {
    #[cfg(feature = "test-utils")]
    test_logger::print_log(level, log, file, line);

    if level > max_level() {
        return;
    }

    match level {
        Level::Error => eprintln!("\x1b[91m{level}\x1b[0m {file}:{line} - {log}"),
        _ => println!("\x1b[93m{level}\x1b[0m {file}:{line} - {log}"),
    }
}

#[macro_export]
macro_rules! dd_debug {
    ($($arg:tt)+) => {
        $crate::dd_log!($crate::log::Level::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! dd_info {
    ($($arg:tt)+) => {
        $crate::dd_log!($crate::log::Level::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! dd_warn {
    ($($arg:tt)+) => {
        $crate::dd_log!($crate::log::Level::Warn, $($arg)+)
    };
}

#[macro_export]
macro_rules! dd_error {
    ($($arg:tt)+) => {
        $crate::dd_log!($crate::log::Level::Error, $($arg)+)
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! dd_log {
    ($level:expr, $($arg:tt)+) => {
        $crate::log::print_log($level, format_args!($($arg)+), file!(), line!())
    };
}
