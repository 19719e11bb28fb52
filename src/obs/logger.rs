use std::fmt::Arguments;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Severity levels for log messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Interface for structured logging and event tracing.
///
/// Supports level-based logging with `std::fmt::Arguments` formatting, plus
/// structured trace events of the form `event: <action>, key1=value1, ...`.
pub trait LoggerAndTracer: Send + Sync {
    /// Logs a formatted message at the specified level.
    fn log(&self, level: LogLevel, context: &'static str, msg: Arguments);

    /// Emits a trace event message.
    fn event(&self, context: &'static str, event: Arguments);

    fn is_tracing_enabled(&self) -> bool;

    fn level_enabled(&self, level: LogLevel) -> bool;
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::obs::logger::LogLevel::Debug, module_path!(), format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::obs::logger::LogLevel::Info, module_path!(), format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::obs::logger::LogLevel::Warn, module_path!(), format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::obs::logger::LogLevel::Error, module_path!(), format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! event {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.is_tracing_enabled() {
            $logger.event(module_path!(), format_args!($($arg)*));
        }
    };
}

/// A logger that discards everything. The default for library use.
#[derive(Default)]
pub struct NoOpLogger;

impl NoOpLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(NoOpLogger)
    }
}

impl LoggerAndTracer for NoOpLogger {
    fn log(&self, _level: LogLevel, _context: &'static str, _msg: Arguments) {}

    fn event(&self, _context: &'static str, _event: Arguments) {}

    fn is_tracing_enabled(&self) -> bool {
        false
    }

    fn level_enabled(&self, _level: LogLevel) -> bool {
        false
    }
}

/// A simple logger that prints messages to stdout with timestamps.
pub struct StdoutLogger {
    pub min_level: LogLevel,
    pub tracing_enabled: bool,
}

impl StdoutLogger {
    pub fn new(min_level: LogLevel, tracing_enabled: bool) -> Arc<Self> {
        Arc::new(StdoutLogger {
            min_level,
            tracing_enabled,
        })
    }

    fn now_micros() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_micros()
    }
}

impl LoggerAndTracer for StdoutLogger {
    fn log(&self, level: LogLevel, context: &'static str, msg: Arguments) {
        if self.level_enabled(level) {
            println!("[{:?}] [{}] [{}] {}", level, Self::now_micros(), context, msg);
        }
    }

    fn event(&self, context: &'static str, event: Arguments) {
        if self.tracing_enabled {
            println!("[TRACE] [{}] [{}] {}", Self::now_micros(), context, event);
        }
    }

    fn is_tracing_enabled(&self) -> bool {
        self.tracing_enabled
    }

    fn level_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }
}
