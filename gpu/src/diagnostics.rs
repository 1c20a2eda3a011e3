//! Process-wide diagnostics.
//!
//! Every message the layer reports goes to the `log` facade and, when one is
//! installed, to a single user callback. With neither a logger nor a callback
//! the layer is silent.
//!
//! # Example
//!
//! ```ignore
//! redlilium_gpu::set_log_callback(Some(Box::new(|level, msg| {
//!     eprintln!("[gpu {level:?}] {msg}");
//! })));
//! ```

use std::fmt;

use parking_lot::RwLock;

/// Severity of a reported message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warning,
    Critical,
}

/// User log sink.
pub type LogCallback = Box<dyn Fn(LogLevel, &str) + Send + Sync>;

static CALLBACK: RwLock<Option<LogCallback>> = parking_lot::const_rwlock(None);

/// Install or remove the process-wide log callback.
pub fn set_log_callback(callback: Option<LogCallback>) {
    *CALLBACK.write() = callback;
}

#[doc(hidden)]
pub fn report(level: LogLevel, args: fmt::Arguments<'_>) {
    match level {
        LogLevel::Info => log::info!("{args}"),
        LogLevel::Warning => log::warn!("{args}"),
        LogLevel::Critical => log::error!("{args}"),
    }

    let callback = CALLBACK.read();
    if let Some(callback) = callback.as_ref() {
        callback(level, &args.to_string());
    }
}

macro_rules! report_info {
    ($($arg:tt)*) => {
        $crate::diagnostics::report($crate::diagnostics::LogLevel::Info, format_args!($($arg)*))
    };
}

macro_rules! report_warn {
    ($($arg:tt)*) => {
        $crate::diagnostics::report($crate::diagnostics::LogLevel::Warning, format_args!($($arg)*))
    };
}

macro_rules! report_critical {
    ($($arg:tt)*) => {
        $crate::diagnostics::report($crate::diagnostics::LogLevel::Critical, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered() {
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Critical);
    }
}
