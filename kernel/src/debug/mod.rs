//! Debug tracing
//!
//! Per-tick scheduler output is far too chatty for normal logs, so it is
//! compiled in only with the `debug-scheduler` feature.

/// Scheduler trace, enabled by the `debug-scheduler` feature
#[macro_export]
macro_rules! ksched_debug {
    ($($arg:tt)*) => ({
        #[cfg(feature = "debug-scheduler")]
        {
            log::trace!($($arg)*);
        }
    });
}
