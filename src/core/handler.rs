//! Handler trait for log record destinations

use super::error::HandlerError;
use super::log_level::LogLevel;
use super::log_record::LogRecord;
use std::sync::Arc;

/// Callback invoked when a handler fails internally.
///
/// Delivery errors never reach the code that logged the record; a broken log
/// sink must not break the instrumented application. The default callback
/// writes a tagged line to stderr.
pub type ErrorCallback = Arc<dyn Fn(&HandlerError) + Send + Sync>;

/// The default error callback: report to stderr and move on
#[must_use]
pub fn default_error_callback() -> ErrorCallback {
    Arc::new(|err| eprintln!("[HANDLER ERROR] {}", err))
}

/// A destination for log records.
///
/// Handlers are internally synchronized: every method takes `&self` and the
/// implementation holds its mutable state behind a per-handler lock, so any
/// number of threads may emit through a shared handler concurrently.
pub trait Handler: Send + Sync {
    /// Deliver a record unconditionally. Failures are reported through the
    /// handler's error callback, never returned.
    fn emit(&self, record: &LogRecord);

    /// Severity threshold for [`handle`](Self::handle). Defaults to `Trace`
    /// (everything passes).
    fn level(&self) -> LogLevel {
        LogLevel::Trace
    }

    /// Dispatch entry point: emit iff the record reaches this handler's
    /// threshold.
    fn handle(&self, record: &LogRecord) {
        if record.level >= self.level() {
            self.emit(record);
        }
    }

    /// Flush buffered output.
    fn flush(&self);

    /// Release resources. Implementations flush and close their stream; a
    /// closed handler reopens lazily if emitted to again.
    fn close(&self);

    fn name(&self) -> &str;
}
