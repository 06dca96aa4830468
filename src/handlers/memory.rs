//! In-memory buffering handlers
//!
//! `BufferingHandler` accumulates records and discards them on flush; it is
//! the capacity-gated base useful for tests and custom sinks.
//! `MemoryHandler` drains into a target handler instead, and additionally
//! flushes as soon as a single record reaches the flush severity, so errors
//! surface immediately while routine records batch up.

use crate::core::{Handler, LogLevel, LogRecord};
use parking_lot::Mutex;
use std::sync::Arc;

/// Custom flush decision: receives the buffered records (including the one
/// just appended) and that newest record
pub type FlushPredicate = Arc<dyn Fn(&[LogRecord], &LogRecord) -> bool + Send + Sync>;

/// Bounded in-memory record buffer
pub struct BufferingHandler {
    capacity: usize,
    level: LogLevel,
    should_flush: Option<FlushPredicate>,
    buffer: Mutex<Vec<LogRecord>>,
}

impl BufferingHandler {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            level: LogLevel::Trace,
            should_flush: None,
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Set the severity threshold
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Replace the capacity check with a custom flush decision
    #[must_use]
    pub fn with_flush_predicate(mut self, predicate: FlushPredicate) -> Self {
        self.should_flush = Some(predicate);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    fn should_flush(&self, buffer: &[LogRecord], record: &LogRecord) -> bool {
        match &self.should_flush {
            Some(predicate) => predicate(buffer, record),
            None => buffer.len() >= self.capacity,
        }
    }
}

impl Handler for BufferingHandler {
    fn emit(&self, record: &LogRecord) {
        let mut buffer = self.buffer.lock();
        buffer.push(record.clone());
        if self.should_flush(&buffer, record) {
            buffer.clear();
        }
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn flush(&self) {
        self.buffer.lock().clear();
    }

    fn close(&self) {
        self.flush();
    }

    fn name(&self) -> &str {
        "buffering"
    }
}

struct MemoryState {
    buffer: Vec<LogRecord>,
    target: Option<Arc<dyn Handler>>,
}

/// Buffering handler that drains into a target handler
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use log_handler_system::core::LogLevel;
/// use log_handler_system::handlers::{FileHandler, MemoryHandler};
///
/// let target = Arc::new(FileHandler::new("/var/log/app.log").unwrap());
/// let handler = MemoryHandler::new(512)
///     .with_flush_level(LogLevel::Error)
///     .with_target(target);
/// ```
pub struct MemoryHandler {
    capacity: usize,
    flush_level: LogLevel,
    flush_on_close: bool,
    level: LogLevel,
    state: Mutex<MemoryState>,
}

impl MemoryHandler {
    /// Create a handler flushing at capacity or on the first `Error` record
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            flush_level: LogLevel::Error,
            flush_on_close: true,
            level: LogLevel::Trace,
            state: Mutex::new(MemoryState {
                buffer: Vec::new(),
                target: None,
            }),
        }
    }

    /// Severity that flushes the buffer immediately
    #[must_use]
    pub fn with_flush_level(mut self, flush_level: LogLevel) -> Self {
        self.flush_level = flush_level;
        self
    }

    /// Downstream handler receiving drained records
    #[must_use]
    pub fn with_target(self, target: Arc<dyn Handler>) -> Self {
        self.state.lock().target = Some(target);
        self
    }

    /// Whether close performs a final flush to the target
    #[must_use]
    pub fn with_flush_on_close(mut self, flush_on_close: bool) -> Self {
        self.flush_on_close = flush_on_close;
        self
    }

    /// Set the severity threshold
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Swap the target handler at runtime
    pub fn set_target(&self, target: Option<Arc<dyn Handler>>) {
        self.state.lock().target = target;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().buffer.is_empty()
    }

    /// Drain into the target in arrival order. Without a target the buffer
    /// is retained; records are not discarded into the void.
    fn flush_locked(state: &mut MemoryState) {
        if let Some(target) = &state.target {
            for record in state.buffer.drain(..) {
                target.handle(&record);
            }
        }
    }
}

impl Handler for MemoryHandler {
    fn emit(&self, record: &LogRecord) {
        let mut state = self.state.lock();
        state.buffer.push(record.clone());
        if state.buffer.len() >= self.capacity || record.level >= self.flush_level {
            Self::flush_locked(&mut state);
        }
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn flush(&self) {
        Self::flush_locked(&mut self.state.lock());
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if self.flush_on_close {
            Self::flush_locked(&mut state);
        }
        state.target = None;
    }

    fn name(&self) -> &str {
        "memory"
    }
}
