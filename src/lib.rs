//! # Log Handler System
//!
//! A production-ready Rust log delivery framework: rotating files,
//! in-memory buffering, and queue-based fan-out to downstream handlers.
//!
//! ## Features
//!
//! - **Rotating Files**: Size- and wall-clock-triggered rollover with
//!   bounded backup chains and DST-aware scheduling
//! - **External Rotation**: Watched files that follow logrotate-style
//!   replacement
//! - **Queue Fan-out**: Non-blocking producers feeding a background
//!   listener thread
//! - **Thread Safe**: Designed for concurrent environments

pub mod core;
pub mod handlers;

pub mod prelude {
    pub use crate::core::{
        default_error_callback, ErrorCallback, Formatter, Handler, HandlerError, JsonFormatter,
        LogLevel, LogRecord, RecordFormatter, Result, TimestampFormat,
    };
    pub use crate::handlers::{
        BufferingHandler, FileHandler, MemoryHandler, QueueHandler, QueueListener, RecordQueue,
        RotatingFileHandler, RotationHooks, RotationInterval, TimedRotatingFileHandler,
        DEFAULT_SHUTDOWN_TIMEOUT,
    };
    #[cfg(unix)]
    pub use crate::handlers::WatchedFileHandler;
}

pub use crate::core::{
    default_error_callback, ErrorCallback, Formatter, Handler, HandlerError, JsonFormatter,
    LogLevel, LogRecord, RecordFormatter, Result, TimestampFormat,
};
pub use crate::handlers::{
    BufferingHandler, FileHandler, MemoryHandler, QueueHandler, QueueListener, RecordQueue,
    RotatingFileHandler, RotationHooks, RotationInterval, TimedRotatingFileHandler,
    DEFAULT_SHUTDOWN_TIMEOUT,
};

#[cfg(unix)]
pub use crate::handlers::WatchedFileHandler;
