//! Core handler types and traits

pub mod error;
pub mod formatter;
pub mod handler;
pub mod log_level;
pub mod log_record;
pub mod timestamp;

pub use error::{HandlerError, Result};
pub use formatter::{Formatter, JsonFormatter, RecordFormatter};
pub use handler::{default_error_callback, ErrorCallback, Handler};
pub use log_level::LogLevel;
pub use log_record::LogRecord;
pub use timestamp::TimestampFormat;
