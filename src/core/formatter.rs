//! Record formatting seam
//!
//! Handlers need the final text of a record before writing or enqueueing it,
//! but the rendering policy itself is pluggable. The stock implementations
//! cover the common cases: a timestamped text line and single-line JSON
//! (JSONL, compatible with log aggregation tools like ELK or Loki).

use super::log_record::LogRecord;
use super::timestamp::TimestampFormat;

/// Renders a log record into its final output text, without a trailing
/// newline. Handlers append the line terminator themselves so the size
/// accounting for rotation stays exact.
pub trait Formatter: Send + Sync {
    fn render(&self, record: &LogRecord) -> String;
}

/// Default text formatter: `[timestamp] [LEVEL] [thread] message`
#[derive(Debug, Clone, Default)]
pub struct RecordFormatter {
    timestamp_format: TimestampFormat,
    include_thread: bool,
}

impl RecordFormatter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            timestamp_format: TimestampFormat::default(),
            include_thread: false,
        }
    }

    /// Set the timestamp format
    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Set a custom timestamp format using a strftime-compatible format string
    #[must_use]
    pub fn with_custom_timestamp(mut self, format_str: &str) -> Self {
        self.timestamp_format = TimestampFormat::Custom(format_str.to_string());
        self
    }

    /// Include the originating thread name (or id) in the output
    #[must_use]
    pub fn with_thread_info(mut self, include: bool) -> Self {
        self.include_thread = include;
        self
    }
}

impl Formatter for RecordFormatter {
    fn render(&self, record: &LogRecord) -> String {
        let timestamp_str = self.timestamp_format.format(&record.timestamp);
        let mut output = if self.include_thread {
            format!(
                "[{}] [{:5}] [{}] {}",
                timestamp_str,
                record.level.to_str(),
                record.thread_name.as_ref().unwrap_or(&record.thread_id),
                record.rendered_message()
            )
        } else {
            format!(
                "[{}] [{:5}] {}",
                timestamp_str,
                record.level.to_str(),
                record.rendered_message()
            )
        };

        if let Some(ref exc) = record.exc_text {
            output.push_str(" | ");
            output.push_str(exc);
        }

        output
    }
}

/// JSON formatter: one JSON object per record (JSONL)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Formatter for JsonFormatter {
    fn render(&self, record: &LogRecord) -> String {
        // A record built from owned strings always serializes; fall back to
        // the plain message if a caller-injected value ever refuses to.
        serde_json::to_string(record).unwrap_or_else(|_| record.rendered_message())
    }
}
