//! File handler and shared stream plumbing
//!
//! `FileStream` is the append-mode stream used by every file-backed handler:
//! it opens lazily, creates missing parent directories, tracks the current
//! size for rotation accounting, and guarantees flush-before-close on all
//! paths. `FileHandler` is the plain non-rotating handler built on top of it.

use crate::core::{
    default_error_callback, ErrorCallback, Formatter, Handler, HandlerError, LogLevel, LogRecord,
    RecordFormatter, Result,
};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An append-mode log stream with deferred-open support.
///
/// Rotation-capable handlers always open in append mode: honoring a truncate
/// mode across process restarts would silently discard the previous run's
/// records before the first rollover.
pub(crate) struct FileStream {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    current_size: u64,
}

impl FileStream {
    /// Create a stream handle without opening the file
    pub(crate) fn closed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            current_size: 0,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub(crate) fn size(&self) -> u64 {
        self.current_size
    }

    /// The open file, for callers that need descriptor-level metadata
    pub(crate) fn file(&self) -> Option<&File> {
        self.writer.as_ref().map(BufWriter::get_ref)
    }

    /// Open the file in append mode, creating parent directories as needed
    pub(crate) fn open(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    HandlerError::io_operation(
                        "create log directory",
                        format!("Failed to create directory '{}'", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                HandlerError::file_handler(
                    self.path.display().to_string(),
                    format!("Failed to open: {}", e),
                )
            })?;

        let metadata = file.metadata().map_err(|e| {
            HandlerError::file_handler(
                self.path.display().to_string(),
                format!("Cannot access file metadata: {}", e),
            )
        })?;
        self.current_size = metadata.len();
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    pub(crate) fn ensure_open(&mut self) -> Result<()> {
        if self.writer.is_none() {
            self.open()?;
        }
        Ok(())
    }

    /// Write one rendered record plus line terminator
    pub(crate) fn write_line(&mut self, line: &str) -> Result<()> {
        self.ensure_open()?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| HandlerError::writer("File writer not initialized"))?;
        writer.write_all(line.as_bytes()).map_err(|e| {
            HandlerError::file_handler(
                self.path.display().to_string(),
                format!("Failed to write log record: {}", e),
            )
        })?;
        writer.write_all(b"\n").map_err(|e| {
            HandlerError::file_handler(
                self.path.display().to_string(),
                format!("Failed to write log record: {}", e),
            )
        })?;
        self.current_size += line.len() as u64 + 1;
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush().map_err(|e| {
                HandlerError::file_handler(
                    self.path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }

    /// Flush and release the file handle. The next write reopens.
    pub(crate) fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                HandlerError::file_handler(
                    self.path.display().to_string(),
                    format!("Failed to flush before close: {}", e),
                )
            })?;
            // Writer is dropped here, releasing the file handle
        }
        self.current_size = 0;
        Ok(())
    }
}

impl Drop for FileStream {
    fn drop(&mut self) {
        // Best effort flush - ignore errors during drop
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}

/// Plain file handler without rotation
///
/// # Examples
///
/// ```no_run
/// use log_handler_system::handlers::FileHandler;
/// use log_handler_system::core::{Handler, LogLevel, LogRecord};
///
/// let handler = FileHandler::new("/var/log/app.log").unwrap();
/// handler.handle(&LogRecord::new(LogLevel::Info, "service started"));
/// handler.flush();
/// ```
pub struct FileHandler {
    level: LogLevel,
    formatter: Arc<dyn Formatter>,
    on_error: ErrorCallback,
    stream: Mutex<FileStream>,
}

impl FileHandler {
    /// Create a handler and open the file immediately
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or opened
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut stream = FileStream::closed(path.as_ref());
        stream.open()?;
        Ok(Self::from_stream(stream))
    }

    /// Create a handler that defers opening until the first emit
    pub fn delayed<P: AsRef<Path>>(path: P) -> Self {
        Self::from_stream(FileStream::closed(path.as_ref()))
    }

    fn from_stream(stream: FileStream) -> Self {
        Self {
            level: LogLevel::Trace,
            formatter: Arc::new(RecordFormatter::new()),
            on_error: default_error_callback(),
            stream: Mutex::new(stream),
        }
    }

    /// Set the severity threshold
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set the record formatter
    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Set the error callback
    #[must_use]
    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = callback;
        self
    }

    fn try_emit(&self, record: &LogRecord) -> Result<()> {
        let line = self.formatter.render(record);
        self.stream.lock().write_line(&line)
    }
}

impl Handler for FileHandler {
    fn emit(&self, record: &LogRecord) {
        if let Err(e) = self.try_emit(record) {
            (self.on_error)(&e);
        }
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn flush(&self) {
        if let Err(e) = self.stream.lock().flush() {
            (self.on_error)(&e);
        }
    }

    fn close(&self) {
        if let Err(e) = self.stream.lock().close() {
            (self.on_error)(&e);
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}
