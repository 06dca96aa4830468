//! Watched file handler
//!
//! Reacts to rotation performed by an external process (newsyslog,
//! logrotate): before every emit the path is stat'ed by name, and when the
//! device/inode identity no longer matches the open stream the handler
//! reopens instead of writing into the renamed-away file. It never renames
//! anything itself. Unix-only, since the identity check relies on inodes.

use crate::core::{
    default_error_callback, ErrorCallback, Formatter, Handler, HandlerError, LogLevel, LogRecord,
    RecordFormatter, Result,
};
use crate::handlers::file::FileStream;
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::Arc;

/// Device/inode identity of the currently open stream
type WatchToken = (u64, u64);

struct WatchState {
    stream: FileStream,
    token: Option<WatchToken>,
}

/// File handler that follows external log rotation
///
/// # Examples
///
/// ```no_run
/// use log_handler_system::handlers::WatchedFileHandler;
/// use log_handler_system::core::{Handler, LogLevel, LogRecord};
///
/// let handler = WatchedFileHandler::new("/var/log/app.log").unwrap();
/// // logrotate may move the file at any point; emits keep landing in the
/// // file currently at the path
/// handler.emit(&LogRecord::new(LogLevel::Info, "still routed correctly"));
/// ```
pub struct WatchedFileHandler {
    level: LogLevel,
    formatter: Arc<dyn Formatter>,
    on_error: ErrorCallback,
    state: Mutex<WatchState>,
}

impl WatchedFileHandler {
    /// Create a handler and open the file immediately
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or opened
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut state = WatchState {
            stream: FileStream::closed(path.as_ref()),
            token: None,
        };
        state.stream.open()?;
        Self::stat_stream(&mut state)?;
        Ok(Self::from_state(state))
    }

    /// Create a handler that defers opening until the first emit
    pub fn delayed<P: AsRef<Path>>(path: P) -> Self {
        Self::from_state(WatchState {
            stream: FileStream::closed(path.as_ref()),
            token: None,
        })
    }

    fn from_state(state: WatchState) -> Self {
        Self {
            level: LogLevel::Trace,
            formatter: Arc::new(RecordFormatter::new()),
            on_error: default_error_callback(),
            state: Mutex::new(state),
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

    /// Refresh the identity token from the open descriptor.
    ///
    /// Always taken from the stream's own descriptor, not the path, so a
    /// replacement racing between open and stat is caught on the next emit.
    fn stat_stream(state: &mut WatchState) -> Result<()> {
        state.token = match state.stream.file() {
            Some(file) => {
                let metadata = file.metadata().map_err(|e| {
                    HandlerError::io_operation(
                        "stat watched log stream",
                        format!(
                            "Cannot stat open stream for '{}'",
                            state.stream.path().display()
                        ),
                        e,
                    )
                })?;
                Some((metadata.dev(), metadata.ino()))
            }
            None => None,
        };
        Ok(())
    }

    /// Reopen when the file at the path is no longer the file we hold open
    fn reopen_if_needed(&self, state: &mut WatchState) -> Result<()> {
        let on_disk = match fs::metadata(state.stream.path()) {
            Ok(metadata) => Some((metadata.dev(), metadata.ino())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(HandlerError::io_operation(
                    "stat watched log file",
                    format!("Cannot stat '{}'", state.stream.path().display()),
                    e,
                ))
            }
        };

        if state.stream.is_open() && (on_disk.is_none() || on_disk != state.token) {
            state.stream.close()?;
            state.stream.open()?;
            Self::stat_stream(state)?;
        }
        Ok(())
    }

    fn try_emit(&self, record: &LogRecord) -> Result<()> {
        let line = self.formatter.render(record);
        let mut state = self.state.lock();
        self.reopen_if_needed(&mut state)?;
        state.stream.write_line(&line)?;
        if state.token.is_none() {
            // First write under delayed open; capture the identity now
            Self::stat_stream(&mut state)?;
        }
        Ok(())
    }
}

impl Handler for WatchedFileHandler {
    fn emit(&self, record: &LogRecord) {
        if let Err(e) = self.try_emit(record) {
            (self.on_error)(&e);
        }
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn flush(&self) {
        if let Err(e) = self.state.lock().stream.flush() {
            (self.on_error)(&e);
        }
    }

    fn close(&self) {
        if let Err(e) = self.state.lock().stream.close() {
            (self.on_error)(&e);
        }
    }

    fn name(&self) -> &str {
        "watched_file"
    }
}
