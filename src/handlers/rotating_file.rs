//! Size-based rotating file handler
//!
//! Switches from one file to the next when the current file would exceed a
//! byte limit, keeping a numeric backup chain `base.1 .. base.N` with `.1`
//! always the most recent backup.

use crate::core::{
    default_error_callback, ErrorCallback, Formatter, Handler, HandlerError, LogLevel, LogRecord,
    RecordFormatter, Result,
};
use crate::handlers::file::FileStream;
use crate::handlers::rotating::{replace_file, Namer, RotationHooks, Rotator};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Rotating file handler with a size trigger and numeric backup chain
///
/// # Examples
///
/// ```no_run
/// use log_handler_system::handlers::RotatingFileHandler;
///
/// // Rotate past 10 MB, keep five backups
/// let handler = RotatingFileHandler::builder("/var/log/app.log")
///     .max_bytes(10 * 1024 * 1024)
///     .backup_count(5)
///     .build()
///     .unwrap();
/// ```
pub struct RotatingFileHandler {
    max_bytes: u64,
    backup_count: usize,
    delay: bool,
    level: LogLevel,
    formatter: Arc<dyn Formatter>,
    hooks: RotationHooks,
    on_error: ErrorCallback,
    stream: Mutex<FileStream>,
}

impl RotatingFileHandler {
    /// Create a handler with rotation disabled (`max_bytes` 0, no backups)
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or opened
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::builder(path).build()
    }

    #[must_use]
    pub fn builder<P: AsRef<Path>>(path: P) -> RotatingFileHandlerBuilder {
        RotatingFileHandlerBuilder::new(path.as_ref().to_path_buf())
    }

    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    #[must_use]
    pub fn backup_count(&self) -> usize {
        self.backup_count
    }

    /// Get backup file path for given index
    fn backup_path(base: &Path, index: usize) -> PathBuf {
        let mut path = base.to_path_buf();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("app.log");
        path.set_file_name(format!("{}.{}", filename, index));
        path
    }

    /// Would writing `line` push the file past the limit?
    ///
    /// The record is rendered before this check so the measurement covers the
    /// exact bytes about to be written, including the line terminator.
    fn should_rollover(&self, stream: &mut FileStream, line: &str) -> Result<bool> {
        stream.ensure_open()?;
        if self.max_bytes == 0 {
            return Ok(false);
        }
        Ok(stream.size() + line.len() as u64 + 1 >= self.max_bytes)
    }

    /// Shift the backup chain up by one and move the live file to `.1`
    fn do_rollover(&self, stream: &mut FileStream) -> Result<()> {
        stream.close()?;

        if self.backup_count > 0 {
            let base = stream.path().to_path_buf();
            for i in (1..self.backup_count).rev() {
                let sfn = self.hooks.rotation_filename(Self::backup_path(&base, i));
                let dfn = self.hooks.rotation_filename(Self::backup_path(&base, i + 1));
                if sfn.exists() {
                    replace_file(&sfn, &dfn).map_err(|e| {
                        HandlerError::file_rotation(
                            sfn.display().to_string(),
                            format!("Failed to shift backup chain: {}", e),
                        )
                    })?;
                }
            }
            let dfn = self.hooks.rotation_filename(Self::backup_path(&base, 1));
            if dfn.exists() {
                // Tolerate another process having already removed it
                let _ = fs::remove_file(&dfn);
            }
            self.hooks.rotate(&base, &dfn)?;
        }

        if !self.delay {
            stream.open()?;
        }
        Ok(())
    }

    fn try_emit(&self, record: &LogRecord) -> Result<()> {
        let line = self.formatter.render(record);
        let mut stream = self.stream.lock();
        if self.should_rollover(&mut stream, &line)? {
            self.do_rollover(&mut stream)?;
        }
        stream.write_line(&line)
    }
}

impl Handler for RotatingFileHandler {
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
        "rotating_file"
    }
}

/// Builder for [`RotatingFileHandler`]
pub struct RotatingFileHandlerBuilder {
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    delay: bool,
    level: LogLevel,
    formatter: Arc<dyn Formatter>,
    hooks: RotationHooks,
    on_error: ErrorCallback,
}

impl RotatingFileHandlerBuilder {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            max_bytes: 0,
            backup_count: 0,
            delay: false,
            level: LogLevel::Trace,
            formatter: Arc::new(RecordFormatter::new()),
            hooks: RotationHooks::new(),
            on_error: default_error_callback(),
        }
    }

    /// Byte limit that triggers rotation; 0 disables rotation
    #[must_use]
    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Number of rotated backups to keep
    #[must_use]
    pub fn backup_count(mut self, count: usize) -> Self {
        self.backup_count = count;
        self
    }

    /// Defer opening the file until the first emit
    #[must_use]
    pub fn delay(mut self, delay: bool) -> Self {
        self.delay = delay;
        self
    }

    /// Severity threshold
    #[must_use]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Record formatter
    #[must_use]
    pub fn formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Destination-naming callback
    #[must_use]
    pub fn namer(mut self, namer: Namer) -> Self {
        self.hooks = self.hooks.with_namer(namer);
        self
    }

    /// Rotation callback replacing the default rename
    #[must_use]
    pub fn rotator(mut self, rotator: Rotator) -> Self {
        self.hooks = self.hooks.with_rotator(rotator);
        self
    }

    /// Error callback
    #[must_use]
    pub fn error_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = callback;
        self
    }

    /// Open the file (unless delayed) and build the handler
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or opened
    pub fn build(self) -> Result<RotatingFileHandler> {
        let mut stream = FileStream::closed(&self.path);
        if !self.delay {
            stream.open()?;
        }
        Ok(RotatingFileHandler {
            max_bytes: self.max_bytes,
            backup_count: self.backup_count,
            delay: self.delay,
            level: self.level,
            formatter: self.formatter,
            hooks: self.hooks,
            on_error: self.on_error,
            stream: Mutex::new(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    /// Renders the bare message so byte counts in tests are exact
    struct PlainFormatter;

    impl Formatter for PlainFormatter {
        fn render(&self, record: &LogRecord) -> String {
            record.rendered_message()
        }
    }

    fn plain_handler(path: &Path, max_bytes: u64, backup_count: usize) -> RotatingFileHandler {
        RotatingFileHandler::builder(path)
            .max_bytes(max_bytes)
            .backup_count(backup_count)
            .formatter(Arc::new(PlainFormatter))
            .build()
            .unwrap()
    }

    #[test]
    fn test_no_rotation_when_max_bytes_zero() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("unbounded.log");

        let handler = plain_handler(&log_path, 0, 3);
        for i in 0..100 {
            handler.emit(&LogRecord::new(LogLevel::Info, format!("record {}", i)));
        }
        handler.flush();

        assert!(!log_path.with_file_name("unbounded.log.1").exists());
    }

    #[test]
    fn test_oversized_record_rolls_over_before_write() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("big.log");

        let handler = plain_handler(&log_path, 100, 2);
        let message = "x".repeat(101);
        handler.emit(&LogRecord::new(LogLevel::Info, message.clone()));
        handler.flush();

        // The empty initial file was rotated aside first
        let backup = log_path.with_file_name("big.log.1");
        assert!(backup.exists());
        assert_eq!(fs::metadata(&backup).unwrap().len(), 0);

        let content = fs::read_to_string(&log_path).unwrap();
        assert_eq!(content, format!("{}\n", message));
    }

    #[test]
    fn test_backup_chain_bounded_and_ordered() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("chain.log");

        // 25-byte records against a 30-byte cap: every emit after the first rotates
        let handler = plain_handler(&log_path, 30, 3);
        for i in 0..6 {
            handler.emit(&LogRecord::new(LogLevel::Info, format!("record-number-{:010}", i)));
        }
        handler.flush();

        // Exactly backup_count backups survive
        assert!(log_path.with_file_name("chain.log.1").exists());
        assert!(log_path.with_file_name("chain.log.2").exists());
        assert!(log_path.with_file_name("chain.log.3").exists());
        assert!(!log_path.with_file_name("chain.log.4").exists());

        // Index 1 is the most recently rotated, live file holds the newest record
        let live = fs::read_to_string(&log_path).unwrap();
        assert!(live.contains("record-number-0000000005"));
        let newest_backup =
            fs::read_to_string(log_path.with_file_name("chain.log.1")).unwrap();
        assert!(newest_backup.contains("record-number-0000000004"));
        let oldest_backup =
            fs::read_to_string(log_path.with_file_name("chain.log.3")).unwrap();
        assert!(oldest_backup.contains("record-number-0000000002"));
    }

    #[test]
    fn test_zero_backup_count_keeps_single_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("solo.log");

        let handler = plain_handler(&log_path, 20, 0);
        for i in 0..10 {
            handler.emit(&LogRecord::new(LogLevel::Info, format!("entry {}", i)));
        }
        handler.flush();

        assert!(log_path.exists());
        assert!(!log_path.with_file_name("solo.log.1").exists());
        // Append mode is kept, so nothing written is lost
        let content = fs::read_to_string(&log_path).unwrap();
        assert_eq!(content.lines().count(), 10);
    }

    #[test]
    fn test_namer_applies_to_backup_names() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("named.log");

        let handler = RotatingFileHandler::builder(&log_path)
            .max_bytes(10)
            .backup_count(2)
            .formatter(Arc::new(PlainFormatter))
            .namer(Arc::new(|default: &Path| {
                let mut name = default.as_os_str().to_os_string();
                name.push(".old");
                PathBuf::from(name)
            }))
            .build()
            .unwrap();

        handler.emit(&LogRecord::new(LogLevel::Info, "0123456789abcdef"));
        handler.emit(&LogRecord::new(LogLevel::Info, "0123456789abcdef"));
        handler.flush();

        assert!(log_path.with_file_name("named.log.1.old").exists());
        assert!(!log_path.with_file_name("named.log.1").exists());
    }

    #[test]
    fn test_delayed_handler_creates_file_on_emit() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("lazy.log");

        let handler = RotatingFileHandler::builder(&log_path)
            .max_bytes(1024)
            .backup_count(1)
            .delay(true)
            .formatter(Arc::new(PlainFormatter))
            .build()
            .unwrap();
        assert!(!log_path.exists());

        handler.emit(&LogRecord::new(LogLevel::Info, "first"));
        handler.flush();
        assert!(log_path.exists());
    }

    #[test]
    fn test_concurrent_emitters_do_not_lose_records() {
        use std::thread;

        let dir = tempdir().unwrap();
        let log_path = dir.path().join("threads.log");

        let handler = Arc::new(plain_handler(&log_path, 1000, 20));
        let mut joins = Vec::new();
        for t in 0..4 {
            let handler = Arc::clone(&handler);
            joins.push(thread::spawn(move || {
                for i in 0..50 {
                    handler.emit(&LogRecord::new(
                        LogLevel::Info,
                        format!("thread-{}-record-{:04}", t, i),
                    ));
                }
            }));
        }
        for join in joins {
            join.join().unwrap();
        }
        handler.flush();

        // Every record landed in exactly one generation of the file set
        let mut total = 0;
        for entry in fs::read_dir(dir.path()).unwrap() {
            let entry = entry.unwrap();
            let content = fs::read_to_string(entry.path()).unwrap();
            total += content.lines().count();
        }
        assert_eq!(total, 200);
    }
}
