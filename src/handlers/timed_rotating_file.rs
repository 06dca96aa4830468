//! Time-based rotating file handler
//!
//! Rotates on a wall-clock schedule: fixed intervals (seconds, minutes,
//! hours, days) or day-anchored triggers (midnight, a specific weekday).
//! Day-anchored schedules honor an optional rotation time-of-day and
//! compensate for one-hour DST transitions crossing the rollover boundary.

use crate::core::{
    default_error_callback, ErrorCallback, Formatter, Handler, HandlerError, LogLevel, LogRecord,
    RecordFormatter, Result,
};
use crate::handlers::file::FileStream;
use crate::handlers::rotating::{Namer, RotationHooks, Rotator};
use chrono::{DateTime, Datelike, Local, NaiveTime, Timelike, Utc};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// When a timed handler rolls over
///
/// `Weekday` is day-of-week anchored, 0 = Monday through 6 = Sunday; the
/// rollover fires at the midnight (or configured time-of-day) that ends the
/// target day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationInterval {
    Second,
    Minute,
    Hour,
    Day,
    Midnight,
    Weekday(u8),
}

impl RotationInterval {
    /// Base interval length in seconds, before the multiplier
    #[must_use]
    pub fn base_seconds(&self) -> i64 {
        match self {
            RotationInterval::Second => 1,
            RotationInterval::Minute => 60,
            RotationInterval::Hour => 60 * 60,
            RotationInterval::Day | RotationInterval::Midnight => SECONDS_PER_DAY,
            RotationInterval::Weekday(_) => 7 * SECONDS_PER_DAY,
        }
    }

    /// strftime format of the backup suffix for this unit
    fn suffix_format(&self) -> &'static str {
        match self {
            RotationInterval::Second => "%Y-%m-%d_%H-%M-%S",
            RotationInterval::Minute => "%Y-%m-%d_%H-%M",
            RotationInterval::Hour => "%Y-%m-%d_%H",
            RotationInterval::Day | RotationInterval::Midnight | RotationInterval::Weekday(_) => {
                "%Y-%m-%d"
            }
        }
    }

    /// Fixed-width shape of a valid suffix, `#` standing for a digit
    fn suffix_pattern(&self) -> &'static str {
        match self {
            RotationInterval::Second => "####-##-##_##-##-##",
            RotationInterval::Minute => "####-##-##_##-##",
            RotationInterval::Hour => "####-##-##_##",
            RotationInterval::Day | RotationInterval::Midnight | RotationInterval::Weekday(_) => {
                "####-##-##"
            }
        }
    }

    /// Units whose rollover is pinned to a time-of-day rather than a span
    fn is_day_anchored(&self) -> bool {
        matches!(
            self,
            RotationInterval::Midnight | RotationInterval::Weekday(_)
        )
    }

    /// Does `suffix` look like a backup produced under this unit?
    ///
    /// A single trailing `.extension` of word characters is accepted, so a
    /// namer that appends e.g. `.log` still has its output recognized.
    pub(crate) fn matches_suffix(&self, suffix: &str) -> bool {
        let core = match suffix.find('.') {
            Some(idx) => {
                let ext = &suffix[idx + 1..];
                if ext.is_empty()
                    || !ext
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'_')
                {
                    return false;
                }
                &suffix[..idx]
            }
            None => suffix,
        };
        let pattern = self.suffix_pattern();
        core.len() == pattern.len()
            && core
                .bytes()
                .zip(pattern.bytes())
                .all(|(c, p)| if p == b'#' { c.is_ascii_digit() } else { c == p })
    }
}

/// Compensation applied when a one-hour DST transition falls between two
/// instants. Assumes the shift is exactly one hour; zones with other shift
/// widths are not corrected.
fn dst_addend(offset_now: i64, offset_then: i64) -> i64 {
    if offset_now == offset_then {
        0
    } else if offset_then > offset_now {
        -3600
    } else {
        3600
    }
}

struct TimedState {
    stream: FileStream,
    rollover_at: i64,
}

/// Rotating file handler with a wall-clock trigger and timestamp-suffixed
/// backup chain
///
/// # Examples
///
/// ```no_run
/// use log_handler_system::handlers::{RotationInterval, TimedRotatingFileHandler};
///
/// // Rotate at local midnight, keep a week of backups
/// let handler = TimedRotatingFileHandler::builder("/var/log/app.log")
///     .interval(RotationInterval::Midnight)
///     .backup_count(7)
///     .build()
///     .unwrap();
///
/// // Rotate every 4 hours, timestamps in UTC
/// let handler = TimedRotatingFileHandler::builder("/var/log/app.log")
///     .interval(RotationInterval::Hour)
///     .multiplier(4)
///     .utc(true)
///     .build()
///     .unwrap();
/// ```
pub struct TimedRotatingFileHandler {
    interval_unit: RotationInterval,
    interval: i64,
    backup_count: usize,
    utc: bool,
    at_time: Option<NaiveTime>,
    delay: bool,
    level: LogLevel,
    formatter: Arc<dyn Formatter>,
    hooks: RotationHooks,
    on_error: ErrorCallback,
    state: Mutex<TimedState>,
}

impl TimedRotatingFileHandler {
    /// Create a handler rotating hourly with no backups retained
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or opened
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::builder(path).build()
    }

    #[must_use]
    pub fn builder<P: AsRef<Path>>(path: P) -> TimedRotatingFileHandlerBuilder {
        TimedRotatingFileHandlerBuilder::new(path.as_ref().to_path_buf())
    }

    /// The effective interval in seconds (base unit times multiplier)
    #[must_use]
    pub fn interval(&self) -> i64 {
        self.interval
    }

    /// The next scheduled rollover instant, epoch seconds
    #[must_use]
    pub fn rollover_at(&self) -> i64 {
        self.state.lock().rollover_at
    }

    fn utc_offset(&self, timestamp: i64) -> i64 {
        if self.utc {
            return 0;
        }
        DateTime::from_timestamp(timestamp, 0)
            .map(|dt| i64::from(dt.with_timezone(&Local).offset().local_minus_utc()))
            .unwrap_or(0)
    }

    /// Seconds already elapsed in the civil day, and the civil weekday
    /// (0 = Monday), at `timestamp`
    fn civil_parts(&self, timestamp: i64) -> Option<(i64, i64)> {
        let utc_dt = DateTime::from_timestamp(timestamp, 0)?;
        let (hour, minute, second, weekday) = if self.utc {
            (
                utc_dt.hour(),
                utc_dt.minute(),
                utc_dt.second(),
                utc_dt.weekday().num_days_from_monday(),
            )
        } else {
            let local = utc_dt.with_timezone(&Local);
            (
                local.hour(),
                local.minute(),
                local.second(),
                local.weekday().num_days_from_monday(),
            )
        };
        Some((
            i64::from(hour) * 3600 + i64::from(minute) * 60 + i64::from(second),
            i64::from(weekday),
        ))
    }

    fn format_suffix(&self, timestamp: i64) -> String {
        match DateTime::from_timestamp(timestamp, 0) {
            Some(dt) if self.utc => dt.format(self.interval_unit.suffix_format()).to_string(),
            Some(dt) => dt
                .with_timezone(&Local)
                .format(self.interval_unit.suffix_format())
                .to_string(),
            None => timestamp.to_string(),
        }
    }

    /// Work out the rollover instant following `current`.
    ///
    /// Fixed-span units simply add the interval. Day-anchored units run the
    /// remaining seconds until the rotation time-of-day (default midnight) on
    /// the proper day; for `Weekday`, zero extra days are added when today
    /// already is the target day, so the upcoming boundary serves as the
    /// trigger.
    pub(crate) fn compute_rollover(&self, current: i64) -> i64 {
        let mut result = current + self.interval;
        if !self.interval_unit.is_day_anchored() {
            return result;
        }
        let Some((seconds_into_day, weekday)) = self.civil_parts(current) else {
            return result;
        };
        let rotate_ts = match self.at_time {
            Some(at) => i64::from(at.num_seconds_from_midnight()),
            None => SECONDS_PER_DAY,
        };
        let mut remaining = rotate_ts - seconds_into_day;
        let mut day = weekday;
        if remaining < 0 {
            // The rotation time already passed today; it fires tomorrow
            remaining += SECONDS_PER_DAY;
            day = (day + 1) % 7;
        }
        result = current + remaining;
        if let RotationInterval::Weekday(target) = self.interval_unit {
            let target = i64::from(target);
            if day != target {
                let days_to_wait = if day < target {
                    target - day
                } else {
                    6 - day + target + 1
                };
                let mut new_rollover_at = result + days_to_wait * SECONDS_PER_DAY;
                if !self.utc {
                    new_rollover_at += dst_addend(
                        self.utc_offset(current),
                        self.utc_offset(new_rollover_at),
                    );
                }
                result = new_rollover_at;
            }
        }
        result
    }

    /// Stale backups beyond `backup_count`, oldest first.
    ///
    /// Siblings qualify by the exact suffix shape of this unit, so unrelated
    /// files sharing the prefix are never deleted. The fixed-width date
    /// format makes the lexicographic sort chronological.
    fn files_to_delete(&self, base: &Path) -> Vec<PathBuf> {
        let Some(base_name) = base.file_name().and_then(|n| n.to_str()) else {
            return Vec::new();
        };
        let dir = match base.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let prefix = format!("{}.", base_name);
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut result: Vec<PathBuf> = Vec::new();
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(suffix) = name.strip_prefix(&prefix) {
                if self.interval_unit.matches_suffix(suffix) {
                    result.push(entry.path());
                }
            }
        }
        if result.len() < self.backup_count {
            return Vec::new();
        }
        result.sort();
        result.truncate(result.len() - self.backup_count);
        result
    }

    /// Rotate the live file to a suffix naming the interval that just ended,
    /// prune stale backups, and schedule the next rollover
    fn do_rollover(&self, state: &mut TimedState) -> Result<()> {
        state.stream.close()?;
        let now = Utc::now().timestamp();
        let base = state.stream.path().to_path_buf();

        // The destination carries the start of the elapsed interval, not the
        // current instant, corrected when a DST transition slid the wall
        // clock in between.
        let mut interval_start = state.rollover_at - self.interval;
        if !self.utc {
            interval_start += dst_addend(self.utc_offset(now), self.utc_offset(interval_start));
        }
        let mut default_name = base.as_os_str().to_os_string();
        default_name.push(".");
        default_name.push(self.format_suffix(interval_start));
        let dfn = self.hooks.rotation_filename(PathBuf::from(default_name));
        if dfn.exists() {
            // Tolerate another process having already removed it
            let _ = fs::remove_file(&dfn);
        }
        self.hooks.rotate(&base, &dfn)?;

        if self.backup_count > 0 {
            for stale in self.files_to_delete(&base) {
                // A backup that cannot be removed is skipped, not fatal
                let _ = fs::remove_file(&stale);
            }
        }

        if !self.delay {
            state.stream.open()?;
        }

        // A handler dormant across several intervals catches up here rather
        // than scheduling a rollover in the past.
        let mut new_rollover_at = self.compute_rollover(now);
        while new_rollover_at <= now {
            new_rollover_at += self.interval;
        }
        if self.interval_unit.is_day_anchored() && !self.utc {
            new_rollover_at += dst_addend(self.utc_offset(now), self.utc_offset(new_rollover_at));
        }
        state.rollover_at = new_rollover_at;
        Ok(())
    }

    fn try_emit(&self, record: &LogRecord) -> Result<()> {
        let line = self.formatter.render(record);
        let mut state = self.state.lock();
        state.stream.ensure_open()?;
        if Utc::now().timestamp() >= state.rollover_at {
            self.do_rollover(&mut state)?;
        }
        state.stream.write_line(&line)
    }
}

impl Handler for TimedRotatingFileHandler {
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
        "timed_rotating_file"
    }
}

/// Builder for [`TimedRotatingFileHandler`]
pub struct TimedRotatingFileHandlerBuilder {
    path: PathBuf,
    interval_unit: RotationInterval,
    multiplier: u32,
    backup_count: usize,
    utc: bool,
    at_time: Option<NaiveTime>,
    delay: bool,
    level: LogLevel,
    formatter: Arc<dyn Formatter>,
    hooks: RotationHooks,
    on_error: ErrorCallback,
}

impl TimedRotatingFileHandlerBuilder {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            interval_unit: RotationInterval::Hour,
            multiplier: 1,
            backup_count: 0,
            utc: false,
            at_time: None,
            delay: false,
            level: LogLevel::Trace,
            formatter: Arc::new(RecordFormatter::new()),
            hooks: RotationHooks::new(),
            on_error: default_error_callback(),
        }
    }

    /// Rotation unit; defaults to hourly
    #[must_use]
    pub fn interval(mut self, unit: RotationInterval) -> Self {
        self.interval_unit = unit;
        self
    }

    /// Number of units per rotation period (e.g. every 4 hours); must be ≥ 1
    #[must_use]
    pub fn multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Number of rotated backups to keep; 0 keeps everything
    #[must_use]
    pub fn backup_count(mut self, count: usize) -> Self {
        self.backup_count = count;
        self
    }

    /// Schedule and suffix in UTC instead of local time
    #[must_use]
    pub fn utc(mut self, utc: bool) -> Self {
        self.utc = utc;
        self
    }

    /// Time-of-day for Midnight/Weekday rotation, instead of midnight
    #[must_use]
    pub fn at_time(mut self, at_time: NaiveTime) -> Self {
        self.at_time = Some(at_time);
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

    /// Validate the schedule, open the file (unless delayed), and build
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a weekday outside 0..=6 or a zero
    /// multiplier, or an IO error if the file cannot be opened
    pub fn build(self) -> Result<TimedRotatingFileHandler> {
        if let RotationInterval::Weekday(day) = self.interval_unit {
            if day > 6 {
                return Err(HandlerError::config(
                    "TimedRotatingFileHandler",
                    format!("Invalid day for weekly rollover (0-6, 0 is Monday): {}", day),
                ));
            }
        }
        if self.multiplier == 0 {
            return Err(HandlerError::config(
                "TimedRotatingFileHandler",
                "Interval multiplier must be at least 1",
            ));
        }

        let mut stream = FileStream::closed(&self.path);
        if !self.delay {
            stream.open()?;
        }

        // A pre-existing file anchors the schedule at its mtime, so a
        // restart keeps rotating on the interval already in progress.
        let start = fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or_else(|| Utc::now().timestamp());

        let handler = TimedRotatingFileHandler {
            interval_unit: self.interval_unit,
            interval: self.interval_unit.base_seconds() * i64::from(self.multiplier),
            backup_count: self.backup_count,
            utc: self.utc,
            at_time: self.at_time,
            delay: self.delay,
            level: self.level,
            formatter: self.formatter,
            hooks: self.hooks,
            on_error: self.on_error,
            state: Mutex::new(TimedState {
                stream,
                rollover_at: 0,
            }),
        };
        let initial = handler.compute_rollover(start);
        handler.state.lock().rollover_at = initial;
        Ok(handler)
    }
}
