//! Log record structure

use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

/// Get cached thread ID, computing and caching it on first access
fn get_thread_id() -> String {
    THREAD_ID_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if cache.is_none() {
            *cache = Some(format!("{:?}", std::thread::current().id()));
        }
        cache.as_ref().expect("thread_id cache initialized in previous line").clone()
    })
}

/// Get cached thread name, computing and caching it on first access
fn get_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if cache.is_none() {
            *cache = Some(std::thread::current().name().map(String::from));
        }
        cache.as_ref().expect("thread_name cache initialized in previous line").clone()
    })
}

/// A structured log record consumed by handlers.
///
/// The message is a template with `{}` placeholders merged with `args` by
/// [`rendered_message`](Self::rendered_message). `exc_text` carries captured
/// backtrace text when present; queue transport clears it since it is not
/// meaningful across a thread boundary once the message is rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub thread_id: String,
    pub thread_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exc_text: Option<String>,
}

impl LogRecord {
    /// Sanitize log message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// to prevent attackers from injecting fake log entries.
    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: Self::sanitize_message(&message.into()),
            args: Vec::new(),
            timestamp: Utc::now(),
            thread_id: get_thread_id(),
            thread_name: get_thread_name(),
            exc_text: None,
        }
    }

    /// Attach positional arguments substituted into `{}` placeholders
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Attach captured backtrace text
    pub fn with_exc_text(mut self, text: impl Into<String>) -> Self {
        self.exc_text = Some(Self::sanitize_message(&text.into()));
        self
    }

    /// Merge the message template with its positional arguments.
    ///
    /// Each `{}` placeholder consumes one argument in order; leftover
    /// placeholders and leftover arguments are kept verbatim rather than
    /// treated as errors.
    pub fn rendered_message(&self) -> String {
        if self.args.is_empty() {
            return self.message.clone();
        }
        let mut out = String::with_capacity(self.message.len() + 16 * self.args.len());
        let mut args = self.args.iter();
        let mut rest = self.message.as_str();
        while let Some(pos) = rest.find("{}") {
            match args.next() {
                Some(arg) => {
                    out.push_str(&rest[..pos]);
                    out.push_str(arg);
                    rest = &rest[pos + 2..];
                }
                None => break,
            }
        }
        out.push_str(rest);
        out
    }
}
