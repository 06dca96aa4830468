//! Queue handler and listener
//!
//! The producer side (`QueueHandler`) turns an emit into a non-blocking
//! enqueue of a transport-safe record copy. The consumer side
//! (`QueueListener`) runs one background thread that drains the queue and
//! fans records out to a fixed roster of downstream handlers until it
//! observes the shutdown sentinel. The queue itself (`RecordQueue`) is
//! created by the caller and handed to both sides; clones share one channel.

use crate::core::{
    default_error_callback, ErrorCallback, Handler, HandlerError, LogLevel, LogRecord, Result,
};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How long an implicit shutdown (drop without `stop`) waits for the
/// listener thread before giving up
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Queue payload: a prepared record, or the reserved shutdown marker.
/// The sentinel is a distinct variant, so no record value can collide
/// with it.
enum QueueItem {
    Record(LogRecord),
    Sentinel,
}

/// FIFO channel of prepared records shared by producers and one listener
#[derive(Clone)]
pub struct RecordQueue {
    tx: Sender<QueueItem>,
    rx: Receiver<QueueItem>,
    capacity: Option<usize>,
}

impl RecordQueue {
    /// Create a queue holding at most `capacity` records
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            capacity: Some(capacity),
        }
    }

    /// Create a queue without a capacity limit
    #[must_use]
    pub fn unbounded() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            capacity: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Non-blocking enqueue of a record
    ///
    /// # Errors
    ///
    /// Returns `QueueFull` when a bounded queue has no room
    pub fn push(&self, record: LogRecord) -> Result<()> {
        match self.tx.try_send(QueueItem::Record(record)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(HandlerError::queue_full(
                self.tx.len(),
                self.capacity.unwrap_or(0),
            )),
            Err(TrySendError::Disconnected(_)) => Err(HandlerError::ChannelSendError),
        }
    }

    /// Blocking enqueue of the shutdown sentinel; must not be lost to a
    /// momentarily full queue
    fn send_sentinel(&self) -> Result<()> {
        self.tx
            .send(QueueItem::Sentinel)
            .map_err(|_| HandlerError::ChannelSendError)
    }

    fn send_sentinel_timeout(&self, timeout: Duration) -> Result<()> {
        self.tx
            .send_timeout(QueueItem::Sentinel, timeout)
            .map_err(|_| HandlerError::ChannelSendError)
    }
}

/// Producer-side adapter: serializes a record into a transport-safe form and
/// enqueues it without blocking
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use log_handler_system::core::{Handler, LogLevel, LogRecord};
/// use log_handler_system::handlers::{QueueHandler, QueueListener, RecordQueue};
///
/// let queue = RecordQueue::bounded(1024);
/// let producer = QueueHandler::new(&queue);
/// let mut listener = QueueListener::new(&queue, vec![]);
/// listener.start();
///
/// producer.handle(&LogRecord::new(LogLevel::Info, "crosses the thread boundary"));
/// listener.stop();
/// ```
pub struct QueueHandler {
    queue: RecordQueue,
    level: LogLevel,
    on_error: ErrorCallback,
}

impl QueueHandler {
    #[must_use]
    pub fn new(queue: &RecordQueue) -> Self {
        Self {
            queue: queue.clone(),
            level: LogLevel::Trace,
            on_error: default_error_callback(),
        }
    }

    /// Set the severity threshold
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set the error callback
    #[must_use]
    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = callback;
        self
    }

    /// Build the transport-safe copy that actually crosses the queue.
    ///
    /// The message is rendered once so the consumer never touches the
    /// original args, and captured backtrace text is dropped since it is
    /// both rendered already and potentially enormous.
    #[must_use]
    pub fn prepare(&self, record: &LogRecord) -> LogRecord {
        let mut prepared = record.clone();
        prepared.message = record.rendered_message();
        prepared.args = Vec::new();
        prepared.exc_text = None;
        prepared
    }
}

impl Handler for QueueHandler {
    fn emit(&self, record: &LogRecord) {
        if let Err(e) = self.queue.push(self.prepare(record)) {
            (self.on_error)(&e);
        }
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn flush(&self) {}

    fn close(&self) {}

    fn name(&self) -> &str {
        "queue"
    }
}

/// Background consumer fanning queued records out to downstream handlers
///
/// Exactly one consumer thread runs per started listener; `stop` enqueues
/// the sentinel and joins, after which no further dispatch occurs.
pub struct QueueListener {
    queue: RecordQueue,
    handlers: Arc<Vec<Arc<dyn Handler>>>,
    respect_handler_level: bool,
    worker: Option<thread::JoinHandle<()>>,
}

impl QueueListener {
    /// Create a listener over `queue` dispatching to `handlers`; the roster
    /// is fixed for the listener's lifetime
    #[must_use]
    pub fn new(queue: &RecordQueue, handlers: Vec<Arc<dyn Handler>>) -> Self {
        Self {
            queue: queue.clone(),
            handlers: Arc::new(handlers),
            respect_handler_level: false,
            worker: None,
        }
    }

    /// Skip handlers whose severity threshold exceeds the record's level
    #[must_use]
    pub fn with_respect_handler_level(mut self, respect: bool) -> Self {
        self.respect_handler_level = respect;
        self
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Spin up the consumer thread. A second call while running is a no-op.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let receiver = self.queue.rx.clone();
        let handlers = Arc::clone(&self.handlers);
        let respect = self.respect_handler_level;
        self.worker = Some(thread::spawn(move || {
            Self::monitor(&receiver, &handlers, respect);
        }));
    }

    /// The consumer loop: blocking dequeue until the sentinel (or a fully
    /// disconnected channel) ends it. A panicking downstream handler is
    /// isolated so one bad record cannot kill the listener.
    fn monitor(receiver: &Receiver<QueueItem>, handlers: &[Arc<dyn Handler>], respect: bool) {
        loop {
            match receiver.recv() {
                Ok(QueueItem::Record(record)) => {
                    for (idx, handler) in handlers.iter().enumerate() {
                        if respect && record.level < handler.level() {
                            continue;
                        }
                        let dispatched = std::panic::catch_unwind(
                            std::panic::AssertUnwindSafe(|| handler.emit(&record)),
                        );
                        if dispatched.is_err() {
                            eprintln!(
                                "[HANDLER CRITICAL] Downstream handler #{} panicked; \
                                 listener continues with the next record.",
                                idx
                            );
                        }
                    }
                }
                Ok(QueueItem::Sentinel) | Err(_) => break,
            }
        }
        for handler in handlers {
            handler.flush();
        }
    }

    /// Enqueue the sentinel and wait for the consumer to observe it.
    ///
    /// Records enqueued before the sentinel are still dispatched; nothing is
    /// dispatched after this returns. Returns false if no consumer was
    /// running.
    pub fn stop(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };
        // A send error means every receiver is gone and the worker has
        // already exited; joining is still correct.
        let _ = self.queue.send_sentinel();
        if worker.join().is_err() {
            eprintln!("[HANDLER ERROR] Listener thread panicked during shutdown");
        }
        true
    }
}

impl Drop for QueueListener {
    fn drop(&mut self) {
        // Implicit shutdown must not hang a teardown path, so unlike stop()
        // this gives up after DEFAULT_SHUTDOWN_TIMEOUT.
        if let Some(worker) = self.worker.take() {
            let _ = self.queue.send_sentinel_timeout(DEFAULT_SHUTDOWN_TIMEOUT);
            let start = Instant::now();
            while !worker.is_finished() && start.elapsed() < DEFAULT_SHUTDOWN_TIMEOUT {
                thread::sleep(Duration::from_millis(10));
            }
            if worker.is_finished() {
                if worker.join().is_err() {
                    eprintln!("[HANDLER ERROR] Listener thread panicked during shutdown");
                }
            } else {
                eprintln!(
                    "[HANDLER WARNING] Listener thread did not finish within {:?} timeout. \
                     Some records may be lost.",
                    DEFAULT_SHUTDOWN_TIMEOUT
                );
            }
        }
    }
}
