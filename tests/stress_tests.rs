//! Stress tests for concurrent delivery
//!
//! These tests verify:
//! - Rotation never loses or tears records under concurrent emit
//! - The queue pipeline survives sustained multi-producer load
//! - Memory handler flushes stay atomic against concurrent appends

use log_handler_system::core::{Formatter, Handler, LogLevel, LogRecord};
use log_handler_system::handlers::{
    MemoryHandler, QueueHandler, QueueListener, RecordQueue, RotatingFileHandler,
};
use parking_lot::Mutex;
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

struct PlainFormatter;

impl Formatter for PlainFormatter {
    fn render(&self, record: &LogRecord) -> String {
        record.rendered_message()
    }
}

struct CollectingHandler {
    records: Mutex<Vec<String>>,
}

impl Handler for CollectingHandler {
    fn emit(&self, record: &LogRecord) {
        self.records.lock().push(record.rendered_message());
    }
    fn flush(&self) {}
    fn close(&self) {}
    fn name(&self) -> &str {
        "collecting"
    }
}

#[test]
fn test_concurrent_rotation_keeps_every_record_intact() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_path = temp_dir.path().join("hammered.log");

    let handler = Arc::new(
        RotatingFileHandler::builder(&log_path)
            .max_bytes(2048)
            .backup_count(64)
            .formatter(Arc::new(PlainFormatter))
            .build()
            .expect("Failed to create handler"),
    );

    let threads = 8;
    let per_thread = 250;
    let mut joins = Vec::new();
    for t in 0..threads {
        let handler = Arc::clone(&handler);
        joins.push(thread::spawn(move || {
            for i in 0..per_thread {
                handler.emit(&LogRecord::new(
                    LogLevel::Info,
                    format!("worker-{:02}-entry-{:06}", t, i),
                ));
            }
        }));
    }
    for join in joins {
        join.join().unwrap();
    }
    handler.flush();

    // Collect every line across the whole file set
    let mut lines = Vec::new();
    for entry in fs::read_dir(temp_dir.path()).unwrap() {
        let content = fs::read_to_string(entry.unwrap().path()).unwrap();
        lines.extend(content.lines().map(String::from));
    }

    assert_eq!(lines.len(), threads * per_thread);
    // No torn writes: every line is exactly one well-formed record
    for line in &lines {
        assert!(
            line.starts_with("worker-") && line.len() == "worker-00-entry-000000".len(),
            "torn or mangled line: {:?}",
            line
        );
    }
}

#[test]
fn test_queue_pipeline_under_sustained_load() {
    let queue = RecordQueue::unbounded();
    let producer = Arc::new(QueueHandler::new(&queue));
    let sink = Arc::new(CollectingHandler {
        records: Mutex::new(Vec::new()),
    });
    let mut listener = QueueListener::new(&queue, vec![Arc::clone(&sink) as Arc<dyn Handler>]);
    listener.start();

    let threads = 8;
    let per_thread = 500;
    let mut joins = Vec::new();
    for t in 0..threads {
        let producer = Arc::clone(&producer);
        joins.push(thread::spawn(move || {
            for i in 0..per_thread {
                producer.emit(&LogRecord::new(
                    LogLevel::Info,
                    format!("producer-{:02}-seq-{:06}", t, i),
                ));
            }
        }));
    }
    for join in joins {
        join.join().unwrap();
    }
    listener.stop();

    let received = sink.records.lock();
    assert_eq!(received.len(), threads * per_thread);

    // Per-producer order survives the fan-in
    for t in 0..threads {
        let prefix = format!("producer-{:02}-", t);
        let seqs: Vec<&String> = received.iter().filter(|m| m.starts_with(&prefix)).collect();
        assert_eq!(seqs.len(), per_thread);
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn test_memory_handler_concurrent_appends_never_drop() {
    let sink = Arc::new(CollectingHandler {
        records: Mutex::new(Vec::new()),
    });
    let memory = Arc::new(
        MemoryHandler::new(7)
            .with_flush_level(LogLevel::Fatal)
            .with_target(Arc::clone(&sink) as Arc<dyn Handler>),
    );

    let threads = 6;
    let per_thread = 300;
    let mut joins = Vec::new();
    for t in 0..threads {
        let memory = Arc::clone(&memory);
        joins.push(thread::spawn(move || {
            for i in 0..per_thread {
                memory.emit(&LogRecord::new(
                    LogLevel::Info,
                    format!("m-{}-{}", t, i),
                ));
            }
        }));
    }
    for join in joins {
        join.join().unwrap();
    }
    memory.flush();

    // Every append ends up delivered exactly once
    assert_eq!(sink.records.lock().len(), threads * per_thread);
    assert!(memory.is_empty());
}

#[test]
fn test_listener_drains_backlog_before_stop_returns() {
    let queue = RecordQueue::unbounded();
    let producer = QueueHandler::new(&queue);
    let sink = Arc::new(CollectingHandler {
        records: Mutex::new(Vec::new()),
    });

    // Fill the queue before the consumer even starts
    for i in 0..1000 {
        producer.emit(&LogRecord::new(LogLevel::Info, format!("backlog-{:04}", i)));
    }

    let mut listener = QueueListener::new(&queue, vec![Arc::clone(&sink) as Arc<dyn Handler>]);
    listener.start();
    listener.stop();

    // The sentinel queues behind the backlog, so stop() sees it all drained
    assert_eq!(sink.records.lock().len(), 1000);
    assert!(queue.is_empty());
}
