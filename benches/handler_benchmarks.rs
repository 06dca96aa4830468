//! Criterion benchmarks for log_handler_system

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use log_handler_system::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Record and Formatting Benchmarks
// ============================================================================

fn bench_record_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_creation");
    group.throughput(Throughput::Elements(1));

    group.bench_function("plain", |b| {
        b.iter(|| {
            let record = LogRecord::new(LogLevel::Info, black_box("Benchmark message"));
            black_box(record)
        });
    });

    group.bench_function("with_args", |b| {
        b.iter(|| {
            let record = LogRecord::new(LogLevel::Info, black_box("user {} did {}"))
                .with_args(["alice", "login"]);
            black_box(record)
        });
    });

    group.finish();
}

fn bench_formatters(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatters");
    group.throughput(Throughput::Elements(1));

    let record = LogRecord::new(LogLevel::Info, "request {} handled in {} ms")
        .with_args(["GET /health", "12"]);
    let text = RecordFormatter::new();
    let json = JsonFormatter::new();

    group.bench_function("text", |b| {
        b.iter(|| black_box(text.render(&record)));
    });

    group.bench_function("json", |b| {
        b.iter(|| black_box(json.render(&record)));
    });

    group.finish();
}

// ============================================================================
// File Delivery Benchmarks
// ============================================================================

fn bench_file_handlers(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_handlers");
    group.throughput(Throughput::Elements(1));

    let dir = TempDir::new().expect("temp dir");

    let plain = FileHandler::new(dir.path().join("bench_plain.log")).expect("file handler");
    group.bench_function("plain_emit", |b| {
        b.iter(|| {
            plain.emit(&LogRecord::new(LogLevel::Info, black_box("bench record")));
        });
    });

    let rotating = RotatingFileHandler::builder(dir.path().join("bench_rotating.log"))
        .max_bytes(8 * 1024 * 1024)
        .backup_count(3)
        .build()
        .expect("rotating handler");
    group.bench_function("rotating_emit", |b| {
        b.iter(|| {
            rotating.emit(&LogRecord::new(LogLevel::Info, black_box("bench record")));
        });
    });

    group.finish();
}

// ============================================================================
// Queue Pipeline Benchmarks
// ============================================================================

fn bench_queue_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_pipeline");
    group.throughput(Throughput::Elements(1));

    let queue = RecordQueue::unbounded();
    let producer = QueueHandler::new(&queue);
    let mut listener = QueueListener::new(&queue, vec![]);
    listener.start();

    group.bench_function("enqueue", |b| {
        b.iter(|| {
            producer.emit(&LogRecord::new(LogLevel::Info, black_box("queued record")));
        });
    });

    listener.stop();

    let prepared_source = LogRecord::new(LogLevel::Warn, "retry {} of {}").with_args(["2", "5"]);
    group.bench_function("prepare", |b| {
        b.iter(|| black_box(producer.prepare(&prepared_source)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_record_creation,
    bench_formatters,
    bench_file_handlers,
    bench_queue_pipeline
);
criterion_main!(benches);
