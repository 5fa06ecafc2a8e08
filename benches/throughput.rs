//! # Throughput Benchmarks
//!
//! Overhead of the limiter and monitor on the hot path.
//!
//! Run with: `cargo bench --bench throughput`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use streamrate::{LimitReader, LimitWriter, LimiterConfig, Monitor, MonitorWriter};

/// Benchmark a single `Monitor::add` call
fn bench_monitor_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("monitor_add");
    group.throughput(Throughput::Elements(1));

    group.bench_function("single_thread", |b| {
        let (monitor, _samples) = Monitor::new(Duration::from_secs(60));
        b.iter(|| monitor.add(std::hint::black_box(1024)));
    });

    group.finish();
}

/// Benchmark concurrent `add` calls on a shared monitor
fn bench_monitor_add_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("monitor_add_concurrent");

    for num_threads in [2, 4, 8] {
        group.throughput(Throughput::Elements(num_threads as u64 * 1000));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let (monitor, _samples) = Monitor::new(Duration::from_secs(60));
                let monitor = Arc::new(monitor);

                b.iter_custom(|iters| {
                    let mut total_duration = Duration::ZERO;

                    for _ in 0..iters {
                        let start = Instant::now();

                        let handles: Vec<_> = (0..num_threads)
                            .map(|_| {
                                let monitor = monitor.clone();
                                thread::spawn(move || {
                                    for _ in 0..1000 {
                                        monitor.add(1);
                                    }
                                })
                            })
                            .collect();

                        for handle in handles {
                            handle.join().unwrap();
                        }

                        total_duration += start.elapsed();
                    }

                    total_duration
                });
            },
        );
    }

    group.finish();
}

/// Benchmark a monitored writer against a bare sink
fn bench_monitor_writer(c: &mut Criterion) {
    let mut group = c.benchmark_group("monitor_writer");
    let chunk = vec![0u8; 4096];
    group.throughput(Throughput::Bytes(chunk.len() as u64));

    group.bench_function("bare_sink", |b| {
        let mut sink = io::sink();
        b.iter(|| sink.write_all(std::hint::black_box(&chunk)).unwrap());
    });

    group.bench_function("monitored_sink", |b| {
        let (mut writer, _samples) = MonitorWriter::new(io::sink(), Duration::from_secs(60));
        b.iter(|| writer.write_all(std::hint::black_box(&chunk)).unwrap());
    });

    group.finish();
}

/// Benchmark limiter bookkeeping with a rate high enough never to sleep
fn bench_limit_unthrottled(c: &mut Criterion) {
    let mut group = c.benchmark_group("limit_unthrottled");

    for size in [64usize, 4096, 65536] {
        let chunk = vec![0u8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("write", size), &chunk, |b, chunk| {
            let mut writer = LimitWriter::with_config(io::sink(), LimiterConfig::default());
            b.iter(|| writer.write_all(std::hint::black_box(chunk)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("read", size), &size, |b, &size| {
            let mut reader = LimitReader::with_config(io::repeat(7), LimiterConfig::default());
            let mut buf = vec![0u8; size];
            b.iter(|| std::hint::black_box(reader.read(&mut buf).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark how closely a throttled writer tracks its configured rate
fn bench_limit_throttled(c: &mut Criterion) {
    let mut group = c.benchmark_group("limit_throttled");
    group.sample_size(10);

    // 1 MB/s with a 5ms quantum: 5000 bytes per quantum, 20 KB per iteration
    group.bench_function("1MBps_20KB", |b| {
        let config = LimiterConfig::new(1_000_000, Duration::from_millis(5));
        let chunk = vec![0u8; 20_000];

        b.iter(|| {
            let mut writer = LimitWriter::with_config(io::sink(), config);
            writer.write_all(&chunk).unwrap();
            std::hint::black_box(writer.metrics().quanta)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_monitor_add,
    bench_monitor_add_concurrent,
    bench_monitor_writer,
    bench_limit_unthrottled,
    bench_limit_throttled,
);

criterion_main!(benches);
