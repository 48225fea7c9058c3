//! Parallel Range Streaming Benchmark
//!
//! Measures how parallel range requests hide per-request latency.
//!
//! ## What This Benchmark Measures
//!
//! - **Local throughput** of the streamer and reader with no latency at all
//!   (the cost of scheduling, copying, and buffer pooling)
//! - **Simulated latency**: every range request waits a fixed time before
//!   answering, and throughput is compared across worker counts
//!
//! ## What This Benchmark Does NOT Measure
//!
//! - Real network throughput or TLS cost
//! - Server-side limits on concurrent range requests
//!
//! ## Run
//!
//! ```bash
//! cargo bench --bench streaming_bench
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rangestream::{KB, MemoryTransport, Reader, Streamer, StreamerConfig};
use std::hint::black_box;
use std::io::Read;
use std::time::Duration;

const FILE_SIZE: usize = 4 * 1024 * 1024;

fn test_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 253) as u8).collect()
}

/// Drains a streamer through a reader with a 64 KB destination buffer.
fn drain(transport: MemoryTransport, config: StreamerConfig) -> u64 {
    let streamer = Streamer::new("mem://bench", config, transport).expect("streamer");
    let mut reader = Reader::new(streamer);
    let mut buf = vec![0u8; 64 * KB];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).expect("read");
        if n == 0 {
            break;
        }
        total += n as u64;
    }
    total
}

// =============================================================================
// LOCAL THROUGHPUT
// =============================================================================

/// Scheduling overhead with an instantaneous transport.
fn bench_local_throughput(c: &mut Criterion) {
    let data = test_data(FILE_SIZE);

    let mut group = c.benchmark_group("local_throughput");
    group.throughput(Throughput::Bytes(FILE_SIZE as u64));

    for buffer_kb in [64usize, 256, 1024] {
        group.bench_with_input(
            BenchmarkId::new("buffer_kb", buffer_kb),
            &buffer_kb,
            |b, &buffer_kb| {
                b.iter(|| {
                    let transport = MemoryTransport::new(data.clone());
                    black_box(drain(transport, StreamerConfig::new(buffer_kb * KB, 4)))
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// SIMULATED LATENCY
// =============================================================================

/// Throughput with 5ms per range request across worker counts.
fn bench_simulated_latency(c: &mut Criterion) {
    let data = test_data(FILE_SIZE);
    let latency = Duration::from_millis(5);

    let mut group = c.benchmark_group("simulated_latency");
    group.sample_size(10);
    group.throughput(Throughput::Bytes(FILE_SIZE as u64));

    let chunks = FILE_SIZE / (128 * KB);
    eprintln!();
    eprintln!("  {} range requests of 128 KB, {:?} latency each", chunks, latency);
    eprintln!(
        "  Serial lower bound: {:?}",
        latency * u32::try_from(chunks).unwrap_or(u32::MAX)
    );
    eprintln!();

    for parallelism in [1usize, 2, 4, 8, 16] {
        group.bench_with_input(
            BenchmarkId::new("parallelism", parallelism),
            &parallelism,
            |b, &parallelism| {
                b.iter(|| {
                    let transport = MemoryTransport::new(data.clone()).with_latency(move |_| latency);
                    black_box(drain(
                        transport,
                        StreamerConfig::new(128 * KB, parallelism),
                    ))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_local_throughput, bench_simulated_latency);

criterion_main!(benches);
