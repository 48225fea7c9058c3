//! Example: Parallel Range Streaming to stdout
//!
//! Streams a remote object (or a local file through the same range-request
//! path) to stdout and reports throughput on stderr.
//!
//! # Usage
//!
//! ```bash
//! # With an HTTP URL, e.g. an S3 presigned URL
//! cargo run --example http_stream -- http "https://bucket.s3.amazonaws.com/data.bin?X-Amz-..." > data.bin
//!
//! # Decompress on the fly with 16 workers and 4 MB chunks
//! cargo run --example http_stream -- http https://cdn.example.com/dump.json.zst zstd 16 4 > dump.json
//!
//! # With a local file (for testing)
//! cargo run --example http_stream -- local path/to/file.bin > copy.bin
//! ```
//!
//! Set `RUST_LOG=rangestream=debug` to watch the workers.

use rangestream::{
    Compression, LocalTransport, MB, Reader, Streamer, StreamerConfig, decompress, open_reader,
};
use std::env;
use std::io::{self, Read};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: http_stream <local|http> <path_or_url> [none|gzip|zstd] [parallelism] [buffer_mb]"
        );
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  http_stream local ./data/object.bin");
        eprintln!("  http_stream http https://cdn.example.com/object.bin.gz gzip 8 8");
        std::process::exit(1);
    }

    let mode = &args[1];
    let source = &args[2];
    let compression: Compression = args.get(3).map_or(Ok(Compression::None), |s| s.parse())?;

    let mut config = StreamerConfig::default();
    if let Some(parallelism) = args.get(4) {
        config = config.with_parallelism(parallelism.parse()?);
    }
    if let Some(buffer_mb) = args.get(5) {
        config = config.with_buffer_size(buffer_mb.parse::<usize>()? * MB);
    }

    let reader: Box<dyn Read + Send> = match mode.as_str() {
        "local" => {
            let transport = LocalTransport::open(source)?;
            let streamer = Streamer::new(source.clone(), config.clone(), transport)?;
            eprintln!("Streaming {} bytes from {source}", streamer.file_size());
            decompress(Reader::new(streamer), compression)?
        }
        "http" => {
            eprintln!("Streaming {source}");
            open_reader(source.clone(), config.clone(), compression)?
        }
        _ => {
            eprintln!("Unknown mode: {mode}. Use 'local' or 'http'.");
            std::process::exit(1);
        }
    };

    copy_to_stdout(reader, &config, compression)
}

fn copy_to_stdout(
    mut reader: Box<dyn Read + Send>,
    config: &StreamerConfig,
    compression: Compression,
) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    let mut stdout = io::stdout().lock();
    let copied = io::copy(&mut reader, &mut stdout)?;
    let elapsed = started.elapsed();

    eprintln!();
    eprintln!("=== Transfer Summary ===");
    eprintln!("  Workers: {}", config.parallelism);
    eprintln!("  Chunk size: {} bytes", config.buffer_size);
    eprintln!("  Compression: {compression}");
    eprintln!("  Bytes written: {copied}");
    eprintln!("  Elapsed: {:.2}s", elapsed.as_secs_f64());
    if elapsed.as_secs_f64() > 0.0 {
        eprintln!(
            "  Throughput: {:.1} MB/s",
            copied as f64 / MB as f64 / elapsed.as_secs_f64()
        );
    }

    Ok(())
}
