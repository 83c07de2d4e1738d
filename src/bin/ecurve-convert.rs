use anyhow::Context;
use clap::Parser;
use ecurve::{Compression, Format, Geometry, StorageOptions, load_file, store_file};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Convert an ecurve word index between formats.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input format: P (plain), B (binary) or M (mmap image)
    in_format: Format,

    /// Input path
    input: PathBuf,

    /// Output format: P, B or M
    out_format: Format,

    /// Output path
    output: PathBuf,

    /// Prefix length of the stored words
    #[arg(long, default_value_t = 6)]
    prefix_len: usize,

    /// Suffix length of the stored words
    #[arg(long, default_value_t = 12)]
    suffix_len: usize,

    /// Input is gzip-compressed (binary and plain only)
    #[arg(long, default_value_t = false)]
    gzip_in: bool,

    /// Compress the output with gzip (binary and plain only)
    #[arg(long, default_value_t = false)]
    gzip_out: bool,
}

fn compression(gzip: bool) -> Compression {
    if gzip {
        Compression::Gzip
    } else {
        Compression::None
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let geometry = Geometry::new(args.prefix_len, args.suffix_len)?;

    let opts_in = StorageOptions::new(args.in_format)
        .geometry(geometry)
        .compression(compression(args.gzip_in));
    let started = Instant::now();
    let index = load_file(&args.input, &opts_in)
        .with_context(|| format!("loading {}", args.input.display()))?;
    info!(words = index.len(), elapsed = ?started.elapsed(), "load done");

    let opts_out = StorageOptions::new(args.out_format)
        .geometry(geometry)
        .compression(compression(args.gzip_out));
    let started = Instant::now();
    store_file(&args.output, &index, &opts_out)
        .with_context(|| format!("storing {}", args.output.display()))?;
    info!(elapsed = ?started.elapsed(), "store done");

    Ok(())
}
