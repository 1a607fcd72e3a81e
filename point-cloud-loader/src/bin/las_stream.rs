/// Command line front end for the streaming LAS loader
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use point_cloud_loader::crosscheck::cross_check;
use point_cloud_loader::streamer::read_header;
use point_cloud_loader::synthetic::SyntheticLas;
use point_cloud_loader::{FileSource, StreamConfig, stream_chunks, stream_chunks_parallel};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "las-stream", about = "Inspect, stream and generate uncompressed LAS files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the decoded header
    Inspect {
        file: PathBuf,
        /// Compare decoded points against the `las` crate reader
        #[arg(long)]
        cross_check: bool,
        /// Points compared by --cross-check
        #[arg(long, default_value_t = 100_000)]
        sample: u64,
    },
    /// Stream every chunk and report throughput
    Stream {
        file: PathBuf,
        /// JSON stream configuration
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        points_per_chunk: Option<u64>,
        #[arg(long)]
        workers: Option<usize>,
        /// Decode on the calling thread instead of the worker pool
        #[arg(long)]
        sequential: bool,
    },
    /// Write a deterministic synthetic LAS file
    Synth {
        output: PathBuf,
        #[arg(long, default_value_t = 1_000_000)]
        points: u64,
        /// Point count written to the header, if different from --points
        #[arg(long)]
        declared_points: Option<u64>,
        #[arg(long, default_value_t = 2)]
        format: u8,
        /// Version as major.minor
        #[arg(long, default_value = "1.4")]
        version: String,
    },
}

fn parse_version(version: &str) -> anyhow::Result<(u8, u8)> {
    let Some((major, minor)) = version.split_once('.') else {
        bail!("version must look like 1.4, got {version:?}");
    };
    Ok((major.parse()?, minor.parse()?))
}

fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.green/blue}] {percent}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("▉▊▋▌▍▎▏ "),
    );
    bar
}

fn inspect(file: PathBuf, with_cross_check: bool, sample: u64) -> anyhow::Result<()> {
    let mut source = FileSource::open(&file).with_context(|| format!("opening {}", file.display()))?;
    let header = read_header(&mut source)?;

    println!("LAS Header:");
    println!("  Version: {}", header.version);
    println!("  Points: {}", header.number_of_points);
    println!("  Point format: {}", header.point_data_format);
    println!("  Record length: {} bytes", header.point_data_record_length);
    println!("  Point data offset: {}", header.offset_to_point_data);
    println!("  Scale: {:?}", header.scale);
    println!("  Offset: {:?}", header.offset);
    println!("  Bounds min: {:?}", header.bounds.min());
    println!("  Bounds max: {:?}", header.bounds.max());
    println!("  Color: {}", if header.has_color() { "yes" } else { "no" });
    if let Some(truncation) = header.check_truncation(source_size(&file)?) {
        println!("  Warning: {truncation}");
    }

    if with_cross_check {
        let report = cross_check(&file, sample)?;
        println!(
            "Cross-check: {} points compared, {} mismatches",
            report.points_compared,
            report.mismatches.len()
        );
        for mismatch in report.mismatches.iter().take(20) {
            println!("  {mismatch}");
        }
        if !report.is_clean() {
            bail!("decoded points differ from the las crate reader");
        }
    }
    Ok(())
}

fn source_size(file: &Path) -> anyhow::Result<u64> {
    Ok(std::fs::metadata(file)?.len())
}

fn stream(
    file: PathBuf,
    config_path: Option<PathBuf>,
    points_per_chunk: Option<u64>,
    workers: Option<usize>,
    sequential: bool,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => StreamConfig::from_json_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StreamConfig::default(),
    };
    if let Some(points_per_chunk) = points_per_chunk {
        config.points_per_chunk = points_per_chunk;
    }
    if let Some(workers) = workers {
        config.max_workers = workers;
    }
    config.validate()?;

    let source = FileSource::open(&file).with_context(|| format!("opening {}", file.display()))?;
    let bar = progress_bar(100);
    bar.set_message(file.display().to_string());
    let on_progress = |progress: f32| bar.set_position((progress * 100.0).round() as u64);

    let started = Instant::now();
    let result = if sequential {
        stream_chunks(source, config, on_progress)?
    } else {
        stream_chunks_parallel(source, config, on_progress)?
    };
    bar.finish_with_message("done");

    let elapsed = started.elapsed();
    let points = result.total_points();
    println!("Chunks: {}", result.chunks.len());
    println!("Points: {points}");
    println!("Bounds min: {:?}", result.bounds.min());
    println!("Bounds max: {:?}", result.bounds.max());
    if let Some(truncation) = result.truncation {
        println!("Warning: {truncation}");
    }
    println!(
        "Elapsed: {:.2?} ({:.1} M points/s)",
        elapsed,
        points as f64 / elapsed.as_secs_f64().max(f64::EPSILON) / 1e6
    );
    Ok(())
}

fn synth(
    output: PathBuf,
    points: u64,
    declared_points: Option<u64>,
    format: u8,
    version: &str,
) -> anyhow::Result<()> {
    if format > 10 {
        bail!("point format must be between 0 and 10, got {format}");
    }
    let (major, minor) = parse_version(version)?;
    let mut synthetic = SyntheticLas::new(points).version(major, minor).point_format(format);
    if let Some(declared) = declared_points {
        synthetic = synthetic.declared_points(declared);
    }
    synthetic
        .write_file(&output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote {points} points to {}", output.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Inspect {
            file,
            cross_check,
            sample,
        } => inspect(file, cross_check, sample),
        Command::Stream {
            file,
            config,
            points_per_chunk,
            workers,
            sequential,
        } => stream(file, config, points_per_chunk, workers, sequential),
        Command::Synth {
            output,
            points,
            declared_points,
            format,
            version,
        } => synth(output, points, declared_points, format, &version),
    }
}
