//! PDF Shrinker CLI
//!
//! Command-line interface for compressing image-heavy PDFs.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use shrink_pdf::{
    preview_document, spawn_batch, OutputPolicy, QualityLevel, ResolutionLevel, TransformConfig,
};

/// Shrink PDFs by re-encoding their embedded images
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input PDF files, processed in order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// JPEG quality level
    #[arg(short, long, value_enum, default_value = "medium")]
    quality: QualityLevel,

    /// Resolution to keep, in percent of the original
    #[arg(short, long, value_enum, default_value = "100")]
    resolution: ResolutionLevel,

    /// Convert images to grayscale
    #[arg(short, long)]
    grayscale: bool,

    /// Write compressed copies into this directory instead of overwriting
    /// the originals
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Dry run: compress to scratch files and report the achievable
    /// reduction without touching any original
    #[arg(long)]
    preview: bool,

    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    let config = TransformConfig::new(args.quality, args.resolution, args.grayscale);

    if args.preview {
        return preview(&args.inputs, &config);
    }

    let policy = match args.output_dir {
        Some(dir) => OutputPolicy::WriteToDirectory(dir),
        None => OutputPolicy::OverwriteOriginals,
    };

    let handle = spawn_batch(args.inputs, config, policy);
    let total = handle.total();

    // The worker streams results in input order; print them as they arrive.
    for result in handle.results().iter() {
        println!("{}", result.summary_line());
    }

    let report = handle.wait();
    println!(
        "\nProcessed {} of {} files ({} failed)",
        report.results.len() - report.failed_count(),
        total,
        report.failed_count()
    );
    println!("Elapsed time: {}", shrink_pdf::report::format_elapsed(report.elapsed));

    Ok(())
}

fn preview(inputs: &[PathBuf], config: &TransformConfig) -> Result<()> {
    for input in inputs {
        match preview_document(input, config) {
            Ok(preview) => println!("{}", preview.result.summary_line()),
            Err(e) => println!("{}: failed: {}", input.display(), e),
        }
    }
    Ok(())
}
