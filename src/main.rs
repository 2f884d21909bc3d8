use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use image_symmetry::cli::Args;
use image_symmetry::image_processing::needs_orientation;
use image_symmetry::utils::{
    create_output_filename, create_progress_bar, error_println, format_duration, format_size,
    validate_inputs, verbose_println, warn_println,
};
use image_symmetry::{
    FrameProgress, JsonMessage, ProcessingConfig, ProcessingResult, SymmetryEngine,
    TransformRequest,
};

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(format!("image_symmetry={}", default_level)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

fn print_configuration(args: &Args, input: &Path, config: &ProcessingConfig) {
    println!("{}", style("Configuration:").bold());
    println!("  Input: {}", input.display());
    println!("  Output directory: {}", args.output_dir.display());
    println!("  Direction: {}", args.direction());
    match args.format_hint() {
        Some(format) => println!("  Output format: {}", format),
        None => println!("  Output format: automatic"),
    }
    println!("  JPEG quality: {}", config.jpeg_quality);
    println!("  GIF speed: {}", config.gif_speed);
    println!(
        "  Auto orientation: {}",
        if config.auto_orient { "enabled" } else { "disabled" }
    );
    println!(
        "  EXIF metadata: {}",
        if config.preserve_exif { "preserved" } else { "stripped" }
    );
    if args.dry_run {
        println!("  Dry run mode: enabled (simulation only - no files will be created)");
    }
    println!();
}

/// Mirror the input and write the result, returning the output path
fn run(args: &Args, input: &Path, bytes: Vec<u8>, config: ProcessingConfig) -> Result<(PathBuf, ProcessingResult)> {
    let direction = args.direction();
    let json = args.json_progress;

    if !config.auto_orient && !json && needs_orientation(&bytes) {
        warn_println("Input carries an EXIF rotation; pass --auto-orient to mirror the upright image");
    }

    let mut request = TransformRequest::new(bytes, direction);
    if let Some(format) = args.format_hint() {
        request = request.with_format_hint(format);
    }

    let engine = SymmetryEngine::new(config);
    let progress_bar = if json { None } else { Some(create_progress_bar(1)?) };
    if let Some(pb) = &progress_bar {
        pb.set_message(format!("Mirroring {}", direction));
    }

    let result = engine
        .process_with_progress(&request, |FrameProgress { index, total }| {
            if json {
                JsonMessage::progress(index + 1, total, format!("frame {}/{}", index + 1, total));
            } else if let Some(pb) = &progress_bar {
                pb.set_length(total as u64);
                pb.set_position((index + 1) as u64);
            }
        })
        .with_context(|| format!("Failed to mirror {}", input.display()))?;

    if let Some(pb) = &progress_bar {
        pb.finish_with_message("✓ Mirrored");
    }

    let filename = create_output_filename(input, &request.bytes, direction, result.format);
    let output_path = args.output_dir.join(filename);

    if args.dry_run {
        verbose_println(args.verbose, "Dry run mode: skipping output write");
    } else {
        std::fs::create_dir_all(&args.output_dir).with_context(|| {
            format!("Failed to create output directory: {}", args.output_dir.display())
        })?;
        std::fs::write(&output_path, &result.bytes)
            .with_context(|| format!("Failed to write output: {}", output_path.display()))?;
    }

    Ok((output_path, result))
}

fn print_summary(args: &Args, output_path: &Path, result: &ProcessingResult, elapsed: std::time::Duration) {
    println!();
    let header = if args.dry_run {
        style("Dry Run Results Summary:").bold().cyan()
    } else {
        style("Results Summary:").bold().green()
    };
    println!("{}", header);

    let output_label = if args.dry_run { "Would write" } else { "Written" };
    println!("  {}: {}", output_label, style(output_path.display()).bold().green());
    println!(
        "  Format: {} ({}x{}, {})",
        style(result.format).cyan(),
        result.width,
        result.height,
        format_size(result.bytes.len())
    );
    if result.animated {
        println!("  Frames: {}", style(result.frame_count).bold().magenta());
    }
    if result.exif_preserved {
        println!("  EXIF metadata: carried over");
    } else if !args.strip_exif && !result.animated && result.format.carries_exif() {
        verbose_println(args.verbose, "No EXIF metadata to carry over");
    }
    println!("  Processing time: {}", format_duration(result.processing_time));
    println!("  Total time: {}", format_duration(elapsed));
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let mut args = Args::parse();
    args.load_and_merge_config()?;
    init_tracing(args.verbose)?;

    let json = args.json_progress;
    if !json {
        println!("{}", style("Image Symmetry").bold().blue());
        println!("{}", style("Half-image mirroring for stills and animations").dim());
        println!();
    }

    validate_inputs(&args)?;
    let input = args.input.clone().context("No input image given")?;
    let config = args.processing_config();

    if args.verbose && !json {
        print_configuration(&args, &input, &config);
    }

    let bytes = std::fs::read(&input)
        .with_context(|| format!("Failed to read input: {}", input.display()))?;
    verbose_println(
        args.verbose && !json,
        &format!("Read {} from {}", format_size(bytes.len()), input.display()),
    );

    match run(&args, &input, bytes, config) {
        Ok((output_path, result)) => {
            if json {
                JsonMessage::file_completed(
                    &input,
                    &output_path,
                    result.format.to_string(),
                    result.frame_count,
                    result.processing_time.as_millis(),
                );
            } else {
                print_summary(&args, &output_path, &result, start_time.elapsed());
            }
            Ok(())
        }
        Err(err) => {
            if json {
                JsonMessage::file_failed(&input, format!("{:#}", err));
            } else {
                error_println(&format!("{:#}", err));
            }
            std::process::exit(1);
        }
    }
}
