use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

use crate::cli::Args;
use crate::image_processing::direction::Direction;
use crate::image_processing::format::OutputFormat;

/// Longest stem kept in output filenames
const MAX_STEM_LENGTH: usize = 64;

/// Create a styled progress bar
pub fn create_progress_bar(total: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg} ({eta})",
        )?
        .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Validate command line arguments
pub fn validate_inputs(args: &Args) -> Result<()> {
    let Some(input) = &args.input else {
        return Err(anyhow::anyhow!("No input image given"));
    };

    if !input.exists() {
        return Err(anyhow::anyhow!(
            "Input path does not exist: {}",
            input.display()
        ));
    }
    if !input.is_file() {
        return Err(anyhow::anyhow!(
            "Input path is not a file: {}",
            input.display()
        ));
    }

    if args.output_dir.exists() && !args.output_dir.is_dir() {
        return Err(anyhow::anyhow!(
            "Output path exists but is not a directory: {}",
            args.output_dir.display()
        ));
    }

    Ok(())
}

/// Generate a safe filename by removing/replacing invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| match c {
            // Replace problematic characters with underscores
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' => c,
            // Whitespace and non-ASCII
            _ => '_',
        })
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.chars().take(MAX_STEM_LENGTH).collect()
    }
}

/// First 8 hex characters of the SHA-256 of the input bytes
pub fn generate_content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex_hash = format!("{:x}", digest);
    hex_hash[..8].to_string()
}

/// Create the output filename for a mirrored image
/// Format: {sanitized_stem}_{direction}_{hash8}.{ext}
pub fn create_output_filename(
    input_path: &Path,
    input_bytes: &[u8],
    direction: Direction,
    format: OutputFormat,
) -> String {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");

    format!(
        "{}_{}_{}.{}",
        sanitize_filename(stem),
        direction,
        generate_content_hash(input_bytes),
        format.extension()
    )
}

/// Format a byte count for display
pub fn format_size(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let size = bytes as f64;
    if size >= KIB * KIB {
        format!("{:.1} MiB", size / (KIB * KIB))
    } else if size >= KIB {
        format!("{:.1} KiB", size / KIB)
    } else {
        format!("{} B", bytes)
    }
}

/// Print verbose information if verbose mode is enabled
pub fn verbose_println(verbose: bool, message: &str) {
    if verbose {
        println!("{} {}", style("[VERBOSE]").dim(), message);
    }
}

/// Print warning message
pub fn warn_println(message: &str) {
    println!("{} {}", style("[WARNING]").yellow().bold(), message);
}

/// Print error message
pub fn error_println(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}
