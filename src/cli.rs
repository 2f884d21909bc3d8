use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::image_processing::direction::Direction;
use crate::image_processing::format::OutputFormat;
use crate::image_processing::ProcessingConfig;

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum DirectionArg {
    /// Keep the left half and mirror it onto the right
    #[value(name = "left", alias = "l", alias = "mirror")]
    Left,
    /// Keep the right half and mirror it onto the left
    #[value(name = "right", alias = "r")]
    Right,
    /// Keep the top half and mirror it onto the bottom
    #[value(name = "top", alias = "t", alias = "up")]
    Top,
    /// Keep the bottom half and mirror it onto the top
    #[value(name = "bottom", alias = "b", alias = "down")]
    Bottom,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Left => Direction::Left,
            DirectionArg::Right => Direction::Right,
            DirectionArg::Top => Direction::Top,
            DirectionArg::Bottom => Direction::Bottom,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FormatArg {
    /// Lossless, keeps transparency (default for still images)
    #[value(name = "png")]
    Png,
    /// Lossy, transparency is composited onto white
    #[value(name = "jpeg", alias = "jpg")]
    Jpeg,
    /// Lossless WebP, keeps transparency
    #[value(name = "webp")]
    Webp,
    /// Single-frame GIF for still inputs
    #[value(name = "gif")]
    Gif,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Jpeg => OutputFormat::Jpeg,
            FormatArg::Webp => OutputFormat::WebP,
            FormatArg::Gif => OutputFormat::Gif,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "image-symmetry",
    about = "Mirror one half of an image onto the other",
    long_about = "
Image Symmetry - half-image mirroring

Keeps one half of an image and replaces the other half with its reflection.
Transparency is composited exactly, animated GIFs are processed frame by frame
with their original timing, and EXIF metadata is carried into PNG and JPEG
outputs.

Example Usage:
  # Mirror the left half onto the right (default)
  image-symmetry -i photo.jpg -o ~/mirrored

  # Keep the bottom half and write a JPEG
  image-symmetry -i photo.png -o ~/mirrored -d bottom -f jpeg --quality 85

  # Animated GIF, respecting the camera orientation of stills
  image-symmetry -i dance.gif -o ~/mirrored -d right --auto-orient

  # Show what would be written without creating any file
  image-symmetry -i photo.jpg --dry-run --verbose"
)]
pub struct Args {
    /// Input image file
    #[arg(
        short = 'i',
        long = "input",
        required_unless_present = "config_file",
        value_name = "FILE"
    )]
    pub input: Option<PathBuf>,

    /// Output directory for mirrored images
    #[arg(short = 'o', long = "output", value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Which half to keep
    #[arg(short = 'd', long = "direction", default_value = "left")]
    pub direction: DirectionArg,

    /// Output format. A still format (png, jpeg, webp) on an animated GIF
    /// mirrors only its first frame
    #[arg(short = 'f', long = "format", value_name = "FORMAT")]
    pub format: Option<FormatArg>,

    /// JPEG quality (1-100)
    #[arg(
        long = "quality",
        default_value = "90",
        value_name = "QUALITY",
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    pub quality: u8,

    /// GIF quantizer speed, 1 (best) to 30 (fastest)
    #[arg(
        long = "gif-speed",
        default_value = "10",
        value_name = "SPEED",
        value_parser = clap::value_parser!(i32).range(1..=30)
    )]
    pub gif_speed: i32,

    /// Rotate according to the EXIF orientation before mirroring
    #[arg(long = "auto-orient")]
    pub auto_orient: bool,

    /// Do not copy EXIF metadata into the output
    #[arg(long = "strip-exif")]
    pub strip_exif: bool,

    /// JSON configuration file (command-line flags take precedence)
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Emit progress as JSON lines for GUI integration
    #[arg(long = "json-progress")]
    pub json_progress: bool,

    /// Process the image but do not write the output file
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Args {
    pub fn direction(&self) -> Direction {
        self.direction.into()
    }

    pub fn format_hint(&self) -> Option<OutputFormat> {
        self.format.map(OutputFormat::from)
    }

    /// Engine settings derived from the parsed flags
    pub fn processing_config(&self) -> ProcessingConfig {
        ProcessingConfig {
            jpeg_quality: self.quality,
            gif_speed: self.gif_speed,
            auto_orient: self.auto_orient,
            preserve_exif: !self.strip_exif,
        }
    }
}
