// Library exports for reuse by front-ends and other applications
pub mod cli;
pub mod config_file;
pub mod error;
pub mod image_processing;
pub mod json_output;
pub mod utils;

// Re-export commonly used types
pub use error::{Result, SymmetryError};
pub use image_processing::direction::Direction;
pub use image_processing::format::{decide_output_format, detect_input, OutputFormat};
pub use image_processing::mirror::mirror_frame;
pub use image_processing::{
    FrameProgress, ProcessingConfig, ProcessingResult, SymmetryEngine, TransformRequest,
};
pub use json_output::JsonMessage;
