//! Error types returned by the symmetry engine.

use std::fmt::Display;

use thiserror::Error;

use crate::image_processing::format::OutputFormat;

/// Every way a transform request can fail.
///
/// Failures are terminal for the request: no partially encoded output is
/// ever handed back alongside an error.
#[derive(Debug, Error)]
pub enum SymmetryError {
    /// The input bytes are not a recognizable or parsable image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// Decoding succeeded but the container holds no frames.
    #[error("image contains no frames")]
    EmptyImage,

    /// The chosen output encoder rejected the transformed image.
    #[error("failed to encode {format} output: {reason}")]
    Encode { format: OutputFormat, reason: String },

    /// The pixel layout cannot be normalized to RGBA and restored.
    #[error("unsupported color mode: {0}")]
    UnsupportedMode(String),

    /// The caller asked for an output format the engine cannot produce.
    #[error("unsupported output format '{0}' (expected png, jpeg, webp or gif)")]
    UnsupportedFormat(String),
}

impl SymmetryError {
    pub(crate) fn decode(err: impl Display) -> Self {
        SymmetryError::Decode(err.to_string())
    }

    pub(crate) fn encode(format: OutputFormat, err: impl Display) -> Self {
        SymmetryError::Encode {
            format,
            reason: err.to_string(),
        }
    }
}

pub type Result<T, E = SymmetryError> = std::result::Result<T, E>;
