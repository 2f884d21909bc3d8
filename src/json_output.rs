//! JSON output for GUI integration
//!
//! When --json-progress is enabled, progress and status information is
//! emitted as JSON lines to stdout instead of the styled terminal output.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Minimum time between two progress lines (~25 FPS)
const PROGRESS_INTERVAL_MS: u64 = 40;

/// Last progress emission timestamp (milliseconds since epoch)
static LAST_PROGRESS_MS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonMessage {
    /// Frame progress update
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    /// Output written (or computed, in dry-run mode)
    FileCompleted {
        input_path: String,
        output_path: String,
        format: String,
        frames: usize,
        processing_time_ms: u128,
    },
    /// Processing failed
    FileFailed { input_path: String, error: String },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Emit a progress message, throttled to one every 40ms.
    /// The final update (current == total) is always emitted.
    pub fn progress(current: usize, total: usize, message: impl Into<String>) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let last_ms = LAST_PROGRESS_MS.load(Ordering::Relaxed);
        if should_emit(now_ms, last_ms, current, total) {
            LAST_PROGRESS_MS.store(now_ms, Ordering::Relaxed);
            Self::Progress {
                current,
                total,
                message: message.into(),
            }
            .emit();
        }
    }

    pub fn file_completed(
        input_path: &Path,
        output_path: &Path,
        format: impl Into<String>,
        frames: usize,
        processing_time_ms: u128,
    ) {
        Self::FileCompleted {
            input_path: input_path.display().to_string(),
            output_path: output_path.display().to_string(),
            format: format.into(),
            frames,
            processing_time_ms,
        }
        .emit();
    }

    pub fn file_failed(input_path: &Path, error: impl Into<String>) {
        Self::FileFailed {
            input_path: input_path.display().to_string(),
            error: error.into(),
        }
        .emit();
    }
}

fn should_emit(now_ms: u64, last_ms: u64, current: usize, total: usize) -> bool {
    now_ms.saturating_sub(last_ms) >= PROGRESS_INTERVAL_MS || current >= total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_tags() {
        let json = serde_json::to_string(&JsonMessage::Progress {
            current: 1,
            total: 3,
            message: "frame 1".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"progress","current":1,"total":3,"message":"frame 1"}"#);

        let failed = JsonMessage::FileFailed {
            input_path: "in.png".to_string(),
            error: "boom".to_string(),
        };
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.starts_with(r#"{"type":"filefailed""#));
        assert_eq!(serde_json::from_str::<JsonMessage>(&json).unwrap(), failed);
    }

    #[test]
    fn test_progress_throttling() {
        assert!(!should_emit(1_010, 1_000, 1, 5));
        assert!(should_emit(1_040, 1_000, 1, 5));
        // Final update always goes out
        assert!(should_emit(1_001, 1_000, 5, 5));
        assert!(!should_emit(0, 1_000, 2, 5));
    }
}
