use std::path::PathBuf;

use thiserror::Error;

/// Setup-time failures. Per-frame work degrades instead of failing.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no render camera defined")]
    NoCamera,

    #[error("render camera {index} does not match the first camera: {reason}")]
    CameraMismatch { index: usize, reason: &'static str },

    #[error("{count} render cameras requested, at most {max} are supported")]
    TooManyCameras { count: usize, max: usize },

    #[error("failed to read pipeline settings {path:?}")]
    SettingsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pipeline settings {path:?}")]
    SettingsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
