//! Error types shared across Flowscope crates.

use std::path::PathBuf;

/// Top-level error type for Flowscope operations.
#[derive(Debug, thiserror::Error)]
pub enum FlowscopeError {
    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Estimation error: {message}")]
    Estimation { message: String },

    #[error("Frame dimensions disagree: reference {reference_width}x{reference_height}, current {current_width}x{current_height}")]
    DimensionMismatch {
        reference_width: u32,
        reference_height: u32,
        current_width: u32,
        current_height: u32,
    },

    #[error("Visualization error: {message}")]
    Visualization { message: String },

    #[error("Kernel program unavailable: {message}")]
    KernelUnavailable { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using FlowscopeError.
pub type FlowscopeResult<T> = Result<T, FlowscopeError>;

impl FlowscopeError {
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn estimation(msg: impl Into<String>) -> Self {
        Self::Estimation {
            message: msg.into(),
        }
    }

    pub fn visualization(msg: impl Into<String>) -> Self {
        Self::Visualization {
            message: msg.into(),
        }
    }

    pub fn kernel_unavailable(msg: impl Into<String>) -> Self {
        Self::KernelUnavailable {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}
