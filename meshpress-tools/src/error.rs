//! Error types for external tool orchestration.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for external tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors that can occur while driving an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool executable could not be located.
    #[error("{tool} executable not found. Ensure it is installed and in PATH, or set {hint}")]
    ToolNotFound { tool: String, hint: String },

    /// Failed to spawn the tool process.
    #[error("failed to spawn {tool}: {source}")]
    SpawnFailed {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool did not finish within its wall-clock budget.
    #[error("{tool} did not finish within {timeout_secs} seconds")]
    Timeout { tool: String, timeout_secs: u64 },

    /// The tool ran but exited unsuccessfully or left no usable result.
    #[error("{tool} run failed: {reason}")]
    RunFailed { tool: String, reason: String },

    /// The expected output file is missing or empty after the run.
    #[error("{tool} produced no output at {path}")]
    OutputMissing { tool: String, path: PathBuf },

    /// Unrecognized retopology mode name.
    #[error("unknown retopology mode '{mode}', expected one of: balanced, fine, coarse, fix_holes")]
    InvalidMode { mode: String },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Creates a new tool-not-found error.
    pub fn not_found(tool: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::ToolNotFound {
            tool: tool.into(),
            hint: hint.into(),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(tool: impl Into<String>, timeout_secs: u64) -> Self {
        Self::Timeout {
            tool: tool.into(),
            timeout_secs,
        }
    }

    /// Creates a new run-failed error.
    pub fn run_failed(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RunFailed {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new missing-output error.
    pub fn output_missing(tool: impl Into<String>, path: &Path) -> Self {
        Self::OutputMissing {
            tool: tool.into(),
            path: path.to_path_buf(),
        }
    }
}
