//! Pipeline error types.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that end a processing request.
///
/// Step-local trouble (a failed collapse pass, a missing texture, a tool
/// that times out but has a fallback) is downgraded inside the stages and
/// never surfaces here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input mesh could not be read or parsed.
    #[error("failed to load mesh from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: meshpress_core::Error,
    },

    /// Mesh-level failure outside loading.
    #[error(transparent)]
    Mesh(#[from] meshpress_core::Error),

    /// External tool failure with no working fallback.
    #[error(transparent)]
    Tool(#[from] meshpress_tools::ToolError),

    /// Delivery conversion failed and so did the fallback.
    #[error("conversion to {path} failed: {reason}")]
    Conversion { path: PathBuf, reason: String },

    /// Report serialization failure.
    #[error("failed to serialize processing report: {0}")]
    Report(#[from] serde_json::Error),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Creates a new load error with path context.
    pub fn load(path: &Path, source: meshpress_core::Error) -> Self {
        Self::Load {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates a new conversion error with path context.
    pub fn conversion(path: &Path, reason: impl Into<String>) -> Self {
        Self::Conversion {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_carries_path() {
        let err = PipelineError::load(
            Path::new("/models/broken.obj"),
            meshpress_core::Error::InvalidData("bad face".to_string()),
        );
        let message = err.to_string();
        assert!(message.contains("/models/broken.obj"));
    }

    #[test]
    fn test_tool_error_converts() {
        let tool_err = meshpress_tools::ToolError::timeout("blender", 180);
        let err: PipelineError = tool_err.into();
        assert!(err.to_string().contains("180 seconds"));
    }
}
