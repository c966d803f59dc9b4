//! External executable discovery.
//!
//! Resolution order: explicit override, then environment variables, then
//! PATH lookup, then platform-common install locations.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ToolError, ToolResult};

/// Locates an external tool executable.
///
/// `env_vars` and `binary_names` are tried in order; the first hit wins.
/// The first environment variable doubles as the install hint in the
/// not-found error.
pub fn find_tool(
    tool: &str,
    override_path: Option<&Path>,
    env_vars: &[&str],
    binary_names: &[&str],
    common_paths: &[&str],
) -> ToolResult<PathBuf> {
    if let Some(path) = override_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        debug!(tool, path = %path.display(), "configured executable missing, falling back");
    }

    for var in env_vars {
        if let Ok(value) = std::env::var(var) {
            let path = PathBuf::from(value);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    for name in binary_names {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
    }

    for path_str in common_paths {
        let path = PathBuf::from(path_str);
        if path.exists() {
            return Ok(path);
        }
    }

    Err(ToolError::not_found(
        tool,
        env_vars.first().copied().unwrap_or("PATH"),
    ))
}
