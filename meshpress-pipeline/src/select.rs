//! Operation selection.
//!
//! Pure decision logic: a quality report, a face target and the caller's
//! request go in, a strategy comes out. Nothing here touches the
//! filesystem or mutates the mesh.

use meshpress_analysis::MeshQualityReport;
use meshpress_core::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Processing path the caller asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedOperation {
    /// Let the mesh state decide.
    #[default]
    Auto,
    /// Force the conservative in-process path.
    Simplify,
    /// Force the external retopology path.
    Remesh,
}

impl RequestedOperation {
    /// Returns the string identifier for this request.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestedOperation::Auto => "auto",
            RequestedOperation::Simplify => "simplify",
            RequestedOperation::Remesh => "remesh",
        }
    }
}

impl FromStr for RequestedOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(RequestedOperation::Auto),
            "simplify" => Ok(RequestedOperation::Simplify),
            "remesh" => Ok(RequestedOperation::Remesh),
            _ => Err(Error::InvalidData(format!(
                "unknown operation '{s}', expected one of: auto, simplify, remesh"
            ))),
        }
    }
}

/// The processing path a request will actually take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// In-process progressive decimation.
    Simplify,
    /// Repair plus external retopology.
    Remesh,
    /// Already at or below target, nothing to do.
    NoOp,
}

impl Strategy {
    /// Returns the string identifier for this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Simplify => "simplify",
            Strategy::Remesh => "remesh",
            Strategy::NoOp => "noop",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks the processing strategy for one request.
///
/// A mesh already at or below the target takes the no-op path regardless
/// of what was requested. An explicit simplify or remesh request is
/// honored as-is. On auto, clean watertight meshes get the conservative
/// simplify path and everything else is remeshed.
pub fn select(
    report: &MeshQualityReport,
    target_faces: usize,
    requested: RequestedOperation,
) -> Strategy {
    if report.face_count <= target_faces {
        return Strategy::NoOp;
    }
    match requested {
        RequestedOperation::Simplify => Strategy::Simplify,
        RequestedOperation::Remesh => Strategy::Remesh,
        RequestedOperation::Auto => {
            if report.is_watertight && report.is_clean() {
                Strategy::Simplify
            } else {
                Strategy::Remesh
            }
        }
    }
}
