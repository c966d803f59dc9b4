//! Mesh analysis entry point.

use std::path::Path;

use meshpress_analysis::{inspect, recommend, MeshQualityReport, Recommendations};
use meshpress_core::TriangleMesh;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, PipelineResult};

/// Quality report plus derived processing suggestions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub quality: MeshQualityReport,
    pub recommendations: Recommendations,
}

/// Analyzes an in-memory mesh.
pub fn analyze_mesh(mesh: &TriangleMesh) -> AnalysisReport {
    let quality = inspect(mesh);
    let recommendations = recommend(&quality);
    AnalysisReport {
        quality,
        recommendations,
    }
}

/// Loads a mesh from disk and analyzes it.
pub fn analyze(input: &Path) -> PipelineResult<AnalysisReport> {
    let mesh =
        meshpress_io::read_mesh(input).map_err(|source| PipelineError::load(input, source))?;
    let report = analyze_mesh(&mesh);
    info!(
        input = %input.display(),
        faces = report.quality.face_count,
        watertight = report.quality.is_watertight,
        operation = report.recommendations.operation.as_str(),
        "analysis finished"
    );
    Ok(report)
}
