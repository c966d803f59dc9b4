//! Processing recommendations derived from a quality report

use crate::quality::MeshQualityReport;
use serde::{Deserialize, Serialize};

/// Rough complexity classification by face count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which processing path the mesh state suggests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedOperation {
    Simplify,
    Remesh,
}

impl RecommendedOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedOperation::Simplify => "simplify",
            RecommendedOperation::Remesh => "remesh",
        }
    }
}

impl std::fmt::Display for RecommendedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Suggested processing parameters for a mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendations {
    /// Sensible default target face count
    pub target_faces: usize,
    pub complexity: Complexity,
    pub operation: RecommendedOperation,
    /// Reduction presets by strength
    pub aggressive_target: usize,
    pub moderate_target: usize,
    pub conservative_target: usize,
}

/// Derive recommendations from an inspection report
///
/// Meshes above 5000 faces get a fifth of their current count as the
/// default target; smaller meshes are left alone. Watertight meshes can
/// take the conservative simplify path, everything else should be
/// remeshed.
pub fn recommend(report: &MeshQualityReport) -> Recommendations {
    let faces = report.face_count;
    let target_faces = if faces > 5000 { faces / 5 } else { faces };
    let complexity = if faces > 20_000 {
        Complexity::High
    } else if faces > 5000 {
        Complexity::Medium
    } else {
        Complexity::Low
    };
    let operation = if report.is_watertight {
        RecommendedOperation::Simplify
    } else {
        RecommendedOperation::Remesh
    };

    Recommendations {
        target_faces,
        complexity,
        operation,
        aggressive_target: faces / 10,
        moderate_target: faces / 5,
        conservative_target: faces / 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn report_with(face_count: usize, is_watertight: bool) -> MeshQualityReport {
        MeshQualityReport {
            vertex_count: face_count / 2,
            face_count,
            edge_count: face_count * 3 / 2,
            is_watertight,
            surface_area: 1.0,
            bbox_diagonal: 1.0,
            component_count: 1,
            issues: BTreeSet::new(),
            warnings: BTreeSet::new(),
        }
    }

    #[test]
    fn test_large_mesh_is_high_complexity() {
        let rec = recommend(&report_with(30_000, true));
        assert_eq!(rec.complexity, Complexity::High);
        assert_eq!(rec.target_faces, 6000);
        assert_eq!(rec.operation, RecommendedOperation::Simplify);
        assert_eq!(rec.aggressive_target, 3000);
        assert_eq!(rec.moderate_target, 6000);
        assert_eq!(rec.conservative_target, 15_000);
    }

    #[test]
    fn test_small_mesh_keeps_its_face_count() {
        let rec = recommend(&report_with(1200, true));
        assert_eq!(rec.complexity, Complexity::Low);
        assert_eq!(rec.target_faces, 1200);
    }

    #[test]
    fn test_medium_band() {
        let rec = recommend(&report_with(10_000, true));
        assert_eq!(rec.complexity, Complexity::Medium);
        assert_eq!(rec.target_faces, 2000);
    }

    #[test]
    fn test_open_mesh_suggests_remesh() {
        let rec = recommend(&report_with(10_000, false));
        assert_eq!(rec.operation, RecommendedOperation::Remesh);
    }
}
