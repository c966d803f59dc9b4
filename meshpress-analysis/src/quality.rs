//! Mesh quality inspection
//!
//! Produces the structured report that drives operation selection: counts,
//! watertightness, surface measures and the list of structural problems.

use meshpress_core::{Result, TriangleMesh};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::components::component_count;

/// Edge-length ratio below which the mesh is considered to have
/// degenerate (sliver) geometry
pub const DEGENERATE_EDGE_RATIO: f64 = 1e-3;

/// Total surface area below which the mesh is considered suspiciously small
pub const SMALL_AREA_THRESHOLD: f64 = 1e-3;

/// A structural defect that blocks conservative simplification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshIssue {
    /// Some edge borders fewer or more than exactly two faces
    NotWatertight,
    /// The mesh has no faces
    NoFaces,
    /// The mesh has no vertices
    NoVertices,
}

impl std::fmt::Display for MeshIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MeshIssue::NotWatertight => "mesh is not watertight",
            MeshIssue::NoFaces => "mesh has no faces",
            MeshIssue::NoVertices => "mesh has no vertices",
        };
        f.write_str(s)
    }
}

/// A quality concern that does not block processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshWarning {
    /// Surface area below [`SMALL_AREA_THRESHOLD`]
    TinySurfaceArea,
    /// Shortest to longest edge ratio below [`DEGENERATE_EDGE_RATIO`]
    DegenerateEdgeLengths,
    /// The mesh splits into more than one connected shell
    MultipleComponents,
}

impl std::fmt::Display for MeshWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MeshWarning::TinySurfaceArea => "very small surface area",
            MeshWarning::DegenerateEdgeLengths => "degenerate edge lengths",
            MeshWarning::MultipleComponents => "multiple disconnected components",
        };
        f.write_str(s)
    }
}

/// Immutable quality snapshot of a mesh
///
/// Two inspections of the same mesh produce identical reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshQualityReport {
    pub vertex_count: usize,
    pub face_count: usize,
    /// Number of unique undirected edges
    pub edge_count: usize,
    /// True when every undirected edge borders exactly two faces
    pub is_watertight: bool,
    pub surface_area: f64,
    pub bbox_diagonal: f64,
    /// Number of connected shells
    pub component_count: usize,
    pub issues: BTreeSet<MeshIssue>,
    pub warnings: BTreeSet<MeshWarning>,
}

impl MeshQualityReport {
    /// True when no structural issue was found
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Inspect a mesh and produce its quality report
///
/// Counts vertices, faces and unique edges, checks watertightness,
/// measures surface area and bounding box, and splits the mesh into
/// connected shells. Structural problems land in `issues`, softer
/// concerns in `warnings`.
///
/// # Arguments
/// * `mesh` - Input mesh
///
/// # Returns
/// * `MeshQualityReport` - Deterministic snapshot of the mesh state
pub fn inspect(mesh: &TriangleMesh) -> MeshQualityReport {
    let vertex_count = mesh.vertex_count();
    let face_count = mesh.face_count();

    // Undirected edge -> number of bordering faces
    let mut edge_faces: HashMap<(usize, usize), u32> = HashMap::new();
    for face in &mesh.faces {
        for (a, b) in [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])] {
            let key = if a < b { (a, b) } else { (b, a) };
            *edge_faces.entry(key).or_insert(0) += 1;
        }
    }
    let edge_count = edge_faces.len();
    let is_watertight = face_count > 0 && edge_faces.values().all(|&count| count == 2);

    // Summed sequentially: float addition is order sensitive, and the
    // report must come out bit-identical for the same mesh.
    let surface_area: f64 = (0..face_count).map(|i| mesh.face_area(i) as f64).sum();
    let bbox_diagonal = mesh.bbox_diagonal() as f64;
    let component_count = component_count(mesh);

    let edges: Vec<(usize, usize)> = edge_faces.into_keys().collect();
    let (min_edge, max_edge) = edges
        .par_iter()
        .map(|&(a, b)| {
            let len = (mesh.vertices[b] - mesh.vertices[a]).norm() as f64;
            (len, len)
        })
        .reduce(
            || (f64::INFINITY, 0.0),
            |x, y| (x.0.min(y.0), x.1.max(y.1)),
        );

    let mut issues = BTreeSet::new();
    if !is_watertight {
        issues.insert(MeshIssue::NotWatertight);
    }
    if face_count == 0 {
        issues.insert(MeshIssue::NoFaces);
    }
    if vertex_count == 0 {
        issues.insert(MeshIssue::NoVertices);
    }

    let mut warnings = BTreeSet::new();
    if surface_area < SMALL_AREA_THRESHOLD {
        warnings.insert(MeshWarning::TinySurfaceArea);
    }
    if edge_count > 0 && (max_edge <= 0.0 || min_edge / max_edge < DEGENERATE_EDGE_RATIO) {
        warnings.insert(MeshWarning::DegenerateEdgeLengths);
    }
    if component_count > 1 {
        warnings.insert(MeshWarning::MultipleComponents);
    }

    MeshQualityReport {
        vertex_count,
        face_count,
        edge_count,
        is_watertight,
        surface_area,
        bbox_diagonal,
        component_count,
        issues,
        warnings,
    }
}

/// Load a mesh from disk and inspect it
///
/// Fails with the underlying load error when the file cannot be read or
/// parsed; inspection itself cannot fail.
pub fn inspect_path<P: AsRef<Path>>(path: P) -> Result<MeshQualityReport> {
    let mesh = meshpress_io::read_mesh(path)?;
    Ok(inspect(&mesh))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use meshpress_core::Point3f;

    fn make_tetrahedron() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.5, 1.0, 0.0),
                Point3f::new(0.5, 0.5, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]],
        )
    }

    fn make_single_triangle() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn test_tetrahedron_is_watertight() {
        let report = inspect(&make_tetrahedron());
        assert_eq!(report.vertex_count, 4);
        assert_eq!(report.face_count, 4);
        assert_eq!(report.edge_count, 6);
        assert!(report.is_watertight);
        assert!(report.is_clean());
        assert_eq!(report.component_count, 1);
        assert!(report.surface_area > 0.0);
        assert!(report.bbox_diagonal > 0.0);
    }

    #[test]
    fn test_open_triangle_is_not_watertight() {
        let report = inspect(&make_single_triangle());
        assert!(!report.is_watertight);
        assert!(report.issues.contains(&MeshIssue::NotWatertight));
        assert!(!report.issues.contains(&MeshIssue::NoFaces));
    }

    #[test]
    fn test_empty_mesh_reports_all_issues() {
        let report = inspect(&TriangleMesh::new());
        assert!(report.issues.contains(&MeshIssue::NotWatertight));
        assert!(report.issues.contains(&MeshIssue::NoFaces));
        assert!(report.issues.contains(&MeshIssue::NoVertices));
        assert_relative_eq!(report.surface_area, 0.0);
        assert_eq!(report.component_count, 0);
    }

    #[test]
    fn test_sliver_triggers_edge_length_warning() {
        // One edge is a million times shorter than the others
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1e-6, 0.0, 0.0),
                Point3f::new(0.0, 10.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let report = inspect(&mesh);
        assert!(report.warnings.contains(&MeshWarning::DegenerateEdgeLengths));
    }

    #[test]
    fn test_two_shells_trigger_component_warning() {
        let mut mesh = make_tetrahedron();
        let base = mesh.vertex_count();
        mesh.add_vertex(Point3f::new(10.0, 0.0, 0.0));
        mesh.add_vertex(Point3f::new(11.0, 0.0, 0.0));
        mesh.add_vertex(Point3f::new(10.0, 1.0, 0.0));
        mesh.add_face([base, base + 1, base + 2]);

        let report = inspect(&mesh);
        assert_eq!(report.component_count, 2);
        assert!(report.warnings.contains(&MeshWarning::MultipleComponents));
        // The open triangle spoils watertightness of the whole mesh
        assert!(!report.is_watertight);
    }

    #[test]
    fn test_inspection_is_deterministic() {
        let mesh = make_tetrahedron();
        let a = inspect(&mesh);
        let b = inspect(&mesh);
        assert_eq!(a.edge_count, b.edge_count);
        assert_eq!(a.issues, b.issues);
        assert_eq!(a.warnings, b.warnings);
        // Bit-identical, not merely close: the sums run in a fixed order
        assert_eq!(a.surface_area.to_bits(), b.surface_area.to_bits());
    }

    #[test]
    fn test_surface_area_of_unit_square() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        );
        let report = inspect(&mesh);
        assert_relative_eq!(report.surface_area, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_inspect_path_reads_obj() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.obj");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();

        let report = inspect_path(&path).unwrap();
        assert_eq!(report.vertex_count, 3);
        assert_eq!(report.face_count, 1);
        assert!(!report.is_watertight);
    }

    #[test]
    fn test_inspect_path_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(inspect_path(dir.path().join("absent.obj")).is_err());
    }
}
