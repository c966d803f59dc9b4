//! In-process mesh repair
//!
//! Fixes the defects that do not require retopologizing: duplicate and
//! degenerate elements, unreferenced vertices, small boundary holes, and
//! rough vertex noise. Every pass is best-effort and leaves the mesh in a
//! usable state.

use meshpress_core::{Point3f, TriangleMesh, Vector3f};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Faces with area at or below this are treated as null faces
const NULL_FACE_AREA: f32 = 1e-12;

/// Quantization scale for merging vertices at the same position
const MERGE_SCALE: f32 = 1_000_000.0;

/// Blend factor for Laplacian smoothing steps
const SMOOTH_LAMBDA: f32 = 0.5;

/// Options controlling the repair passes
#[derive(Debug, Clone)]
pub struct RepairOptions {
    /// Close boundary loops with a triangle fan
    pub fill_holes: bool,
    /// Largest boundary loop (in edges) that gets closed
    pub max_hole_edges: usize,
    /// Apply Laplacian smoothing after the structural passes
    pub smooth: bool,
    pub smooth_iterations: usize,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            fill_holes: true,
            max_hole_edges: 30,
            smooth: true,
            smooth_iterations: 3,
        }
    }
}

/// What a repair run changed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairSummary {
    pub duplicate_vertices_removed: usize,
    pub duplicate_faces_removed: usize,
    pub degenerate_faces_removed: usize,
    pub unreferenced_vertices_removed: usize,
    pub holes_filled: usize,
    pub smoothing_iterations: usize,
}

/// Run all repair passes in order
///
/// Structural passes first (merge duplicates, drop degenerate faces, prune
/// dead vertices), then hole filling and optional smoothing. Never fails;
/// defects that cannot be fixed are left in place.
pub fn repair(mesh: &mut TriangleMesh, options: &RepairOptions) -> RepairSummary {
    let duplicate_vertices_removed = remove_duplicate_vertices(mesh);
    let duplicate_faces_removed = remove_duplicate_faces(mesh);
    let degenerate_faces_removed = remove_degenerate_faces(mesh);
    let unreferenced_vertices_removed = prune_unreferenced_vertices(mesh);

    let holes_filled = if options.fill_holes {
        fill_small_holes(mesh, options.max_hole_edges)
    } else {
        0
    };

    let smoothing_iterations = if options.smooth && !mesh.is_empty() {
        laplacian_smooth(mesh, options.smooth_iterations);
        options.smooth_iterations
    } else {
        0
    };

    let summary = RepairSummary {
        duplicate_vertices_removed,
        duplicate_faces_removed,
        degenerate_faces_removed,
        unreferenced_vertices_removed,
        holes_filled,
        smoothing_iterations,
    };
    info!(
        duplicate_vertices = summary.duplicate_vertices_removed,
        duplicate_faces = summary.duplicate_faces_removed,
        degenerate_faces = summary.degenerate_faces_removed,
        unreferenced_vertices = summary.unreferenced_vertices_removed,
        holes_filled = summary.holes_filled,
        "mesh repair finished"
    );
    summary
}

/// Merge vertices that sit at the same position
///
/// Positions are quantized to avoid float equality problems; the first
/// occurrence keeps its attributes. Faces are remapped in place.
///
/// Returns the number of vertices removed.
pub fn remove_duplicate_vertices(mesh: &mut TriangleMesh) -> usize {
    if mesh.vertices.is_empty() {
        return 0;
    }

    let mut seen: HashMap<(i64, i64, i64), usize> = HashMap::new();
    let mut remap = Vec::with_capacity(mesh.vertices.len());
    let mut kept_vertices = Vec::new();
    let mut kept_normals = mesh.normals.as_ref().map(|_| Vec::new());
    let mut kept_texcoords = mesh.texcoords.as_ref().map(|_| Vec::new());

    for (i, v) in mesh.vertices.iter().enumerate() {
        let key = (
            (v.x * MERGE_SCALE) as i64,
            (v.y * MERGE_SCALE) as i64,
            (v.z * MERGE_SCALE) as i64,
        );
        match seen.get(&key) {
            Some(&kept) => remap.push(kept),
            None => {
                let new_index = kept_vertices.len();
                seen.insert(key, new_index);
                kept_vertices.push(*v);
                if let (Some(dst), Some(src)) = (kept_normals.as_mut(), mesh.normals.as_ref()) {
                    dst.push(src[i]);
                }
                if let (Some(dst), Some(src)) = (kept_texcoords.as_mut(), mesh.texcoords.as_ref()) {
                    dst.push(src[i]);
                }
                remap.push(new_index);
            }
        }
    }

    let removed = mesh.vertices.len() - kept_vertices.len();
    if removed == 0 {
        return 0;
    }

    for face in &mut mesh.faces {
        for v in face.iter_mut() {
            *v = remap[*v];
        }
    }
    mesh.vertices = kept_vertices;
    mesh.normals = kept_normals;
    mesh.texcoords = kept_texcoords;
    debug!(removed, "merged duplicate vertices");
    removed
}

/// Remove faces that reference the same vertex set as an earlier face,
/// regardless of orientation
///
/// Returns the number of faces removed.
pub fn remove_duplicate_faces(mesh: &mut TriangleMesh) -> usize {
    let before = mesh.faces.len();
    let mut seen: HashSet<[usize; 3]> = HashSet::with_capacity(before);
    mesh.faces.retain(|face| {
        let mut key = *face;
        key.sort_unstable();
        seen.insert(key)
    });
    let removed = before - mesh.faces.len();
    if removed > 0 {
        debug!(removed, "removed duplicate faces");
    }
    removed
}

/// Remove faces with repeated vertices or null area
///
/// Returns the number of faces removed.
pub fn remove_degenerate_faces(mesh: &mut TriangleMesh) -> usize {
    let before = mesh.faces.len();
    let vertices = &mesh.vertices;
    mesh.faces.retain(|face| {
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            return false;
        }
        let v0 = vertices[face[0]];
        let v1 = vertices[face[1]];
        let v2 = vertices[face[2]];
        let area = (v1 - v0).cross(&(v2 - v0)).norm() * 0.5;
        area > NULL_FACE_AREA
    });
    let removed = before - mesh.faces.len();
    if removed > 0 {
        debug!(removed, "removed degenerate faces");
    }
    removed
}

/// Drop vertices no face references and compact the vertex array
///
/// Returns the number of vertices removed.
pub fn prune_unreferenced_vertices(mesh: &mut TriangleMesh) -> usize {
    let mut used = vec![false; mesh.vertices.len()];
    for face in &mesh.faces {
        for &v in face {
            used[v] = true;
        }
    }
    if used.iter().all(|&u| u) {
        return 0;
    }

    let mut remap = vec![usize::MAX; mesh.vertices.len()];
    let mut kept_vertices = Vec::new();
    let mut kept_normals = mesh.normals.as_ref().map(|_| Vec::new());
    let mut kept_texcoords = mesh.texcoords.as_ref().map(|_| Vec::new());

    for (i, v) in mesh.vertices.iter().enumerate() {
        if used[i] {
            remap[i] = kept_vertices.len();
            kept_vertices.push(*v);
            if let (Some(dst), Some(src)) = (kept_normals.as_mut(), mesh.normals.as_ref()) {
                dst.push(src[i]);
            }
            if let (Some(dst), Some(src)) = (kept_texcoords.as_mut(), mesh.texcoords.as_ref()) {
                dst.push(src[i]);
            }
        }
    }

    let removed = mesh.vertices.len() - kept_vertices.len();
    for face in &mut mesh.faces {
        for v in face.iter_mut() {
            *v = remap[*v];
        }
    }
    mesh.vertices = kept_vertices;
    mesh.normals = kept_normals;
    mesh.texcoords = kept_texcoords;
    debug!(removed, "pruned unreferenced vertices");
    removed
}

/// Boundary loops of the mesh, each as an ordered vertex cycle
///
/// Expects deduplicated faces; a duplicated face would make its edges look
/// like boundaries. Loops touching a non-manifold boundary vertex are
/// dropped rather than guessed at.
fn boundary_loops(mesh: &TriangleMesh) -> Vec<Vec<usize>> {
    let mut directed: HashSet<(usize, usize)> = HashSet::new();
    for face in &mesh.faces {
        directed.insert((face[0], face[1]));
        directed.insert((face[1], face[2]));
        directed.insert((face[2], face[0]));
    }

    // A boundary edge has no opposing twin. Walking successor edges yields
    // the hole perimeter in face-winding order.
    let mut next: HashMap<usize, usize> = HashMap::new();
    let mut ambiguous: HashSet<usize> = HashSet::new();
    for &(a, b) in &directed {
        if !directed.contains(&(b, a)) && next.insert(a, b).is_some() {
            ambiguous.insert(a);
        }
    }

    let mut starts: Vec<usize> = next.keys().copied().collect();
    starts.sort_unstable();

    let mut visited: HashSet<usize> = HashSet::new();
    let mut loops = Vec::new();
    for start in starts {
        if visited.contains(&start) || ambiguous.contains(&start) {
            continue;
        }
        let mut cycle = vec![start];
        let mut ok = true;
        let mut cur = next[&start];
        while cur != start {
            if visited.contains(&cur) || ambiguous.contains(&cur) {
                ok = false;
                break;
            }
            visited.insert(cur);
            cycle.push(cur);
            match next.get(&cur) {
                Some(&n) => cur = n,
                None => {
                    ok = false;
                    break;
                }
            }
            if cycle.len() > mesh.vertex_count() {
                ok = false;
                break;
            }
        }
        visited.insert(start);
        if ok && cycle.len() >= 3 {
            loops.push(cycle);
        }
    }
    loops
}

/// Close boundary loops of up to `max_edges` edges with a triangle fan
///
/// New faces are wound opposite to the boundary direction so they stitch
/// onto the surrounding surface with consistent orientation. Larger holes
/// are left open.
///
/// Returns the number of holes closed.
pub fn fill_small_holes(mesh: &mut TriangleMesh, max_edges: usize) -> usize {
    let loops = boundary_loops(mesh);
    let mut filled = 0;
    for cycle in loops {
        if cycle.len() > max_edges {
            debug!(edges = cycle.len(), max_edges, "leaving large hole open");
            continue;
        }
        for i in 1..cycle.len() - 1 {
            mesh.add_face([cycle[0], cycle[i + 1], cycle[i]]);
        }
        filled += 1;
    }
    if filled > 0 {
        debug!(filled, "closed boundary holes");
    }
    filled
}

/// Uniform Laplacian smoothing with pinned boundary vertices
///
/// Each interior vertex moves halfway toward the centroid of its
/// neighbors per iteration. Boundary vertices stay put so open edges do
/// not shrink inward.
pub fn laplacian_smooth(mesh: &mut TriangleMesh, iterations: usize) {
    if mesh.vertices.is_empty() || iterations == 0 {
        return;
    }

    let mut neighbor_sets: Vec<HashSet<usize>> = vec![HashSet::new(); mesh.vertices.len()];
    let mut edge_faces: HashMap<(usize, usize), u32> = HashMap::new();
    for face in &mesh.faces {
        for (a, b) in [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])] {
            neighbor_sets[a].insert(b);
            neighbor_sets[b].insert(a);
            let key = if a < b { (a, b) } else { (b, a) };
            *edge_faces.entry(key).or_insert(0) += 1;
        }
    }
    let neighbors: Vec<Vec<usize>> = neighbor_sets
        .into_iter()
        .map(|set| set.into_iter().collect())
        .collect();

    let mut pinned = vec![false; mesh.vertices.len()];
    for (&(a, b), &count) in &edge_faces {
        if count != 2 {
            pinned[a] = true;
            pinned[b] = true;
        }
    }

    for _ in 0..iterations {
        let snapshot = mesh.vertices.clone();
        let updated: Vec<Point3f> = (0..snapshot.len())
            .into_par_iter()
            .map(|i| {
                if pinned[i] || neighbors[i].is_empty() {
                    return snapshot[i];
                }
                let mut acc = Vector3f::zeros();
                for &n in &neighbors[i] {
                    acc += snapshot[n].coords;
                }
                let centroid = acc / neighbors[i].len() as f32;
                Point3f::from(snapshot[i].coords + (centroid - snapshot[i].coords) * SMOOTH_LAMBDA)
            })
            .collect();
        mesh.vertices = updated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::inspect;
    use meshpress_core::Point2f;

    fn open_tetrahedron() -> TriangleMesh {
        // Tetrahedron with the bottom face missing
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.5, 1.0, 0.0),
                Point3f::new(0.5, 0.5, 1.0),
            ],
            vec![[0, 1, 3], [1, 2, 3], [0, 3, 2]],
        )
    }

    #[test]
    fn test_remove_duplicate_vertices_remaps_faces() {
        let mut mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0), // duplicate of vertex 1
                Point3f::new(1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [3, 4, 2]],
        );
        let removed = remove_duplicate_vertices(&mut mesh);
        assert_eq!(removed, 1);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.faces[1][0], 1);
    }

    #[test]
    fn test_remove_duplicate_vertices_keeps_attributes_in_sync() {
        let mut mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[1, 2, 3]],
        );
        mesh.set_texcoords(vec![
            Point2f::new(0.0, 0.0),
            Point2f::new(0.1, 0.1),
            Point2f::new(1.0, 0.0),
            Point2f::new(0.0, 1.0),
        ]);
        remove_duplicate_vertices(&mut mesh);
        assert_eq!(mesh.vertex_count(), 3);
        let texcoords = mesh.texcoords.as_ref().unwrap();
        assert_eq!(texcoords.len(), 3);
        // First occurrence kept its texcoord
        assert_eq!(texcoords[0], Point2f::new(0.0, 0.0));
    }

    #[test]
    fn test_remove_duplicate_faces_ignores_orientation() {
        let mut mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 1], [1, 2, 0]],
        );
        let removed = remove_duplicate_faces(&mut mesh);
        assert_eq!(removed, 2);
        assert_eq!(mesh.face_count(), 1);
    }

    #[test]
    fn test_remove_degenerate_faces() {
        let mut mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(2.0, 0.0, 0.0), // collinear with 0 and 1
            ],
            vec![[0, 1, 2], [0, 1, 1], [0, 1, 3]],
        );
        let removed = remove_degenerate_faces(&mut mesh);
        assert_eq!(removed, 2);
        assert_eq!(mesh.face_count(), 1);
    }

    #[test]
    fn test_prune_unreferenced_vertices() {
        let mut mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(5.0, 5.0, 5.0), // unused
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[1, 2, 3]],
        );
        let removed = prune_unreferenced_vertices(&mut mesh);
        assert_eq!(removed, 1);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.faces[0], [0, 1, 2]);
    }

    #[test]
    fn test_fill_small_holes_makes_open_tetrahedron_watertight() {
        let mut mesh = open_tetrahedron();
        assert!(!inspect(&mesh).is_watertight);

        let filled = fill_small_holes(&mut mesh, 30);
        assert_eq!(filled, 1);
        assert_eq!(mesh.face_count(), 4);
        assert!(inspect(&mesh).is_watertight);
    }

    #[test]
    fn test_fill_small_holes_respects_size_limit() {
        let mut mesh = open_tetrahedron();
        let filled = fill_small_holes(&mut mesh, 2);
        assert_eq!(filled, 0);
        assert!(!inspect(&mesh).is_watertight);
    }

    #[test]
    fn test_laplacian_smooth_pins_boundary() {
        // 3x3 grid in the plane, center vertex lifted out of plane
        let mut vertices = Vec::new();
        for y in 0..3 {
            for x in 0..3 {
                vertices.push(Point3f::new(x as f32, y as f32, 0.0));
            }
        }
        vertices[4].z = 1.0;
        let mut faces = Vec::new();
        for y in 0..2 {
            for x in 0..2 {
                let i = y * 3 + x;
                faces.push([i, i + 1, i + 3]);
                faces.push([i + 1, i + 4, i + 3]);
            }
        }
        let mut mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);

        laplacian_smooth(&mut mesh, 3);

        // Corner is on the boundary and must not move
        assert_eq!(mesh.vertices[0], Point3f::new(0.0, 0.0, 0.0));
        // Center relaxes toward the plane
        assert!(mesh.vertices[4].z < 1.0);
    }

    #[test]
    fn test_repair_full_pass() {
        let mut mesh = open_tetrahedron();
        mesh.add_vertex(Point3f::new(9.0, 9.0, 9.0)); // unreferenced
        mesh.faces.push(mesh.faces[0]); // duplicate

        let summary = repair(
            &mut mesh,
            &RepairOptions {
                smooth: false,
                ..RepairOptions::default()
            },
        );
        assert_eq!(summary.duplicate_faces_removed, 1);
        assert_eq!(summary.unreferenced_vertices_removed, 1);
        assert_eq!(summary.holes_filled, 1);
        assert!(inspect(&mesh).is_watertight);
    }

    #[test]
    fn test_repair_on_empty_mesh_is_a_no_op() {
        let mut mesh = TriangleMesh::new();
        let summary = repair(&mut mesh, &RepairOptions::default());
        assert_eq!(summary.duplicate_vertices_removed, 0);
        assert_eq!(summary.holes_filled, 0);
        assert!(mesh.is_empty());
    }
}
