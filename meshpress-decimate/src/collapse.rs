//! Quadric error metric edge collapse on a half-edge mesh.
//!
//! A half-edge structure gives cheap local topology queries (neighbor
//! iteration, link condition checks) while edges are collapsed in
//! ascending quadric error order until the face budget is met. Open
//! boundaries and texture seams are held in shape by constraint planes
//! through each boundary edge, perpendicular to its adjacent face, scaled
//! by a configurable weight.

use meshpress_core::{Error, Point2f, Point3f, Result, TriangleMesh, Vector3f};
use nalgebra::{Matrix4, Vector4};
use priority_queue::PriorityQueue;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

const INVALID: usize = usize::MAX;

/// Rebuild the candidate queue after this many collapses so that queued
/// costs do not drift too far from the evolving quadrics.
const REBUILD_INTERVAL: usize = 100;

// ============================================================
// Half-Edge Data Structure
// ============================================================

#[derive(Debug, Clone)]
struct HalfEdge {
    target: usize,
    twin: usize,
    next: usize,
    prev: usize,
    face: usize,
}

/// Half-edge mesh with per-vertex quadrics for collapse operations.
struct HalfEdgeMesh {
    half_edges: Vec<HalfEdge>,
    /// One outgoing half-edge per vertex (INVALID if removed)
    vertex_edge: Vec<usize>,
    /// One half-edge per face (INVALID if removed)
    face_edge: Vec<usize>,
    active_face_count: usize,
    positions: Vec<Point3f>,
    normals: Option<Vec<Vector3f>>,
    texcoords: Option<Vec<Point2f>>,
    quadrics: Vec<Matrix4<f64>>,
    vertex_removed: Vec<bool>,
}

impl HalfEdgeMesh {
    fn from_triangle_mesh(mesh: &TriangleMesh, boundary_weight: f64) -> Self {
        let nv = mesh.vertices.len();
        let nf = mesh.faces.len();

        let mut half_edges = Vec::with_capacity(nf * 3);
        let mut vertex_edge = vec![INVALID; nv];
        let mut face_edge = Vec::with_capacity(nf);

        for (fi, face) in mesh.faces.iter().enumerate() {
            let base = fi * 3;
            for j in 0..3usize {
                half_edges.push(HalfEdge {
                    target: face[(j + 1) % 3],
                    twin: INVALID,
                    next: base + (j + 1) % 3,
                    prev: base + (j + 2) % 3,
                    face: fi,
                });
                if vertex_edge[face[j]] == INVALID {
                    vertex_edge[face[j]] = base + j;
                }
            }
            face_edge.push(base);
        }

        // Pair up twins by directed edge lookup
        let mut edge_map: HashMap<(usize, usize), usize> = HashMap::with_capacity(nf * 3);
        for (he_idx, he) in half_edges.iter().enumerate() {
            let src = half_edges[he.prev].target;
            edge_map.insert((src, he.target), he_idx);
        }
        for he_idx in 0..half_edges.len() {
            if half_edges[he_idx].twin != INVALID {
                continue;
            }
            let src = half_edges[half_edges[he_idx].prev].target;
            let tgt = half_edges[he_idx].target;
            if let Some(&twin_idx) = edge_map.get(&(tgt, src)) {
                half_edges[he_idx].twin = twin_idx;
                half_edges[twin_idx].twin = he_idx;
            }
        }

        let mut hem = HalfEdgeMesh {
            half_edges,
            vertex_edge,
            face_edge,
            active_face_count: nf,
            positions: mesh.vertices.clone(),
            normals: mesh.normals.clone(),
            texcoords: mesh.texcoords.clone(),
            quadrics: vec![Matrix4::zeros(); nv],
            vertex_removed: vec![false; nv],
        };
        hem.accumulate_face_quadrics();
        hem.accumulate_boundary_constraints(boundary_weight);
        hem
    }

    #[inline]
    fn source(&self, he: usize) -> usize {
        self.half_edges[self.half_edges[he].prev].target
    }

    fn compute_plane(v0: &Point3f, v1: &Point3f, v2: &Point3f) -> Vector4<f64> {
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let n = e1.cross(&e2).normalize();
        if !n.iter().all(|x| x.is_finite()) {
            return Vector4::new(0.0, 0.0, 1.0, 0.0);
        }
        let d = -n.dot(&v0.coords);
        Vector4::new(n.x as f64, n.y as f64, n.z as f64, d as f64)
    }

    fn plane_to_quadric(p: &Vector4<f64>) -> Matrix4<f64> {
        let (a, b, c, d) = (p[0], p[1], p[2], p[3]);
        Matrix4::new(
            a * a, a * b, a * c, a * d,
            a * b, b * b, b * c, b * d,
            a * c, b * c, c * c, c * d,
            a * d, b * d, c * d, d * d,
        )
    }

    fn accumulate_face_quadrics(&mut self) {
        for fi in 0..self.face_edge.len() {
            let he0 = self.face_edge[fi];
            if he0 == INVALID {
                continue;
            }
            let he1 = self.half_edges[he0].next;
            let v0 = self.source(he0);
            let v1 = self.half_edges[he0].target;
            let v2 = self.half_edges[he1].target;
            let plane =
                Self::compute_plane(&self.positions[v0], &self.positions[v1], &self.positions[v2]);
            let q = Self::plane_to_quadric(&plane);
            self.quadrics[v0] += q;
            self.quadrics[v1] += q;
            self.quadrics[v2] += q;
        }
    }

    /// Constraint plane for an unpaired half-edge: contains the edge and is
    /// perpendicular to its adjacent face, so any collapse target leaving
    /// the boundary line pays for its deviation.
    fn boundary_constraint_plane(&self, he: usize) -> Option<Vector4<f64>> {
        let src = self.source(he);
        let tgt = self.half_edges[he].target;
        let he_next = self.half_edges[he].next;
        let apex = self.half_edges[he_next].target;

        let face_n = (self.positions[tgt] - self.positions[src])
            .cross(&(self.positions[apex] - self.positions[src]));
        let edge = self.positions[tgt] - self.positions[src];
        let n = face_n.cross(&edge).normalize();
        if !n.iter().all(|x| x.is_finite()) {
            return None;
        }
        let d = -n.dot(&self.positions[src].coords);
        Some(Vector4::new(n.x as f64, n.y as f64, n.z as f64, d as f64))
    }

    fn accumulate_boundary_constraints(&mut self, weight: f64) {
        for he in 0..self.half_edges.len() {
            if self.half_edges[he].twin != INVALID {
                continue;
            }
            if let Some(plane) = self.boundary_constraint_plane(he) {
                let q = Self::plane_to_quadric(&plane) * weight;
                let src = self.source(he);
                let tgt = self.half_edges[he].target;
                self.quadrics[src] += q;
                self.quadrics[tgt] += q;
            }
        }
    }

    /// All outgoing half-edges from a vertex, including across a boundary.
    fn outgoing_half_edges(&self, v: usize) -> Vec<usize> {
        let start = self.vertex_edge[v];
        if start == INVALID {
            return vec![];
        }

        let mut result = Vec::new();
        let mut current = start;

        // Rotate counterclockwise: current.prev.twin
        loop {
            result.push(current);
            let prev = self.half_edges[current].prev;
            let twin = self.half_edges[prev].twin;
            if twin == INVALID {
                break;
            }
            current = twin;
            if current == start {
                return result;
            }
        }

        // Hit a boundary: also rotate clockwise from start via twin.next
        let twin_of_start = self.half_edges[start].twin;
        if twin_of_start != INVALID {
            let mut current = self.half_edges[twin_of_start].next;
            loop {
                if current == start {
                    break;
                }
                result.push(current);
                let twin = self.half_edges[current].twin;
                if twin == INVALID {
                    break;
                }
                current = self.half_edges[twin].next;
            }
        }

        result
    }

    fn neighbors(&self, v: usize) -> HashSet<usize> {
        self.outgoing_half_edges(v)
            .iter()
            .map(|&he| self.half_edges[he].target)
            .collect()
    }

    /// Link condition: the common neighbors of the endpoints must be
    /// exactly the face apices opposite the edge (2 interior, 1 boundary),
    /// otherwise the collapse would pinch the surface.
    fn check_link_condition(&self, v1: usize, v2: usize) -> bool {
        let n1 = self.neighbors(v1);
        let n2 = self.neighbors(v2);
        let common_count = n1.intersection(&n2).count();

        let he = match self.find_half_edge(v1, v2) {
            Some(he) => he,
            None => return false,
        };
        let expected = if self.half_edges[he].twin == INVALID { 1 } else { 2 };
        common_count == expected
    }

    fn find_half_edge(&self, from: usize, to: usize) -> Option<usize> {
        for &he in &self.outgoing_half_edges(from) {
            if self.half_edges[he].target == to {
                return Some(he);
            }
        }
        None
    }

    /// Optimal merged position and its quadric error for collapsing (v1, v2).
    ///
    /// Solves the 3x3 system when the combined quadric is invertible, and
    /// falls back to the edge midpoint when it is rank deficient (flat or
    /// underconstrained regions).
    fn compute_collapse_cost(&self, v1: usize, v2: usize) -> (Point3f, f64) {
        let q = self.quadrics[v1] + self.quadrics[v2];
        let q3 = q.fixed_view::<3, 3>(0, 0);
        let q1 = q.fixed_view::<3, 1>(0, 3);

        let optimal = if let Some(inv) = q3.try_inverse() {
            let p = -inv * q1;
            Point3f::new(p[0] as f32, p[1] as f32, p[2] as f32)
        } else {
            Point3f::from((self.positions[v1].coords + self.positions[v2].coords) * 0.5)
        };

        let vh = Vector4::new(
            optimal.x as f64,
            optimal.y as f64,
            optimal.z as f64,
            1.0,
        );
        let cost = (vh.transpose() * q * vh)[0].max(0.0);
        (optimal, cost)
    }

    /// Find any valid outgoing half-edge from a vertex (linear scan fallback).
    fn find_valid_outgoing(&self, v: usize) -> usize {
        for (i, he) in self.half_edges.iter().enumerate() {
            if he.face != INVALID && self.source(i) == v {
                return i;
            }
        }
        INVALID
    }

    /// Collapse edge (v1, v2), merging v2 into v1 at new_pos.
    /// Returns true on success.
    fn collapse_edge(&mut self, v1: usize, v2: usize, new_pos: Point3f) -> bool {
        let he = match self.find_half_edge(v1, v2) {
            Some(he) => he,
            None => return false,
        };

        let he_twin = self.half_edges[he].twin;
        let he_next = self.half_edges[he].next;
        let he_prev = self.half_edges[he].prev;
        let face_a = self.half_edges[he].face;
        let he_next_twin = self.half_edges[he_next].twin;
        let he_prev_twin = self.half_edges[he_prev].twin;
        let c = self.half_edges[he_next].target;

        let (face_b, ht_next, ht_prev, ht_next_twin, ht_prev_twin, d) = if he_twin != INVALID {
            let hn = self.half_edges[he_twin].next;
            let hp = self.half_edges[he_twin].prev;
            (
                self.half_edges[he_twin].face,
                hn,
                hp,
                self.half_edges[hn].twin,
                self.half_edges[hp].twin,
                self.half_edges[hn].target,
            )
        } else {
            (INVALID, INVALID, INVALID, INVALID, INVALID, INVALID)
        };

        // Collect v2 outgoing edges before any surgery
        let v2_outgoing = self.outgoing_half_edges(v2);

        // Re-pair twins across the removed face A
        if he_next_twin != INVALID {
            self.half_edges[he_next_twin].twin = he_prev_twin;
        }
        if he_prev_twin != INVALID {
            self.half_edges[he_prev_twin].twin = he_next_twin;
        }

        self.half_edges[he].face = INVALID;
        self.half_edges[he_next].face = INVALID;
        self.half_edges[he_prev].face = INVALID;
        self.face_edge[face_a] = INVALID;
        self.active_face_count -= 1;

        // Same for face B when the edge is interior
        if face_b != INVALID {
            if ht_next_twin != INVALID {
                self.half_edges[ht_next_twin].twin = ht_prev_twin;
            }
            if ht_prev_twin != INVALID {
                self.half_edges[ht_prev_twin].twin = ht_next_twin;
            }
            self.half_edges[he_twin].face = INVALID;
            self.half_edges[ht_next].face = INVALID;
            self.half_edges[ht_prev].face = INVALID;
            self.face_edge[face_b] = INVALID;
            self.active_face_count -= 1;
        }

        // Redirect all references to v2 onto v1
        for &out in &v2_outgoing {
            let prev = self.half_edges[out].prev;
            self.half_edges[prev].target = v1;

            let twin = self.half_edges[out].twin;
            if twin != INVALID && self.half_edges[twin].face != INVALID {
                self.half_edges[twin].target = v1;
            }
        }

        // Repair the outgoing pointer of v1 if its edge died with face A/B
        if self.half_edges[self.vertex_edge[v1]].face == INVALID {
            if he_prev_twin != INVALID && self.half_edges[he_prev_twin].face != INVALID {
                self.vertex_edge[v1] = he_prev_twin;
            } else {
                self.vertex_edge[v1] = self.find_valid_outgoing(v1);
            }
        }

        // Same repair for the apex opposite the collapsed edge in face A
        if c != INVALID
            && self.vertex_edge[c] != INVALID
            && self.half_edges[self.vertex_edge[c]].face == INVALID
        {
            if he_next_twin != INVALID && self.half_edges[he_next_twin].face != INVALID {
                self.vertex_edge[c] = he_next_twin;
            } else {
                self.vertex_edge[c] = self.find_valid_outgoing(c);
            }
        }

        // And for the apex in face B
        if d != INVALID
            && d != c
            && self.vertex_edge[d] != INVALID
            && self.half_edges[self.vertex_edge[d]].face == INVALID
        {
            if ht_next_twin != INVALID && self.half_edges[ht_next_twin].face != INVALID {
                self.vertex_edge[d] = ht_next_twin;
            } else {
                self.vertex_edge[d] = self.find_valid_outgoing(d);
            }
        }

        self.vertex_edge[v2] = INVALID;
        self.vertex_removed[v2] = true;

        let v2_quadric = self.quadrics[v2];
        self.positions[v1] = new_pos;
        self.quadrics[v1] += v2_quadric;

        if let Some(ref mut normals) = self.normals {
            let avg = (normals[v1] + normals[v2]).normalize();
            if avg.iter().all(|x| x.is_finite()) {
                normals[v1] = avg;
            }
        }

        if let Some(ref mut texcoords) = self.texcoords {
            let t1 = texcoords[v1];
            let t2 = texcoords[v2];
            texcoords[v1] = Point2f::from((t1.coords + t2.coords) * 0.5);
        }

        true
    }

    /// Compact live vertices and faces back into a triangle mesh.
    fn to_triangle_mesh(&self) -> TriangleMesh {
        let mut old_to_new: HashMap<usize, usize> = HashMap::new();
        let mut new_positions = Vec::new();
        let mut new_normals = self.normals.as_ref().map(|_| Vec::new());
        let mut new_texcoords = self.texcoords.as_ref().map(|_| Vec::new());

        for (i, &removed) in self.vertex_removed.iter().enumerate() {
            if removed || self.vertex_edge[i] == INVALID {
                continue;
            }
            old_to_new.insert(i, new_positions.len());
            new_positions.push(self.positions[i]);
            if let (Some(src), Some(dst)) = (self.normals.as_ref(), new_normals.as_mut()) {
                dst.push(src[i]);
            }
            if let (Some(src), Some(dst)) = (self.texcoords.as_ref(), new_texcoords.as_mut()) {
                dst.push(src[i]);
            }
        }

        let mut new_faces = Vec::new();
        for fi in 0..self.face_edge.len() {
            let he0 = self.face_edge[fi];
            if he0 == INVALID {
                continue;
            }
            let he1 = self.half_edges[he0].next;
            let v0 = self.source(he0);
            let v1 = self.half_edges[he0].target;
            let v2 = self.half_edges[he1].target;

            if let (Some(&nv0), Some(&nv1), Some(&nv2)) =
                (old_to_new.get(&v0), old_to_new.get(&v1), old_to_new.get(&v2))
            {
                if nv0 != nv1 && nv1 != nv2 && nv2 != nv0 {
                    new_faces.push([nv0, nv1, nv2]);
                }
            }
        }

        let mut mesh = TriangleMesh::from_vertices_and_faces(new_positions, new_faces);
        if let Some(normals) = new_normals {
            mesh.set_normals(normals);
        }
        if let Some(texcoords) = new_texcoords {
            mesh.set_texcoords(texcoords);
        }
        mesh
    }
}

// ============================================================
// Edge Cost for Priority Queue
// ============================================================

#[derive(Debug, Clone)]
struct EdgeCost {
    v1: usize,
    v2: usize,
    cost: f64,
}

impl PartialEq for EdgeCost {
    fn eq(&self, other: &Self) -> bool {
        self.cost.total_cmp(&other.cost) == Ordering::Equal
    }
}
impl Eq for EdgeCost {}

impl PartialOrd for EdgeCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCost {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: smallest cost first
        other.cost.total_cmp(&self.cost)
    }
}

// ============================================================
// Quadric Decimator
// ============================================================

/// Single-pass quadric edge collapse toward a face budget.
///
/// Boundary behavior is controlled entirely through constraint plane
/// weighting rather than by skipping boundary edges, so heavily reduced
/// meshes can still trade boundary vertices away while keeping the
/// boundary lines (and with them texture seams) in place.
pub struct QuadricDecimator {
    /// Stop once the cheapest remaining collapse exceeds this error
    pub error_threshold: Option<f64>,
    /// Weight applied to boundary constraint planes
    pub boundary_weight: f64,
}

impl Default for QuadricDecimator {
    fn default() -> Self {
        Self {
            error_threshold: None,
            boundary_weight: crate::params::DEFAULT_BOUNDARY_WEIGHT,
        }
    }
}

impl QuadricDecimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(error_threshold: Option<f64>, boundary_weight: f64) -> Self {
        Self {
            error_threshold,
            boundary_weight,
        }
    }

    /// Queue every live edge with its current collapse cost.
    fn build_queue(&self, hem: &HalfEdgeMesh) -> PriorityQueue<usize, EdgeCost> {
        let mut queue = PriorityQueue::new();
        let mut seen_edges: HashSet<(usize, usize)> = HashSet::new();
        let mut edge_id = 0usize;

        for vi in 0..hem.positions.len() {
            if hem.vertex_removed[vi] || hem.vertex_edge[vi] == INVALID {
                continue;
            }
            for &he in &hem.outgoing_half_edges(vi) {
                if hem.half_edges[he].face == INVALID {
                    continue;
                }
                let target = hem.half_edges[he].target;
                let key = (vi.min(target), vi.max(target));
                if !seen_edges.insert(key) {
                    continue;
                }

                let (_, cost) = hem.compute_collapse_cost(vi, target);
                queue.push(
                    edge_id,
                    EdgeCost {
                        v1: vi,
                        v2: target,
                        cost,
                    },
                );
                edge_id += 1;
            }
        }

        queue
    }

    /// Collapse edges until at most `target_faces` faces remain.
    ///
    /// Returns the input unchanged when it is already within budget. The
    /// pass can land above the budget when the link condition forbids all
    /// remaining collapses or the error threshold cuts in.
    pub fn decimate_to_count(
        &self,
        mesh: &TriangleMesh,
        target_faces: usize,
    ) -> Result<TriangleMesh> {
        if mesh.is_empty() {
            return Err(Error::InvalidData("mesh has no vertices".to_string()));
        }
        if target_faces == 0 {
            return Err(Error::InvalidData(
                "target face count must be positive".to_string(),
            ));
        }
        if mesh.face_count() <= target_faces {
            return Ok(mesh.clone());
        }

        let mut hem = HalfEdgeMesh::from_triangle_mesh(mesh, self.boundary_weight);
        let mut queue = self.build_queue(&hem);
        let mut collapse_count = 0usize;
        let mut collapses_at_refill = 0usize;

        while hem.active_face_count > target_faces {
            let (_, edge_cost) = match queue.pop() {
                Some(item) => item,
                None => {
                    // Refill once per batch of progress; an empty queue with
                    // no collapses since the last refill means no legal
                    // collapse remains.
                    if collapse_count == collapses_at_refill {
                        break;
                    }
                    collapses_at_refill = collapse_count;
                    queue = self.build_queue(&hem);
                    continue;
                }
            };

            if let Some(threshold) = self.error_threshold {
                if edge_cost.cost > threshold {
                    break;
                }
            }

            let v1 = edge_cost.v1;
            let v2 = edge_cost.v2;

            // Stale entries: vertices may have died since queuing
            if hem.vertex_removed[v1]
                || hem.vertex_removed[v2]
                || hem.vertex_edge[v1] == INVALID
                || hem.vertex_edge[v2] == INVALID
            {
                continue;
            }

            if hem.find_half_edge(v1, v2).is_none() {
                continue;
            }

            if !hem.check_link_condition(v1, v2) {
                continue;
            }

            // Recompute at collapse time; quadrics have moved on
            let (pos, _cost) = hem.compute_collapse_cost(v1, v2);

            if hem.collapse_edge(v1, v2, pos) {
                collapse_count += 1;
                if collapse_count % REBUILD_INTERVAL == 0 {
                    collapses_at_refill = collapse_count;
                    queue = self.build_queue(&hem);
                }
            }
        }

        let result = hem.to_triangle_mesh();
        debug!(
            faces_before = mesh.face_count(),
            faces_after = result.face_count(),
            collapses = collapse_count,
            "edge collapse pass finished"
        );
        Ok(result)
    }
}
