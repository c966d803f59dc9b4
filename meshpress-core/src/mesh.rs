//! Mesh data structures and functionality

use crate::{Point2f, Point3f, Vector3f};
use serde::{Deserialize, Serialize};

/// A triangle mesh with vertices, faces and optional per-vertex attributes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3f>,
    pub faces: Vec<[usize; 3]>,
    pub normals: Option<Vec<Vector3f>>,
    pub texcoords: Option<Vec<Point2f>>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            normals: None,
            texcoords: None,
        }
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            normals: None,
            texcoords: None,
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Check whether the mesh carries per-vertex texture coordinates
    pub fn has_texcoords(&self) -> bool {
        self.texcoords.is_some()
    }

    /// Add a vertex to the mesh
    pub fn add_vertex(&mut self, vertex: Point3f) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    /// Add a face to the mesh
    pub fn add_face(&mut self, face: [usize; 3]) {
        self.faces.push(face);
    }

    /// Calculate face normals
    pub fn calculate_face_normals(&self) -> Vec<Vector3f> {
        self.faces
            .iter()
            .map(|face| {
                let v0 = self.vertices[face[0]];
                let v1 = self.vertices[face[1]];
                let v2 = self.vertices[face[2]];

                let edge1 = v1 - v0;
                let edge2 = v2 - v0;

                edge1.cross(&edge2).normalize()
            })
            .collect()
    }

    /// Area of a single face
    ///
    /// Degenerate faces (repeated or collinear vertices) have zero area.
    pub fn face_area(&self, index: usize) -> f32 {
        let face = self.faces[index];
        let v0 = self.vertices[face[0]];
        let v1 = self.vertices[face[1]];
        let v2 = self.vertices[face[2]];

        (v1 - v0).cross(&(v2 - v0)).norm() * 0.5
    }

    /// Axis-aligned bounding box of the vertices, `None` for an empty mesh
    pub fn bounding_box(&self) -> Option<(Point3f, Point3f)> {
        let first = *self.vertices.first()?;
        let mut min = first;
        let mut max = first;
        for v in &self.vertices[1..] {
            for i in 0..3 {
                min[i] = min[i].min(v[i]);
                max[i] = max[i].max(v[i]);
            }
        }
        Some((min, max))
    }

    /// Length of the bounding box diagonal, zero for an empty mesh
    pub fn bbox_diagonal(&self) -> f32 {
        match self.bounding_box() {
            Some((min, max)) => (max - min).norm(),
            None => 0.0,
        }
    }

    /// Set vertex normals
    pub fn set_normals(&mut self, normals: Vec<Vector3f>) {
        if normals.len() == self.vertices.len() {
            self.normals = Some(normals);
        }
    }

    /// Set per-vertex texture coordinates
    pub fn set_texcoords(&mut self, texcoords: Vec<Point2f>) {
        if texcoords.len() == self.vertices.len() {
            self.texcoords = Some(texcoords);
        }
    }

    /// Clear the mesh
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.faces.clear();
        self.normals = None;
        self.texcoords = None;
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_right_triangle() -> TriangleMesh {
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
    fn test_face_area() {
        let mesh = unit_right_triangle();
        assert_relative_eq!(mesh.face_area(0), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_face_area() {
        let mut mesh = unit_right_triangle();
        mesh.faces[0] = [0, 1, 1];
        assert_relative_eq!(mesh.face_area(0), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_bounding_box() {
        let mesh = unit_right_triangle();
        let (min, max) = mesh.bounding_box().unwrap();
        assert_relative_eq!(min.x, 0.0);
        assert_relative_eq!(max.x, 1.0);
        assert_relative_eq!(max.y, 1.0);
        assert_relative_eq!(mesh.bbox_diagonal(), (2.0f32).sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_empty_mesh_has_no_bbox() {
        let mesh = TriangleMesh::new();
        assert!(mesh.bounding_box().is_none());
        assert_relative_eq!(mesh.bbox_diagonal(), 0.0);
    }

    #[test]
    fn test_texcoords_length_must_match() {
        let mut mesh = unit_right_triangle();
        mesh.set_texcoords(vec![Point2f::new(0.0, 0.0)]);
        assert!(!mesh.has_texcoords());

        mesh.set_texcoords(vec![
            Point2f::new(0.0, 0.0),
            Point2f::new(1.0, 0.0),
            Point2f::new(0.0, 1.0),
        ]);
        assert!(mesh.has_texcoords());
    }
}
