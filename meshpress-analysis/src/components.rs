//! Connected component analysis over mesh face adjacency

use meshpress_core::TriangleMesh;

/// Union-find over vertex indices with path compression and union by size.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }
}

/// Label each vertex with the id of the connected shell it belongs to
///
/// Connectivity follows face edges, so two vertices are in the same
/// component when a path of triangle edges joins them. Vertices not
/// referenced by any face are labeled `None`.
///
/// # Arguments
/// * `mesh` - Input mesh
///
/// # Returns
/// * `Vec<Option<usize>>` - Component id per vertex, compacted to 0..n
pub fn component_labels(mesh: &TriangleMesh) -> Vec<Option<usize>> {
    let mut sets = DisjointSet::new(mesh.vertex_count());
    let mut referenced = vec![false; mesh.vertex_count()];

    for face in &mesh.faces {
        sets.union(face[0], face[1]);
        sets.union(face[1], face[2]);
        for &v in face {
            referenced[v] = true;
        }
    }

    let mut next_id = 0;
    let mut id_of_root = std::collections::HashMap::new();
    (0..mesh.vertex_count())
        .map(|v| {
            if !referenced[v] {
                return None;
            }
            let root = sets.find(v);
            let id = *id_of_root.entry(root).or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                id
            });
            Some(id)
        })
        .collect()
}

/// Number of connected shells in the mesh
///
/// Unreferenced vertices do not count as components; a mesh with no faces
/// has zero components.
pub fn component_count(mesh: &TriangleMesh) -> usize {
    component_labels(mesh)
        .into_iter()
        .flatten()
        .max()
        .map_or(0, |max_id| max_id + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshpress_core::Point3f;

    fn two_separate_triangles() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(5.0, 0.0, 0.0),
                Point3f::new(6.0, 0.0, 0.0),
                Point3f::new(5.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [3, 4, 5]],
        )
    }

    #[test]
    fn test_single_triangle_is_one_component() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        assert_eq!(component_count(&mesh), 1);
    }

    #[test]
    fn test_disjoint_triangles_are_two_components() {
        let mesh = two_separate_triangles();
        assert_eq!(component_count(&mesh), 2);

        let labels = component_labels(&mesh);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_shared_vertex_joins_components() {
        let mut mesh = two_separate_triangles();
        // Bridge the two shells through vertex 2 and 3
        mesh.add_face([2, 3, 4]);
        assert_eq!(component_count(&mesh), 1);
    }

    #[test]
    fn test_unreferenced_vertices_are_unlabeled() {
        let mut mesh = two_separate_triangles();
        mesh.add_vertex(Point3f::new(100.0, 100.0, 100.0));
        let labels = component_labels(&mesh);
        assert_eq!(labels[6], None);
        assert_eq!(component_count(&mesh), 2);
    }

    #[test]
    fn test_empty_mesh_has_no_components() {
        assert_eq!(component_count(&TriangleMesh::new()), 0);
    }
}
