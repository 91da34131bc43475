//! Icosphere mesh with rest and live vertex position buffers.

use std::collections::HashMap;

use glam::Vec3;

use crate::params::GeometryParams;

/// The 12 vertices of a unit icosahedron (golden-ratio rectangles).
const ICOSAHEDRON_VERTICES: [[f32; 3]; 12] = {
    // t = (1 + sqrt(5)) / 2
    const T: f32 = 1.618_034;
    [
        [-1.0, T, 0.0],
        [1.0, T, 0.0],
        [-1.0, -T, 0.0],
        [1.0, -T, 0.0],
        [0.0, -1.0, T],
        [0.0, 1.0, T],
        [0.0, -1.0, -T],
        [0.0, 1.0, -T],
        [T, 0.0, -1.0],
        [T, 0.0, 1.0],
        [-T, 0.0, -1.0],
        [-T, 0.0, 1.0],
    ]
};

/// The 20 faces of the icosahedron (counter-clockwise winding).
const ICOSAHEDRON_FACES: [[u32; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

/// Subdivided icosahedron with shared vertices.
///
/// Tracks two position buffers: `rest` (snapshotted once, never mutated
/// afterwards) and `live` (rewritten every frame by the deformation engine).
/// The renderer reads `live` between ticks; the core is the only writer.
pub struct SphereMesh {
    radius: f32,
    pub(crate) rest: Vec<Vec3>,
    pub(crate) live: Vec<Vec3>,
    indices: Vec<u32>,
}

impl SphereMesh {
    /// Build an icosphere of the given circumradius and subdivision level.
    ///
    /// Each subdivision splits every triangle into four, caching edge
    /// midpoints so neighbours share vertices, then projects new vertices
    /// back onto the sphere.
    pub fn new(radius: f32, detail: u32) -> Self {
        let mut vertices: Vec<Vec3> = ICOSAHEDRON_VERTICES
            .iter()
            .map(|v| Vec3::from_array(*v).normalize() * radius)
            .collect();
        let mut faces: Vec<[u32; 3]> = ICOSAHEDRON_FACES.to_vec();

        for _ in 0..detail {
            let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
            let mut next_faces = Vec::with_capacity(faces.len() * 4);

            for [a, b, c] in faces {
                let ab = midpoint(&mut vertices, &mut midpoints, a, b, radius);
                let bc = midpoint(&mut vertices, &mut midpoints, b, c, radius);
                let ca = midpoint(&mut vertices, &mut midpoints, c, a, radius);

                next_faces.push([a, ab, ca]);
                next_faces.push([b, bc, ab]);
                next_faces.push([c, ca, bc]);
                next_faces.push([ab, bc, ca]);
            }
            faces = next_faces;
        }

        let indices = faces.iter().flatten().copied().collect();

        Self {
            radius,
            rest: Vec::new(),
            live: vertices,
            indices,
        }
    }

    /// Build from geometry parameters.
    pub fn from_params(params: &GeometryParams) -> Self {
        Self::new(params.radius, params.detail)
    }

    /// Nominal circumradius of the rest pose.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn vertex_count(&self) -> usize {
        self.live.len()
    }

    /// Current vertex positions, one per mesh vertex, refreshed every tick.
    pub fn live_positions(&self) -> &[Vec3] {
        &self.live
    }

    /// Rest-pose positions. Empty until the deformation engine captures the
    /// rest pose; immutable afterwards.
    pub fn rest_positions(&self) -> &[Vec3] {
        &self.rest
    }

    /// Triangle indices (counter-clockwise winding).
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Live positions as raw bytes for direct vertex-buffer upload.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.live)
    }

    pub(crate) fn rest_captured(&self) -> bool {
        !self.rest.is_empty()
    }
}

/// Index of the midpoint of edge `(a, b)`, inserting a new sphere-projected
/// vertex on first use. The key is order-independent so both adjacent faces
/// get the same vertex.
fn midpoint(
    vertices: &mut Vec<Vec3>,
    cache: &mut HashMap<(u32, u32), u32>,
    a: u32,
    b: u32,
    radius: f32,
) -> u32 {
    let key = if a < b { (a, b) } else { (b, a) };
    if let Some(&index) = cache.get(&key) {
        return index;
    }

    let mid = (vertices[a as usize] + vertices[b as usize]) * 0.5;
    let index = vertices.len() as u32;
    vertices.push(mid.normalize() * radius);
    cache.insert(key, index);
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_count_per_detail() {
        // 10 * 4^detail + 2 shared vertices.
        assert_eq!(SphereMesh::new(5.0, 0).vertex_count(), 12);
        assert_eq!(SphereMesh::new(5.0, 1).vertex_count(), 42);
        assert_eq!(SphereMesh::new(5.0, 2).vertex_count(), 162);
    }

    #[test]
    fn test_triangle_count_per_detail() {
        // 20 * 4^detail triangles.
        assert_eq!(SphereMesh::new(5.0, 0).indices().len(), 20 * 3);
        assert_eq!(SphereMesh::new(5.0, 1).indices().len(), 80 * 3);
    }

    #[test]
    fn test_all_vertices_on_sphere() {
        let mesh = SphereMesh::new(5.0, 3);
        for v in mesh.live_positions() {
            assert!((v.length() - 5.0).abs() < 1e-3, "vertex off sphere: {v}");
        }
    }

    #[test]
    fn test_indices_reference_valid_vertices() {
        let mesh = SphereMesh::new(2.0, 2);
        let count = mesh.vertex_count() as u32;
        assert!(mesh.indices().iter().all(|&i| i < count));
    }

    #[test]
    fn test_position_bytes_match_live_buffer() {
        let mesh = SphereMesh::new(1.0, 1);
        let bytes = mesh.position_bytes();
        assert_eq!(bytes.len(), mesh.vertex_count() * 3 * 4);
    }

    #[test]
    fn test_rest_empty_before_capture() {
        let mesh = SphereMesh::new(5.0, 1);
        assert!(!mesh.rest_captured());
        assert!(mesh.rest_positions().is_empty());
    }
}
