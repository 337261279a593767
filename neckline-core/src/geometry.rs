/// Geometry primitives shared by the mesh loader and the render backends
use nalgebra::{Point3, Vector2, Vector3};

/// Largest number of distinct vertices addressable with 16-bit indices.
pub const MAX_VERTICES: usize = u16::MAX as usize + 1;

/// A GPU-ready triangle mesh with one attribute set per output vertex.
///
/// Built once by the loader and never mutated afterwards; a new selection
/// replaces the whole mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedMesh {
    positions: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
    tex_coords: Vec<Vector2<f32>>,
    indices: Vec<u16>,
}

impl IndexedMesh {
    /// Assemble a mesh from parallel attribute arrays.
    ///
    /// Returns `None` if the attribute arrays differ in length, the index
    /// list is not a whole number of triangles, or an index points past the
    /// last vertex.
    pub fn new(
        positions: Vec<Point3<f32>>,
        normals: Vec<Vector3<f32>>,
        tex_coords: Vec<Vector2<f32>>,
        indices: Vec<u16>,
    ) -> Option<Self> {
        let count = positions.len();
        if normals.len() != count || tex_coords.len() != count || count > MAX_VERTICES {
            return None;
        }
        if indices.len() % 3 != 0 || indices.iter().any(|&i| i as usize >= count) {
            return None;
        }

        Some(Self {
            positions,
            normals,
            tex_coords,
            indices,
        })
    }

    pub fn positions(&self) -> &[Point3<f32>] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vector3<f32>] {
        &self.normals
    }

    pub fn tex_coords(&self) -> &[Vector2<f32>] {
        &self.tex_coords
    }

    /// Triangle list, three indices per triangle
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// Iterate over the triangles as resolved corner positions
    pub fn triangles(&self) -> impl Iterator<Item = [Point3<f32>; 3]> + '_ {
        self.indices.chunks_exact(3).map(move |tri| {
            [
                self.positions[tri[0] as usize],
                self.positions[tri[1] as usize],
                self.positions[tri[2] as usize],
            ]
        })
    }

    /// Axis-aligned bounds as (min, max), or `None` for a mesh without vertices
    pub fn bounds(&self) -> Option<(Point3<f32>, Point3<f32>)> {
        let first = *self.positions.first()?;
        let bounds = self.positions.iter().fold((first, first), |(lo, hi), p| {
            (lo.inf(p), hi.sup(p))
        });
        Some(bounds)
    }

    /// Flattened xyz positions, the layout vertex buffers expect
    pub fn position_buffer(&self) -> Vec<f32> {
        self.positions.iter().flat_map(|p| [p.x, p.y, p.z]).collect()
    }

    /// Flattened xyz normals
    pub fn normal_buffer(&self) -> Vec<f32> {
        self.normals.iter().flat_map(|n| [n.x, n.y, n.z]).collect()
    }

    /// Flattened uv coordinates
    pub fn tex_coord_buffer(&self) -> Vec<f32> {
        self.tex_coords.iter().flat_map(|t| [t.x, t.y]).collect()
    }
}

/// Calculate the face normal of a triangle from its corner positions
pub fn face_normal(corners: &[Point3<f32>; 3]) -> Vector3<f32> {
    let edge1 = corners[1] - corners[0];
    let edge2 = corners[2] - corners[0];

    edge1
        .cross(&edge2)
        .try_normalize(1e-12)
        .unwrap_or_else(Vector3::z)
}
