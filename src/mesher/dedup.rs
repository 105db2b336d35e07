//! Vertex deduplication and triangulation of polygon soup.
//!
//! Smooth faces share output vertices whenever position, normal, UV and color
//! all match exactly. Flat faces never share: each corner becomes a new vertex
//! carrying the face normal, so neighbouring flat faces keep hard edges.

use std::collections::HashMap;

use super::geometry::{MeshRecord, Vertex};
use crate::error::SkipReason;
use crate::scene::MeshData;
use crate::types::{Color, Vec3};

/// One polygon corner with its attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    pub position: Vec3,
    /// Vertex normal, used when the face is smooth.
    pub normal: Vec3,
    pub uv: Option<[f64; 2]>,
    pub color: Option<Color>,
}

/// A polygon ready for deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub corners: Vec<Corner>,
    pub smooth: bool,
    pub normal: Vec3,
}

/// Bitwise cache key for a smooth corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VertexKey {
    position: [u64; 3],
    normal: [u64; 3],
    uv: Option<[u64; 2]>,
    color: Option<[u64; 3]>,
}

impl VertexKey {
    fn new(corner: &Corner) -> Self {
        Self {
            position: corner.position.map(f64::to_bits),
            normal: corner.normal.map(f64::to_bits),
            uv: corner.uv.map(|uv| uv.map(f64::to_bits)),
            color: corner.color.map(|c| c.map(f64::to_bits)),
        }
    }
}

/// Accumulates faces into a deduplicated [`MeshRecord`].
#[derive(Debug)]
pub struct VertexDeduplicator {
    record: MeshRecord,
    with_normals: bool,
    cache: HashMap<VertexKey, u32>,
}

impl VertexDeduplicator {
    /// `with_normals` should be true iff any face of the record is smooth.
    pub fn new(name: impl Into<String>, with_normals: bool) -> Self {
        Self {
            record: MeshRecord::new(name),
            with_normals,
            cache: HashMap::new(),
        }
    }

    /// Add one face; faces with more than four corners are fan-triangulated.
    pub fn add_face(&mut self, face: &Face) {
        let indices: Vec<u32> = face
            .corners
            .iter()
            .map(|corner| {
                if face.smooth {
                    self.shared_vertex(corner)
                } else {
                    let vertex = self.vertex(corner, face.normal);
                    self.record.add_vertex(vertex)
                }
            })
            .collect();

        match indices.as_slice() {
            [a, b, c] => self.record.add_triangle(*a, *b, *c),
            [a, b, c, d] => self.record.add_quad(*a, *b, *c, *d),
            [first, rest @ ..] => {
                for pair in rest.windows(2) {
                    self.record.add_triangle(*first, pair[0], pair[1]);
                }
            }
            [] => {}
        }
    }

    fn shared_vertex(&mut self, corner: &Corner) -> u32 {
        let key = VertexKey::new(corner);
        if let Some(&index) = self.cache.get(&key) {
            return index;
        }
        let vertex = self.vertex(corner, corner.normal);
        let index = self.record.add_vertex(vertex);
        self.cache.insert(key, index);
        index
    }

    fn vertex(&self, corner: &Corner, normal: Vec3) -> Vertex {
        Vertex {
            position: corner.position,
            normal: self.with_normals.then_some(normal),
            uv: corner.uv,
            color: corner.color,
        }
    }

    pub fn finish(self) -> MeshRecord {
        self.record
    }
}

/// Deduplicate a list of faces into one record.
pub fn dedupe(name: impl Into<String>, faces: &[Face]) -> MeshRecord {
    let with_normals = faces.iter().any(|f| f.smooth);
    let mut dedup = VertexDeduplicator::new(name, with_normals);
    for face in faces {
        dedup.add_face(face);
    }
    dedup.finish()
}

/// Check that every polygon of a mesh can be triangulated: at least three
/// corners, indices in range, and per-corner layers matching the corner count.
///
/// Runs over the whole mesh regardless of material slot, so a bad polygon in
/// one slot fails the object before any slot is written.
pub fn validate_mesh(mesh: &MeshData) -> Result<(), SkipReason> {
    let corners = mesh.corner_count();
    if let Some(uvs) = &mesh.uvs {
        if uvs.len() != corners {
            return Err(SkipReason::MeshConversion(format!(
                "'{}' has {} UVs for {} corners",
                mesh.name,
                uvs.len(),
                corners
            )));
        }
    }
    if let Some(colors) = &mesh.colors {
        if colors.len() != corners {
            return Err(SkipReason::MeshConversion(format!(
                "'{}' has {} colors for {} corners",
                mesh.name,
                colors.len(),
                corners
            )));
        }
    }

    for polygon in &mesh.polygons {
        if polygon.vertices.len() < 3 {
            return Err(SkipReason::MeshConversion(format!(
                "'{}' has a polygon with {} corners",
                mesh.name,
                polygon.vertices.len()
            )));
        }
        if let Some(&vi) = polygon
            .vertices
            .iter()
            .find(|&&vi| vi as usize >= mesh.positions.len())
        {
            return Err(SkipReason::MeshConversion(format!(
                "'{}' references missing vertex {}",
                mesh.name, vi
            )));
        }
    }
    Ok(())
}

/// Collect the faces of one material slot from a source mesh.
///
/// Fails when the mesh cannot be expressed as triangles; see
/// [`validate_mesh`].
pub fn collect_faces(mesh: &MeshData, material_index: usize) -> Result<Vec<Face>, SkipReason> {
    validate_mesh(mesh)?;

    let needs_derived = mesh.vertex_normals.len() < mesh.positions.len()
        && mesh
            .polygons
            .iter()
            .any(|p| p.smooth && p.material_index == material_index);
    let derived = if needs_derived {
        derived_vertex_normals(mesh)
    } else {
        Vec::new()
    };

    let mut faces = Vec::new();
    let mut loop_start = 0;
    for polygon in &mesh.polygons {
        let start = loop_start;
        loop_start += polygon.vertices.len();
        if polygon.material_index != material_index {
            continue;
        }

        let points = polygon.vertices.iter().map(|&vi| mesh.positions[vi as usize]);
        let normal = polygon.normal.unwrap_or_else(|| newell_normal(points));

        let face_corners = polygon
            .vertices
            .iter()
            .enumerate()
            .map(|(offset, &vi)| {
                let vi = vi as usize;
                let corner = start + offset;
                let vertex_normal = mesh
                    .vertex_normals
                    .get(vi)
                    .or_else(|| derived.get(vi))
                    .copied()
                    .filter(|n| *n != [0.0, 0.0, 0.0])
                    .unwrap_or(normal);
                Corner {
                    position: mesh.positions[vi],
                    normal: vertex_normal,
                    uv: mesh.uvs.as_ref().map(|uvs| uvs[corner]),
                    color: mesh.colors.as_ref().map(|colors| colors[corner]),
                }
            })
            .collect();

        faces.push(Face {
            corners: face_corners,
            smooth: polygon.smooth,
            normal,
        });
    }
    Ok(faces)
}

/// Area-weighted vertex normals from the mesh's polygons, for meshes that
/// carry no normals of their own. Isolated vertices get a zero normal.
fn derived_vertex_normals(mesh: &MeshData) -> Vec<Vec3> {
    let mut sums = vec![[0.0f64; 3]; mesh.positions.len()];
    for polygon in &mesh.polygons {
        let points = polygon.vertices.iter().map(|&vi| mesh.positions[vi as usize]);
        let area = area_vector(points);
        for &vi in &polygon.vertices {
            for (sum, a) in sums[vi as usize].iter_mut().zip(area) {
                *sum += a;
            }
        }
    }
    sums.into_iter().map(normalize).collect()
}

/// Unnormalized polygon normal via Newell's method; its length is twice the
/// polygon area.
fn area_vector(points: impl Iterator<Item = Vec3> + Clone) -> Vec3 {
    let mut n = [0.0f64; 3];
    let next = points.clone().cycle().skip(1);
    for (p, q) in points.zip(next) {
        n[0] += (p[1] - q[1]) * (p[2] + q[2]);
        n[1] += (p[2] - q[2]) * (p[0] + q[0]);
        n[2] += (p[0] - q[0]) * (p[1] + q[1]);
    }
    n
}

fn normalize(n: Vec3) -> Vec3 {
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > 0.0 {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        n
    }
}

/// Unit normal of a polygon via Newell's method. Degenerate input yields zero.
pub fn newell_normal(points: impl Iterator<Item = Vec3> + Clone) -> Vec3 {
    normalize(area_vector(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Polygon;

    /// Two unit quads sharing an edge along x = 1.
    fn strip(smooth: bool) -> MeshData {
        let mut a = Polygon::new(vec![0, 1, 4, 3]);
        let mut b = Polygon::new(vec![1, 2, 5, 4]);
        a.smooth = smooth;
        b.smooth = smooth;
        MeshData {
            name: "strip".into(),
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [2.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [1.0, 1.0, 0.0],
                [2.0, 1.0, 0.0],
            ],
            vertex_normals: vec![[0.0, 0.0, 1.0]; 6],
            polygons: vec![a, b],
            uvs: None,
            colors: None,
        }
    }

    #[test]
    fn test_smooth_faces_share_vertices() {
        let mesh = strip(true);
        let record = dedupe("strip", &collect_faces(&mesh, 0).unwrap());
        assert!(record.vertex_count() < mesh.corner_count());
        assert_eq!(record.vertex_count(), 6);
        assert_eq!(record.triangle_count(), 4);
        assert!(record.normals.is_some());
    }

    #[test]
    fn test_flat_faces_never_share() {
        let mesh = strip(false);
        let record = dedupe("strip", &collect_faces(&mesh, 0).unwrap());
        assert_eq!(record.vertex_count(), mesh.corner_count());
        assert!(record.normals.is_none());
    }

    #[test]
    fn test_quad_triangulation() {
        let mesh = MeshData {
            name: "quad".into(),
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            polygons: vec![Polygon::new(vec![0, 1, 2, 3]).smooth()],
            ..MeshData::default()
        };
        let record = dedupe("quad", &collect_faces(&mesh, 0).unwrap());
        assert_eq!(record.indices, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_flat_faces_use_face_normal() {
        let mut mesh = strip(false);
        mesh.polygons[1].smooth = true;
        let record = dedupe("mixed", &collect_faces(&mesh, 0).unwrap());
        let normals = record.normals.as_ref().unwrap();
        assert_eq!(normals.len(), record.vertex_count());
        assert!(normals.iter().all(|n| *n == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_uv_seam_splits_vertex() {
        let mut mesh = strip(true);
        mesh.uvs = Some(vec![
            [0.0, 0.0], [0.5, 0.0], [0.5, 1.0], [0.0, 1.0],
            [0.6, 0.0], [1.0, 0.0], [1.0, 1.0], [0.6, 1.0],
        ]);
        let record = dedupe("seam", &collect_faces(&mesh, 0).unwrap());
        assert_eq!(record.vertex_count(), 8);
        assert_eq!(record.uvs.map(|u| u.len()), Some(8));
    }

    #[test]
    fn test_material_slot_filter() {
        let mut mesh = strip(true);
        mesh.polygons[1].material_index = 1;
        assert_eq!(collect_faces(&mesh, 0).unwrap().len(), 1);
        assert_eq!(collect_faces(&mesh, 1).unwrap().len(), 1);
        assert!(collect_faces(&mesh, 2).unwrap().is_empty());
    }

    #[test]
    fn test_ngon_fan() {
        let mesh = MeshData {
            name: "pentagon".into(),
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [1.5, 1.0, 0.0], [0.5, 1.5, 0.0], [-0.5, 1.0, 0.0]],
            polygons: vec![Polygon::new(vec![0, 1, 2, 3, 4])],
            ..MeshData::default()
        };
        let record = dedupe("pentagon", &collect_faces(&mesh, 0).unwrap());
        assert_eq!(record.indices, vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]]);
    }

    #[test]
    fn test_conversion_failures() {
        let mut mesh = strip(true);
        mesh.polygons[0].vertices = vec![0, 1];
        assert!(matches!(collect_faces(&mesh, 0), Err(SkipReason::MeshConversion(_))));

        let mut mesh = strip(true);
        mesh.polygons[0].vertices[0] = 99;
        assert!(collect_faces(&mesh, 0).is_err());

        let mut mesh = strip(true);
        mesh.colors = Some(vec![[1.0, 0.0, 0.0]]);
        assert!(collect_faces(&mesh, 0).is_err());
    }

    #[test]
    fn test_bad_polygon_in_other_slot_fails_every_slot() {
        let mut mesh = strip(true);
        mesh.polygons.push(Polygon::new(vec![0, 1, 99]).with_material(1));
        assert!(matches!(collect_faces(&mesh, 0), Err(SkipReason::MeshConversion(_))));
        assert!(validate_mesh(&mesh).is_err());
    }

    #[test]
    fn test_missing_vertex_normals_are_derived() {
        let mut mesh = strip(true);
        mesh.vertex_normals.clear();
        let record = dedupe("strip", &collect_faces(&mesh, 0).unwrap());
        let normals = record.normals.as_ref().unwrap();
        assert_eq!(normals.len(), 6);
        assert!(normals.iter().all(|n| *n == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_partial_vertex_normals() {
        let mut mesh = strip(true);
        mesh.vertex_normals.truncate(2);
        mesh.vertex_normals[0] = [1.0, 0.0, 0.0];
        let faces = collect_faces(&mesh, 0).unwrap();
        assert_eq!(faces[0].corners[0].normal, [1.0, 0.0, 0.0]);
        assert_eq!(faces[0].corners[2].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_newell_normal() {
        let n = newell_normal(
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]].into_iter(),
        );
        assert_eq!(n, [0.0, 0.0, 1.0]);
    }
}
