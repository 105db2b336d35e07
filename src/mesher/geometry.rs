//! Triangle mesh records written to the serialized container.

use crate::error::{ExportError, Result};
use crate::types::{Color, Vec3};

/// A vertex of an exported mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Option<Vec3>,
    pub uv: Option<[f64; 2]>,
    pub color: Option<Color>,
}

impl Vertex {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            normal: None,
            uv: None,
            color: None,
        }
    }

    pub fn with_normal(mut self, normal: Vec3) -> Self {
        self.normal = Some(normal);
        self
    }

    pub fn with_uv(mut self, uv: [f64; 2]) -> Self {
        self.uv = Some(uv);
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }
}

/// One triangulated surface piece, stored as structure-of-arrays.
///
/// Optional attribute arrays are either empty or exactly `vertex_count` long.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshRecord {
    /// Stable identifier written into the record header.
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub uvs: Option<Vec<[f64; 2]>>,
    pub vertex_colors: Option<Vec<Color>>,
    pub indices: Vec<[u32; 3]>,
}

impl MeshRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a vertex and return its index.
    ///
    /// The first vertex decides which optional attributes the record carries.
    pub fn add_vertex(&mut self, vertex: Vertex) -> u32 {
        let index = self.positions.len() as u32;
        if index == 0 {
            self.normals = vertex.normal.map(|_| Vec::new());
            self.uvs = vertex.uv.map(|_| Vec::new());
            self.vertex_colors = vertex.color.map(|_| Vec::new());
        }
        self.positions.push(vertex.position);
        if let Some(normals) = &mut self.normals {
            normals.push(vertex.normal.unwrap_or([0.0, 0.0, 0.0]));
        }
        if let Some(uvs) = &mut self.uvs {
            uvs.push(vertex.uv.unwrap_or([0.0, 0.0]));
        }
        if let Some(colors) = &mut self.vertex_colors {
            colors.push(vertex.color.unwrap_or([0.0, 0.0, 0.0]));
        }
        index
    }

    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push([i0, i1, i2]);
    }

    /// Add a quad as triangles (0, 1, 2) and (0, 2, 3).
    pub fn add_quad(&mut self, i0: u32, i1: u32, i2: u32, i3: u32) {
        self.add_triangle(i0, i1, i2);
        self.add_triangle(i0, i2, i3);
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Check the record invariants before serialization.
    pub fn validate(&self) -> Result<()> {
        let n = self.positions.len();
        let check = |len: Option<usize>, what: &str| match len {
            Some(len) if len != n => Err(ExportError::InvalidRecord(format!(
                "'{}': {} {} for {} vertices",
                self.name, len, what, n
            ))),
            _ => Ok(()),
        };
        check(self.normals.as_ref().map(Vec::len), "normals")?;
        check(self.uvs.as_ref().map(Vec::len), "uvs")?;
        check(self.vertex_colors.as_ref().map(Vec::len), "colors")?;

        if let Some(bad) = self.indices.iter().flatten().find(|&&i| i as usize >= n) {
            return Err(ExportError::InvalidRecord(format!(
                "'{}': index {} out of range for {} vertices",
                self.name, bad, n
            )));
        }
        if self.name.contains('\0') {
            return Err(ExportError::InvalidRecord(format!(
                "'{}': name contains NUL",
                self.name.replace('\0', "\\0")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creation() {
        let mut mesh = MeshRecord::new("tri");
        let v0 = mesh.add_vertex(Vertex::new([0.0, 0.0, 0.0]));
        let v1 = mesh.add_vertex(Vertex::new([1.0, 0.0, 0.0]));
        let v2 = mesh.add_vertex(Vertex::new([0.0, 1.0, 0.0]));
        mesh.add_triangle(v0, v1, v2);

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert!(mesh.normals.is_none());
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_record_quad() {
        let mut mesh = MeshRecord::new("quad");
        for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]] {
            mesh.add_vertex(Vertex::new(p).with_normal([0.0, 0.0, 1.0]));
        }
        mesh.add_quad(0, 1, 2, 3);

        assert_eq!(mesh.indices, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(mesh.normals.as_ref().map(Vec::len), Some(4));
    }

    #[test]
    fn test_validate_rejects_bad_index() {
        let mut mesh = MeshRecord::new("bad");
        mesh.add_vertex(Vertex::new([0.0, 0.0, 0.0]));
        mesh.add_triangle(0, 0, 5);
        assert!(matches!(mesh.validate(), Err(ExportError::InvalidRecord(_))));
    }

    #[test]
    fn test_validate_rejects_short_layer() {
        let mut mesh = MeshRecord::new("short");
        mesh.add_vertex(Vertex::new([0.0, 0.0, 0.0]).with_uv([0.0, 0.0]));
        mesh.uvs = Some(Vec::new());
        assert!(mesh.validate().is_err());
    }
}
