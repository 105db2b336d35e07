//! Scene objects and their polygon geometry.

use serde::{Deserialize, Serialize};

use super::entities::{Camera, Lamp};
use crate::types::{Color, MatrixRows, Vec3, IDENTITY_ROWS};

/// One polygon of a source mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    /// Indices into [`MeshData::positions`], one per corner.
    pub vertices: Vec<u32>,
    /// Interpolate vertex normals across this face.
    #[serde(default)]
    pub smooth: bool,
    /// Material slot index on the owning object.
    #[serde(default)]
    pub material_index: usize,
    /// Face normal; computed from the corners when absent.
    #[serde(default)]
    pub normal: Option<Vec3>,
}

impl Polygon {
    pub fn new(vertices: Vec<u32>) -> Self {
        Self {
            vertices,
            smooth: false,
            material_index: 0,
            normal: None,
        }
    }

    pub fn smooth(mut self) -> Self {
        self.smooth = true;
        self
    }

    pub fn with_material(mut self, index: usize) -> Self {
        self.material_index = index;
        self
    }
}

/// Geometry data block, shareable between objects.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<Vec3>,
    /// Per-vertex normals, used by smooth faces.
    #[serde(default)]
    pub vertex_normals: Vec<Vec3>,
    pub polygons: Vec<Polygon>,
    /// Per-corner UVs, flattened in polygon order.
    #[serde(default)]
    pub uvs: Option<Vec<[f64; 2]>>,
    /// Per-corner colors, flattened in polygon order.
    #[serde(default)]
    pub colors: Option<Vec<Color>>,
}

impl MeshData {
    /// Total number of polygon corners.
    pub fn corner_count(&self) -> usize {
        self.polygons.iter().map(|p| p.vertices.len()).sum()
    }
}

/// Object-level modifier types that matter for instancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    Collision,
    ParticleInstance,
    ParticleSystem,
    Smoke,
    Armature,
    Subdivision,
    Displace,
    Mirror,
    Array,
    Other,
}

impl ModifierKind {
    /// Modifiers that leave the shared geometry untouched.
    pub fn is_non_deforming(self) -> bool {
        matches!(
            self,
            ModifierKind::Collision
                | ModifierKind::ParticleInstance
                | ModifierKind::ParticleSystem
                | ModifierKind::Smoke
        )
    }
}

/// How a duplicator places copies of other objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DupliRenderType {
    Object,
    Group,
    Verts,
    Faces,
    Path,
    Halo,
    Billboard,
}

impl DupliRenderType {
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            DupliRenderType::Object
                | DupliRenderType::Group
                | DupliRenderType::Verts
                | DupliRenderType::Faces
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DupliRenderType::Object => "object",
            DupliRenderType::Group => "group",
            DupliRenderType::Verts => "verts",
            DupliRenderType::Faces => "faces",
            DupliRenderType::Path => "path",
            DupliRenderType::Halo => "halo",
            DupliRenderType::Billboard => "billboard",
        }
    }
}

/// One copy generated by a duplicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DupliInstance {
    /// Name of the duplicated object.
    pub object: String,
    /// World matrix of this copy, row-major.
    pub matrix_world: MatrixRows,
}

/// Particle system or dupli-group attached to an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Duplicator {
    pub render_type: DupliRenderType,
    pub instances: Vec<DupliInstance>,
}

/// What kind of data an object carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectData {
    Mesh { mesh: String },
    Lamp(Lamp),
    Camera(Camera),
    Empty,
}

/// A renderable object in scene-list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub data: ObjectData,
    #[serde(default = "default_matrix")]
    pub matrix_world: MatrixRows,
    #[serde(default)]
    pub hide_render: bool,
    /// Material names per slot; `None` marks an empty slot.
    #[serde(default)]
    pub material_slots: Vec<Option<String>>,
    #[serde(default)]
    pub modifiers: Vec<ModifierKind>,
    #[serde(default)]
    pub duplicator: Option<Duplicator>,
}

fn default_matrix() -> MatrixRows {
    IDENTITY_ROWS
}

impl SceneObject {
    /// A mesh object at the identity transform.
    pub fn mesh(name: impl Into<String>, mesh: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: ObjectData::Mesh { mesh: mesh.into() },
            matrix_world: IDENTITY_ROWS,
            hide_render: false,
            material_slots: Vec::new(),
            modifiers: Vec::new(),
            duplicator: None,
        }
    }

    pub fn with_matrix(mut self, matrix_world: MatrixRows) -> Self {
        self.matrix_world = matrix_world;
        self
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material_slots.push(Some(material.into()));
        self
    }

    /// Name of the mesh data block, if this is a mesh object.
    pub fn mesh_name(&self) -> Option<&str> {
        match &self.data {
            ObjectData::Mesh { mesh } => Some(mesh),
            _ => None,
        }
    }
}
