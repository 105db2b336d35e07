//! Read-only scene model consumed by the exporter.
//!
//! The exporter never talks to the host application directly; it reads
//! everything through [`SceneModel`]. [`Scene`] is an in-memory implementation
//! that can be loaded from JSON.

pub mod entities;
pub mod index;
pub mod object;

pub use entities::{
    Camera, Emission, Lamp, LampKind, Material, Medium, ParamValue, PluginSpec, Projection,
    RenderSettings, Texture,
};
pub use index::SceneIndex;
pub use object::{
    DupliInstance, DupliRenderType, Duplicator, MeshData, ModifierKind, ObjectData, Polygon,
    SceneObject,
};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Source of scene data for one export pass.
pub trait SceneModel {
    /// Render settings and output resolution.
    fn settings(&self) -> &RenderSettings;

    /// Objects in scene-list order.
    fn objects(&self) -> &[SceneObject];

    /// Name of the camera object to render from.
    fn active_camera(&self) -> Option<&str>;

    fn mesh(&self, name: &str) -> Option<&MeshData>;

    fn material(&self, name: &str) -> Option<&Material>;

    fn texture(&self, name: &str) -> Option<&Texture>;

    fn medium(&self, name: &str) -> Option<&Medium>;

    /// Output image size.
    fn resolution(&self) -> (u32, u32) {
        let [w, h] = self.settings().resolution;
        (w, h)
    }
}

/// An in-memory scene.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub settings: RenderSettings,
    #[serde(default)]
    pub active_camera: Option<String>,
    #[serde(default)]
    pub objects: Vec<SceneObject>,
    #[serde(default)]
    pub meshes: Vec<MeshData>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub textures: Vec<Texture>,
    #[serde(default)]
    pub media: Vec<Medium>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a scene from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a scene from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn add_object(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    pub fn add_mesh(&mut self, mesh: MeshData) {
        self.meshes.push(mesh);
    }

    pub fn add_material(&mut self, material: Material) {
        self.materials.push(material);
    }

    pub fn add_texture(&mut self, texture: Texture) {
        self.textures.push(texture);
    }

    pub fn add_medium(&mut self, medium: Medium) {
        self.media.push(medium);
    }

    /// Names that appear more than once within one entity kind.
    pub fn duplicate_names(&self) -> Vec<String> {
        fn dups<'a>(names: impl Iterator<Item = &'a str>, out: &mut Vec<String>) {
            let mut seen = HashSet::new();
            for name in names {
                if !seen.insert(name) && !out.iter().any(|n| n == name) {
                    out.push(name.to_string());
                }
            }
        }
        let mut out = Vec::new();
        dups(self.objects.iter().map(|o| o.name.as_str()), &mut out);
        dups(self.meshes.iter().map(|m| m.name.as_str()), &mut out);
        dups(self.materials.iter().map(|m| m.name.as_str()), &mut out);
        dups(self.textures.iter().map(|t| t.name.as_str()), &mut out);
        dups(self.media.iter().map(|m| m.name.as_str()), &mut out);
        out
    }
}

impl SceneModel for Scene {
    fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    fn active_camera(&self) -> Option<&str> {
        self.active_camera.as_deref()
    }

    fn mesh(&self, name: &str) -> Option<&MeshData> {
        self.meshes.iter().find(|m| m.name == name)
    }

    fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }

    fn texture(&self, name: &str) -> Option<&Texture> {
        self.textures.iter().find(|t| t.name == name)
    }

    fn medium(&self, name: &str) -> Option<&Medium> {
        self.media.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_from_json() {
        let scene = Scene::from_json(
            r#"{
                "settings": {"resolution": [640, 480]},
                "objects": [{"name": "Cube", "data": {"type": "mesh", "mesh": "CubeMesh"}}],
                "meshes": [{"name": "CubeMesh", "positions": [], "polygons": []}]
            }"#,
        )
        .unwrap();
        assert_eq!(scene.resolution(), (640, 480));
        assert!(scene.mesh("CubeMesh").is_some());
        assert_eq!(scene.settings.integrator.plugin, "path");
    }

    #[test]
    fn test_duplicate_names() {
        let mut scene = Scene::new();
        scene.add_material(Material::new("M", PluginSpec::new("diffuse")));
        scene.add_material(Material::new("M", PluginSpec::new("diffuse")));
        assert_eq!(scene.duplicate_names(), vec!["M".to_string()]);
    }
}
