//! Material, texture, medium, lamp and camera definitions.

use serde::{Deserialize, Serialize};

use crate::types::Color;

/// A typed parameter value attached to a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Float(f64),
    Integer(i64),
    Bool(bool),
    String(String),
    Color(Color),
    /// Reference to a [`Texture`] by name.
    Texture(String),
    /// Reference to a [`Material`] by name (blend/mixture/twosided wrappers).
    Material(String),
    /// Reference to a [`Medium`] by name.
    Medium(String),
    /// Inline child plugin (phase function, volume grid, filter).
    Nested(PluginSpec),
}

/// A plugin name plus its ordered parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub plugin: String,
    #[serde(default)]
    pub params: Vec<(String, ParamValue)>,
}

impl PluginSpec {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.params.push((name.into(), value));
        self
    }
}

/// Surface emission attached to a material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emission {
    pub color: Color,
    #[serde(default = "default_one")]
    pub intensity: f64,
}

fn default_one() -> f64 {
    1.0
}

/// A surface material: one BSDF plus object-dependent extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub bsdf: PluginSpec,
    /// Subsurface scattering integrator (e.g. `dipole`).
    #[serde(default)]
    pub subsurface: Option<PluginSpec>,
    /// Participating medium inside closed surfaces.
    #[serde(default)]
    pub interior_medium: Option<String>,
    #[serde(default)]
    pub emission: Option<Emission>,
}

impl Material {
    pub fn new(name: impl Into<String>, bsdf: PluginSpec) -> Self {
        Self {
            name: name.into(),
            bsdf,
            subsurface: None,
            interior_medium: None,
            emission: None,
        }
    }

    /// Names of materials this one references directly.
    pub fn material_refs(&self) -> impl Iterator<Item = &str> {
        self.bsdf.params.iter().filter_map(|(_, value)| match value {
            ParamValue::Material(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// A texture plugin, possibly referencing other textures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    pub name: String,
    pub spec: PluginSpec,
}

/// A participating medium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medium {
    pub name: String,
    pub spec: PluginSpec,
    #[serde(default)]
    pub phase: Option<PluginSpec>,
}

/// Light source parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LampKind {
    Point,
    Spot {
        /// Full cone angle in degrees.
        spot_size: f64,
        /// Soft edge fraction in `[0, 1]`.
        #[serde(default)]
        spot_blend: f64,
    },
    Sun,
    Area {
        size_x: f64,
        size_y: f64,
    },
    Hemi {
        /// Optional environment map filename.
        #[serde(default)]
        envmap: Option<String>,
    },
}

/// A light source object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lamp {
    pub name: String,
    pub kind: LampKind,
    #[serde(default = "default_white")]
    pub color: Color,
    #[serde(default = "default_one")]
    pub intensity: f64,
    #[serde(default)]
    pub exterior_medium: Option<String>,
}

fn default_white() -> Color {
    [1.0, 1.0, 1.0]
}

/// Camera projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Projection {
    /// Horizontal field of view in degrees.
    Perspective { fov: f64 },
    /// Orthographic half-extent.
    Orthographic { scale: f64 },
}

/// A camera object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub name: String,
    pub projection: Projection,
    #[serde(default = "default_near")]
    pub near_clip: f64,
    #[serde(default = "default_far")]
    pub far_clip: f64,
    #[serde(default)]
    pub exterior_medium: Option<String>,
}

fn default_near() -> f64 {
    0.1
}

fn default_far() -> f64 {
    100.0
}

/// Integrator, sampler, film and output size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub resolution: [u32; 2],
    #[serde(default = "default_integrator")]
    pub integrator: PluginSpec,
    #[serde(default = "default_sampler")]
    pub sampler: PluginSpec,
    #[serde(default = "default_film")]
    pub film: PluginSpec,
    #[serde(default = "default_rfilter")]
    pub rfilter: PluginSpec,
}

fn default_integrator() -> PluginSpec {
    PluginSpec::new("path").with_param("maxDepth", ParamValue::Integer(-1))
}

fn default_sampler() -> PluginSpec {
    PluginSpec::new("independent").with_param("sampleCount", ParamValue::Integer(16))
}

fn default_film() -> PluginSpec {
    PluginSpec::new("hdrfilm")
}

fn default_rfilter() -> PluginSpec {
    PluginSpec::new("gaussian")
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution: [1920, 1080],
            integrator: default_integrator(),
            sampler: default_sampler(),
            film: default_film(),
            rfilter: default_rfilter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_value_json_shape() {
        let value: ParamValue = serde_json::from_str(r#"{"texture": "wood"}"#).unwrap();
        assert_eq!(value, ParamValue::Texture("wood".into()));
    }

    #[test]
    fn test_material_refs() {
        let mat = Material::new(
            "mix",
            PluginSpec::new("blendbsdf")
                .with_param("weight", ParamValue::Float(0.5))
                .with_param("a", ParamValue::Material("A".into()))
                .with_param("b", ParamValue::Material("B".into())),
        );
        assert_eq!(mat.material_refs().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_lamp_defaults() {
        let lamp: Lamp = serde_json::from_str(r#"{"name": "key", "kind": {"type": "point"}}"#).unwrap();
        assert_eq!(lamp.color, [1.0, 1.0, 1.0]);
        assert_eq!(lamp.intensity, 1.0);
    }
}
