//! Language-agnostic element trees produced by the builders.
//!
//! A [`SceneDict`] describes one XML element before serialization: its plugin
//! type, an optional id, and ordered parameters. Parameters holding other
//! dictionaries become child elements.

pub mod naming;
pub mod plugins;

pub use naming::mangle_id;
pub use plugins::{element_kind, is_allowed_param, ElementKind};

use glam::DMat4;

use crate::types::{Color, Vec3};

/// A parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Bool(bool),
    Integer(i64),
    Float(f64),
    Color(Color),
    /// Direction, remapped to Y-up on emission.
    Vector(Vec3),
    /// Position, remapped to Y-up on emission.
    Point(Vec3),
    /// World transform in the source frame, remapped on emission.
    Transform(DMat4),
    Dict(SceneDict),
    /// Unnamed child elements.
    List(Vec<SceneDict>),
}

/// One element to emit.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDict {
    /// Plugin type, e.g. `diffuse`, `serialized` or `ref`.
    pub plugin: String,
    pub id: Option<String>,
    params: Vec<(String, Value)>,
}

impl SceneDict {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            id: None,
            params: Vec::new(),
        }
    }

    /// A reference to an element emitted elsewhere.
    pub fn reference(id: impl Into<String>) -> Self {
        Self::new("ref").with_id(id)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    /// Set a parameter, replacing an existing one in place.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn is_reference(&self) -> bool {
        self.plugin == "ref"
    }
}

impl From<SceneDict> for Value {
    fn from(dict: SceneDict) -> Self {
        Value::Dict(dict)
    }
}
