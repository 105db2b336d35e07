//! Scene entities to [`SceneDict`] conversion.
//!
//! Builders resolve references depth-first: building a material first builds
//! every texture, material and medium it points at. Each source entity is built
//! at most once per session; finished dependencies queue up in
//! [`BuildContext::take_pending`] in the order they must be emitted.

pub mod camera;
pub mod lamp;
pub mod material;

pub use camera::build_camera;
pub use lamp::build_lamp;
pub use material::{build_material, build_medium, build_subsurface, build_texture};

use std::collections::HashMap;
use std::fmt;

use crate::dict::{element_kind, mangle_id, SceneDict, Value};
use crate::error::{EntityError, EntityResult, ExportError, SkipReason};
use crate::scene::{ParamValue, PluginSpec, SceneModel};
use crate::xml::OutputTarget;

/// Identity of a source entity, independent of its output id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKey {
    Material(String),
    Subsurface(String),
    Texture(String),
    Medium(String),
    Camera(String),
    Lamp(String),
    Mesh(String),
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, name) = match self {
            SourceKey::Material(n) => ("material", n),
            SourceKey::Subsurface(n) => ("subsurface", n),
            SourceKey::Texture(n) => ("texture", n),
            SourceKey::Medium(n) => ("medium", n),
            SourceKey::Camera(n) => ("camera", n),
            SourceKey::Lamp(n) => ("lamp", n),
            SourceKey::Mesh(n) => ("mesh", n),
        };
        write!(f, "{} '{}'", kind, name)
    }
}

impl SourceKey {
    /// Suffix appended to the mangled name to form the output id.
    fn id_suffix(&self) -> &'static str {
        match self {
            SourceKey::Material(_) => "-material",
            SourceKey::Subsurface(_) => "-subsurface",
            SourceKey::Texture(_) => "-texture",
            SourceKey::Medium(_) => "-medium",
            SourceKey::Camera(_) => "-camera",
            SourceKey::Lamp(_) => "-lamp",
            SourceKey::Mesh(_) => "-mesh",
        }
    }

    fn name(&self) -> &str {
        match self {
            SourceKey::Material(n)
            | SourceKey::Subsurface(n)
            | SourceKey::Texture(n)
            | SourceKey::Medium(n)
            | SourceKey::Camera(n)
            | SourceKey::Lamp(n)
            | SourceKey::Mesh(n) => n,
        }
    }
}

/// Session-scoped builder state.
pub struct BuildContext<'s, S: SceneModel + ?Sized> {
    scene: &'s S,
    ids: HashMap<String, SourceKey>,
    built: HashMap<SourceKey, String>,
    failed: HashMap<SourceKey, SkipReason>,
    stack: Vec<SourceKey>,
    pending: Vec<(SceneDict, OutputTarget)>,
}

impl<'s, S: SceneModel + ?Sized> BuildContext<'s, S> {
    pub fn new(scene: &'s S) -> Self {
        Self {
            scene,
            ids: HashMap::new(),
            built: HashMap::new(),
            failed: HashMap::new(),
            stack: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn scene(&self) -> &'s S {
        self.scene
    }

    /// Output id for a source entity. Two entities mangling to the same id
    /// is an error.
    pub fn id_for(&mut self, key: &SourceKey) -> Result<String, ExportError> {
        self.id_with_suffix(key, key.id_suffix())
    }

    /// Like [`id_for`](Self::id_for) with a custom suffix.
    pub fn id_with_suffix(&mut self, key: &SourceKey, suffix: &str) -> Result<String, ExportError> {
        let id = format!("{}{}", mangle_id(key.name()), suffix);
        match self.ids.get(&id) {
            Some(owner) if owner != key => Err(ExportError::IdCollision {
                id,
                first: owner.to_string(),
                second: key.to_string(),
            }),
            Some(_) => Ok(id),
            None => {
                self.ids.insert(id.clone(), key.clone());
                Ok(id)
            }
        }
    }

    /// Dependencies built since the last call, leaves first.
    pub fn take_pending(&mut self) -> Vec<(SceneDict, OutputTarget)> {
        std::mem::take(&mut self.pending)
    }

    /// Build an entity once; returns its id.
    ///
    /// The dictionary is queued for emission. An entity whose plugin type is
    /// unknown is skipped, and a skipped entity stays skipped for the rest of
    /// the session.
    pub fn resolve<F>(&mut self, key: SourceKey, target: OutputTarget, build: F) -> EntityResult<String>
    where
        F: FnOnce(&mut Self) -> EntityResult<SceneDict>,
    {
        if let Some(id) = self.built.get(&key) {
            return Ok(id.clone());
        }
        if let Some(reason) = self.failed.get(&key) {
            return Err(EntityError::Skip(reason.clone()));
        }
        if let Some(start) = self.stack.iter().position(|k| *k == key) {
            let mut chain: Vec<String> = self.stack[start..].iter().map(|k| k.to_string()).collect();
            chain.push(key.to_string());
            return Err(ExportError::ReferenceCycle { chain }.into());
        }

        let id = self.id_for(&key)?;
        self.stack.push(key.clone());
        let result = build(self).and_then(|dict| match element_kind(&dict.plugin) {
            Some(_) => Ok(dict),
            // A ref to a definition that is never written would fail the session.
            None => Err(SkipReason::UnknownPlugin(dict.plugin.clone()).into()),
        });
        self.stack.pop();

        match result {
            Ok(dict) => {
                self.built.insert(key, id.clone());
                self.pending.push((dict.with_id(id.clone()), target));
                Ok(id)
            }
            Err(EntityError::Skip(reason)) => {
                log::warn!("Skipping {}: {}", key, reason);
                self.failed.insert(key, reason.clone());
                Err(EntityError::Skip(reason))
            }
            Err(fatal) => Err(fatal),
        }
    }

    pub fn require_material(&mut self, name: &str) -> EntityResult<String> {
        let scene = self.scene;
        let material = scene.material(name).ok_or_else(|| missing("material", name))?;
        self.resolve(
            SourceKey::Material(name.to_string()),
            OutputTarget::Materials,
            |ctx| build_material(ctx, material),
        )
    }

    pub fn require_texture(&mut self, name: &str) -> EntityResult<String> {
        let scene = self.scene;
        let texture = scene.texture(name).ok_or_else(|| missing("texture", name))?;
        self.resolve(
            SourceKey::Texture(name.to_string()),
            OutputTarget::Materials,
            |ctx| build_texture(ctx, texture),
        )
    }

    pub fn require_medium(&mut self, name: &str) -> EntityResult<String> {
        let scene = self.scene;
        let medium = scene.medium(name).ok_or_else(|| missing("medium", name))?;
        self.resolve(
            SourceKey::Medium(name.to_string()),
            OutputTarget::Volumes,
            |ctx| build_medium(ctx, medium),
        )
    }

    /// Subsurface integrator of a material, if it has one.
    pub fn require_subsurface(&mut self, material: &str) -> EntityResult<Option<String>> {
        let scene = self.scene;
        let material = scene
            .material(material)
            .ok_or_else(|| missing("material", material))?;
        let Some(spec) = &material.subsurface else {
            return Ok(None);
        };
        let id = self.resolve(
            SourceKey::Subsurface(material.name.clone()),
            OutputTarget::Materials,
            |ctx| build_subsurface(ctx, spec),
        )?;
        Ok(Some(id))
    }

    /// Convert a typed parameter, building whatever it references.
    pub fn param_value(&mut self, value: &ParamValue) -> EntityResult<Value> {
        Ok(match value {
            ParamValue::Float(f) => Value::Float(*f),
            ParamValue::Integer(i) => Value::Integer(*i),
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::String(s) => Value::String(s.clone()),
            ParamValue::Color(c) => Value::Color(*c),
            ParamValue::Texture(name) => SceneDict::reference(self.require_texture(name)?).into(),
            ParamValue::Material(name) => SceneDict::reference(self.require_material(name)?).into(),
            ParamValue::Medium(name) => SceneDict::reference(self.require_medium(name)?).into(),
            ParamValue::Nested(spec) => self.plugin_dict(spec)?.into(),
        })
    }

    /// An id-less dictionary for a plugin spec.
    pub fn plugin_dict(&mut self, spec: &PluginSpec) -> EntityResult<SceneDict> {
        let mut dict = SceneDict::new(spec.plugin.clone());
        for (name, value) in &spec.params {
            let value = self.param_value(value)?;
            dict.set(name.clone(), value);
        }
        Ok(dict)
    }
}

fn missing(kind: &'static str, name: &str) -> EntityError {
    EntityError::Skip(SkipReason::MissingEntity {
        kind,
        name: name.to_string(),
    })
}
