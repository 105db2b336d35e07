//! Shapegroup eligibility.
//!
//! A (mesh, material slot) pair is shared through a `shapegroup` when the
//! geometry is placed more than once and nothing about the shape depends on
//! the object it is attached to.

use std::collections::{HashMap, HashSet};

use crate::scene::{ParamValue, PluginSpec, SceneIndex, SceneModel, SceneObject};

/// Session-scoped instancing decisions with a material safety cache.
#[derive(Debug)]
pub struct InstancingPolicy {
    enabled: bool,
    safety: HashMap<String, bool>,
}

impl InstancingPolicy {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            safety: HashMap::new(),
        }
    }

    /// Whether one material slot of a mesh object should go through a shapegroup.
    pub fn should_instance<S: SceneModel + ?Sized>(
        &mut self,
        scene: &S,
        index: &SceneIndex<'_>,
        object: &SceneObject,
        slot: usize,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(mesh) = object.mesh_name() else {
            return false;
        };
        if let Some(Some(material)) = object.material_slots.get(slot) {
            if !self.is_material_safe(scene, material) {
                return false;
            }
        }
        if index.mesh_users(mesh) <= 1 && !index.is_dupli_source(&object.name) {
            return false;
        }
        object.modifiers.iter().all(|m| m.is_non_deforming())
    }

    /// A material is unsafe to share when it, or any material it references,
    /// has subsurface scattering, an attached medium or emission.
    pub fn is_material_safe<S: SceneModel + ?Sized>(&mut self, scene: &S, name: &str) -> bool {
        if let Some(&safe) = self.safety.get(name) {
            return safe;
        }
        let mut visiting = HashSet::new();
        let safe = self.check_material(scene, name, &mut visiting);
        self.safety.insert(name.to_string(), safe);
        safe
    }

    fn check_material<S: SceneModel + ?Sized>(
        &mut self,
        scene: &S,
        name: &str,
        visiting: &mut HashSet<String>,
    ) -> bool {
        if let Some(&safe) = self.safety.get(name) {
            return safe;
        }
        // Missing materials are reported by the builder; the shape is then
        // written without one.
        let Some(material) = scene.material(name) else {
            return true;
        };
        // Cycles fail the export elsewhere.
        if !visiting.insert(name.to_string()) {
            return false;
        }

        let mut safe = material.subsurface.is_none()
            && material.interior_medium.is_none()
            && material.emission.is_none();
        if safe {
            let mut refs = Vec::new();
            collect_refs(&material.bsdf, &mut refs, &mut safe);
            for child in refs {
                if !self.check_material(scene, &child, visiting) {
                    safe = false;
                    break;
                }
            }
        }

        visiting.remove(name);
        self.safety.insert(name.to_string(), safe);
        safe
    }
}

/// Referenced material names in a plugin tree; media mark it unsafe.
fn collect_refs(spec: &PluginSpec, refs: &mut Vec<String>, safe: &mut bool) {
    for (_, value) in &spec.params {
        match value {
            ParamValue::Material(name) => refs.push(name.clone()),
            ParamValue::Medium(_) => *safe = false,
            ParamValue::Nested(child) => collect_refs(child, refs, safe),
            _ => {}
        }
    }
}
