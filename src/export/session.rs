//! One export pass over a scene.
//!
//! The session owns every piece of per-export state: the id registry (inside
//! the engine), the builder caches, the instancing cache and the serialized
//! container. Nothing outlives it.

use std::collections::HashMap;
use std::io::Write;

use glam::DMat4;

use super::engine::{Emission, EngineStats, ExportEngine};
use super::instancing::InstancingPolicy;
use super::{ExportConfig, SkippedEntity};
use crate::builder::{build_camera, build_lamp, BuildContext, SourceKey};
use crate::dict::{mangle_id, SceneDict, Value};
use crate::error::{EntityError, EntityResult, Result, SkipReason};
use crate::mesher::{build_record, used_slots, validate_mesh};
use crate::scene::{Camera, Duplicator, MeshData, ObjectData, SceneIndex, SceneModel, SceneObject};
use crate::serialized::SerializedWriter;
use crate::types::{is_invertible, matrix_from_rows, scale_color};
use crate::xml::{OutputTarget, XmlOutputs};

/// Which serialized record a shape reads from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RecordKey {
    /// Shared by every object using the mesh.
    Mesh(String, usize),
    /// Object with deforming modifiers gets its own copy.
    Object(String, usize),
}

/// Shape counters for the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShapeCounts {
    pub records: usize,
    pub shapegroups: usize,
    pub instances: usize,
    pub inline_shapes: usize,
}

/// Everything a finished session produced.
pub struct SessionOutput<W, B> {
    pub xml: Vec<(OutputTarget, W)>,
    pub serialized: B,
    pub counts: ShapeCounts,
    pub skipped: Vec<SkippedEntity>,
    pub stats: EngineStats,
}

/// Export state for one scene.
pub struct ExportSession<'s, S: SceneModel + ?Sized, W: Write, B: Write> {
    scene: &'s S,
    index: SceneIndex<'s>,
    engine: ExportEngine<W>,
    serialized: SerializedWriter<B>,
    serialized_name: String,
    includes: Vec<String>,
    ctx: BuildContext<'s, S>,
    policy: InstancingPolicy,
    records: HashMap<RecordKey, Option<usize>>,
    groups: HashMap<String, SceneDict>,
    counts: ShapeCounts,
    skipped: Vec<SkippedEntity>,
}

impl<'s, S: SceneModel + ?Sized, W: Write, B: Write> ExportSession<'s, S, W, B> {
    /// `serialized_name` is the container filename as referenced from the XML;
    /// `includes` are the split files the main file pulls in.
    pub fn new(
        scene: &'s S,
        config: &ExportConfig,
        outputs: XmlOutputs<W>,
        serialized: B,
        serialized_name: impl Into<String>,
        includes: Vec<String>,
    ) -> Self {
        Self {
            scene,
            index: SceneIndex::new(scene.objects()),
            engine: ExportEngine::new(outputs, config.scene_version.clone()),
            serialized: SerializedWriter::with_options(
                serialized,
                config.compression_level,
                config.encoding,
            ),
            serialized_name: serialized_name.into(),
            includes,
            ctx: BuildContext::new(scene),
            policy: InstancingPolicy::new(config.instancing),
            records: HashMap::new(),
            groups: HashMap::new(),
            counts: ShapeCounts::default(),
            skipped: Vec::new(),
        }
    }

    /// Export the whole scene. Partial output is flushed on failure.
    pub fn run(mut self) -> Result<SessionOutput<W, B>> {
        if let Err(err) = self.export_scene() {
            self.engine.abort();
            if let Err(flush) = self.serialized.finish() {
                log::warn!("failed to flush serialized output: {}", flush);
            }
            return Err(err);
        }

        self.counts.records = self.serialized.record_count();
        let stats = self.engine.stats().clone();
        let xml = self.engine.finish();
        let serialized = self.serialized.finish();
        Ok(SessionOutput {
            xml: xml?,
            serialized: serialized?,
            counts: self.counts,
            skipped: self.skipped,
            stats,
        })
    }

    fn export_scene(&mut self) -> Result<()> {
        let scene = self.scene;
        let includes = std::mem::take(&mut self.includes);
        self.engine.begin(&includes)?;
        self.engine.comment(
            OutputTarget::Main,
            concat!("Exported by mitsuba-export ", env!("CARGO_PKG_VERSION")),
        )?;

        let result = self.export_integrator();
        self.settle("integrator", result)?;

        self.export_camera()?;

        for object in scene.objects() {
            if object.hide_render {
                continue;
            }
            if let ObjectData::Lamp(lamp) = &object.data {
                let world = matrix_from_rows(&object.matrix_world);
                let result = build_lamp(&mut self.ctx, &object.name, lamp, world)
                    .and_then(|dict| self.emit_entity(&object.name, &dict, OutputTarget::Main));
                self.settle(&object.name, result)?;
            }
        }

        for object in scene.objects() {
            if !object.hide_render && object.mesh_name().is_some() {
                let world = matrix_from_rows(&object.matrix_world);
                let result = self.export_placement(object, world);
                self.settle(&object.name, result)?;
            }
            if let Some(duplicator) = &object.duplicator {
                self.export_duplis(object, duplicator)?;
            }
        }
        Ok(())
    }

    /// Turn an entity outcome into a logged skip or a session error.
    fn settle(&mut self, entity: &str, result: EntityResult<()>) -> Result<()> {
        self.flush_pending()?;
        match result {
            Ok(()) => Ok(()),
            Err(EntityError::Skip(reason)) => {
                log::warn!("Skipping '{}': {}", entity, reason);
                self.skipped.push(SkippedEntity {
                    entity: entity.to_string(),
                    reason,
                });
                Ok(())
            }
            Err(EntityError::Fatal(err)) => Err(err),
        }
    }

    /// Emit dependencies the builders have queued.
    fn flush_pending(&mut self) -> Result<()> {
        for (dict, target) in self.ctx.take_pending() {
            let entity = dict.id.clone().unwrap_or_else(|| dict.plugin.clone());
            self.emit(&entity, &dict, target)?;
        }
        Ok(())
    }

    fn emit(&mut self, entity: &str, dict: &SceneDict, target: OutputTarget) -> Result<()> {
        if self.engine.emit(dict, target)? == Emission::Skipped {
            self.skipped.push(SkippedEntity {
                entity: entity.to_string(),
                reason: SkipReason::UnknownPlugin(dict.plugin.clone()),
            });
        }
        Ok(())
    }

    /// Emit an entity after everything it depends on.
    fn emit_entity(&mut self, entity: &str, dict: &SceneDict, target: OutputTarget) -> EntityResult<()> {
        self.flush_pending()?;
        self.emit(entity, dict, target)?;
        Ok(())
    }

    fn export_integrator(&mut self) -> EntityResult<()> {
        let integrator = self.ctx.plugin_dict(&self.scene.settings().integrator)?;
        self.emit_entity("integrator", &integrator, OutputTarget::Main)
    }

    fn export_camera(&mut self) -> Result<()> {
        let scene = self.scene;
        let camera_of = |object: &'s SceneObject| match &object.data {
            ObjectData::Camera(camera) => Some((object, camera)),
            _ => None,
        };

        let found: Option<(&'s SceneObject, &'s Camera)> = match scene.active_camera() {
            Some(name) => {
                let found = self.index.object(name).and_then(camera_of);
                if found.is_none() {
                    let reason = SkipReason::MissingEntity {
                        kind: "camera",
                        name: name.to_string(),
                    };
                    return self.settle(name, Err(reason.into()));
                }
                found
            }
            None => scene.objects().iter().find_map(camera_of),
        };

        let Some((object, camera)) = found else {
            log::warn!("Scene has no camera; no sensor written");
            return Ok(());
        };
        let world = matrix_from_rows(&object.matrix_world);
        let result = build_camera(&mut self.ctx, &object.name, camera, world)
            .and_then(|dict| self.emit_entity(&object.name, &dict, OutputTarget::Main));
        self.settle(&object.name, result)
    }

    fn export_duplis(&mut self, owner: &'s SceneObject, duplicator: &'s Duplicator) -> Result<()> {
        if !duplicator.render_type.is_supported() {
            let reason = SkipReason::UnsupportedDupli(duplicator.render_type.as_str().to_string());
            return self.settle(&owner.name, Err(reason.into()));
        }

        for instance in &duplicator.instances {
            let entity = format!("{} (dupli of '{}')", instance.object, owner.name);
            let result = match self.index.object(&instance.object) {
                None => Err(SkipReason::MissingEntity {
                    kind: "object",
                    name: instance.object.clone(),
                }
                .into()),
                Some(object) => match &object.data {
                    ObjectData::Lamp(_) => Err(SkipReason::InstancedEmitter.into()),
                    ObjectData::Mesh { .. } => {
                        self.export_placement(object, matrix_from_rows(&instance.matrix_world))
                    }
                    ObjectData::Camera(_) | ObjectData::Empty => {
                        log::debug!("Ignoring non-geometry dupli '{}'", object.name);
                        Ok(())
                    }
                },
            };
            self.settle(&entity, result)?;
        }
        Ok(())
    }

    /// Place every material slot of a mesh object at `world`.
    fn export_placement(&mut self, object: &'s SceneObject, world: DMat4) -> EntityResult<()> {
        if !is_invertible(&world) {
            return Err(SkipReason::SingularTransform.into());
        }
        let Some(mesh_name) = object.mesh_name() else {
            return Ok(());
        };
        let mesh = self.scene.mesh(mesh_name).ok_or_else(|| SkipReason::MissingEntity {
            kind: "mesh",
            name: mesh_name.to_string(),
        })?;
        // Nothing of the object is written unless every slot converts.
        validate_mesh(mesh)?;

        for slot in used_slots(mesh) {
            self.export_slot(object, mesh, slot, world)?;
        }
        Ok(())
    }

    fn export_slot(
        &mut self,
        object: &'s SceneObject,
        mesh: &'s MeshData,
        slot: usize,
        world: DMat4,
    ) -> EntityResult<()> {
        let Some(body) = self.shape_body(object, mesh, slot)? else {
            return Ok(());
        };
        self.flush_pending()?;

        if self.policy.should_instance(self.scene, &self.index, object, slot) {
            let key = SourceKey::Mesh(mesh.name.clone());
            let group_id = self.ctx.id_with_suffix(&key, &format!("-shapegroup_{}", slot))?;
            match self.groups.get(&group_id).map(|shared| *shared == body) {
                None => {
                    let group = SceneDict::new("shapegroup")
                        .with_id(group_id.clone())
                        .with("shape", body.clone().into());
                    self.emit(&object.name, &group, OutputTarget::Geometry)?;
                    self.groups.insert(group_id.clone(), body);
                    self.counts.shapegroups += 1;
                }
                Some(false) => {
                    log::warn!(
                        "'{}' differs from shapegroup '{}', exporting inline",
                        object.name,
                        group_id
                    );
                    return self.emit_inline(object, body, world);
                }
                Some(true) => {}
            }
            let instance = SceneDict::new("instance")
                .with("shapegroup", SceneDict::reference(group_id).into())
                .with("toWorld", Value::Transform(world));
            self.emit(&object.name, &instance, OutputTarget::Geometry)?;
            self.counts.instances += 1;
            Ok(())
        } else {
            self.emit_inline(object, body, world)
        }
    }

    fn emit_inline(&mut self, object: &SceneObject, body: SceneDict, world: DMat4) -> EntityResult<()> {
        let shape = body.with("toWorld", Value::Transform(world));
        self.emit(&object.name, &shape, OutputTarget::Geometry)?;
        self.counts.inline_shapes += 1;
        Ok(())
    }

    /// The placement-independent part of a shape. `None` when the slot has no
    /// polygons.
    fn shape_body(
        &mut self,
        object: &'s SceneObject,
        mesh: &'s MeshData,
        slot: usize,
    ) -> EntityResult<Option<SceneDict>> {
        let Some(index) = self.record_index(object, mesh, slot)? else {
            return Ok(None);
        };
        let mut shape = SceneDict::new("serialized")
            .with("filename", Value::String(self.serialized_name.clone()))
            .with("shapeIndex", Value::Integer(index as i64));

        if let Some(Some(material)) = object.material_slots.get(slot) {
            self.attach_material(&mut shape, &object.name, material)?;
        }
        Ok(Some(shape))
    }

    /// Write the record for a slot once and return its index in the container.
    fn record_index(
        &mut self,
        object: &SceneObject,
        mesh: &MeshData,
        slot: usize,
    ) -> EntityResult<Option<usize>> {
        let key = if object.modifiers.iter().all(|m| m.is_non_deforming()) {
            RecordKey::Mesh(mesh.name.clone(), slot)
        } else {
            RecordKey::Object(object.name.clone(), slot)
        };
        if let Some(index) = self.records.get(&key) {
            return Ok(*index);
        }

        let name = match &key {
            RecordKey::Mesh(name, slot) | RecordKey::Object(name, slot) => {
                format!("{}_{}", mangle_id(name), slot)
            }
        };
        let index = match build_record(mesh, slot, &name)? {
            Some(record) => {
                self.serialized.write_record(&record)?;
                Some(self.serialized.record_count() - 1)
            }
            None => None,
        };
        self.records.insert(key, index);
        Ok(index)
    }

    /// Bsdf, subsurface, interior medium and emitter for one shape.
    ///
    /// A material that cannot be built leaves the shape without it.
    fn attach_material(&mut self, shape: &mut SceneDict, object: &str, name: &str) -> EntityResult<()> {
        let result = self.ctx.require_material(name);
        let Some(id) = self.optional(object, name, result)? else {
            return Ok(());
        };
        shape.set("bsdf", SceneDict::reference(id).into());
        let Some(material) = self.scene.material(name) else {
            return Ok(());
        };

        let result = self.ctx.require_subsurface(name);
        if let Some(Some(id)) = self.optional(object, name, result)? {
            shape.set("subsurface", SceneDict::reference(id).into());
        }
        if let Some(medium) = &material.interior_medium {
            let result = self.ctx.require_medium(medium);
            if let Some(id) = self.optional(object, medium, result)? {
                shape.set("interior", SceneDict::reference(id).into());
            }
        }
        if let Some(emission) = &material.emission {
            let emitter = SceneDict::new("area")
                .with("radiance", Value::Color(scale_color(emission.color, emission.intensity)));
            shape.set("emitter", emitter.into());
        }
        Ok(())
    }

    /// A dependency that could not be built is recorded once and left out.
    fn optional<T>(&mut self, object: &str, dependency: &str, result: EntityResult<T>) -> EntityResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(EntityError::Skip(reason)) => {
                log::warn!("'{}' exported without '{}': {}", object, dependency, reason);
                if !self.skipped.iter().any(|s| s.entity == dependency) {
                    self.skipped.push(SkippedEntity {
                        entity: dependency.to_string(),
                        reason,
                    });
                }
                Ok(None)
            }
            Err(fatal) => Err(fatal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Material, PluginSpec, Polygon, Scene};
    use crate::serialized::SerializedReader;

    fn quad_mesh(name: &str) -> MeshData {
        MeshData {
            name: name.into(),
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            polygons: vec![Polygon::new(vec![0, 1, 2, 3])],
            ..MeshData::default()
        }
    }

    fn run(scene: &Scene, config: &ExportConfig) -> Result<SessionOutput<Vec<u8>, Vec<u8>>> {
        ExportSession::new(
            scene,
            config,
            XmlOutputs::single(Vec::new()),
            Vec::new(),
            "test.serialized",
            Vec::new(),
        )
        .run()
    }

    fn xml_text(output: &SessionOutput<Vec<u8>, Vec<u8>>) -> String {
        String::from_utf8(output.xml[0].1.clone()).unwrap()
    }

    #[test]
    fn test_traversal_order() {
        let mut scene = Scene::new();
        scene.add_mesh(quad_mesh("Plane"));
        scene.add_object(SceneObject::mesh("Floor", "Plane"));
        scene.add_object(SceneObject {
            data: ObjectData::Lamp(crate::scene::Lamp {
                name: "Key".into(),
                kind: crate::scene::LampKind::Point,
                color: [1.0, 1.0, 1.0],
                intensity: 1.0,
                exterior_medium: None,
            }),
            ..SceneObject::mesh("Key", "")
        });
        scene.add_object(SceneObject {
            data: ObjectData::Camera(Camera {
                name: "Cam".into(),
                projection: crate::scene::Projection::Perspective { fov: 40.0 },
                near_clip: 0.1,
                far_clip: 100.0,
                exterior_medium: None,
            }),
            ..SceneObject::mesh("Cam", "")
        });

        let output = run(&scene, &ExportConfig::default()).unwrap();
        let xml = xml_text(&output);
        let integrator = xml.find("<integrator").unwrap();
        let sensor = xml.find("<sensor").unwrap();
        let emitter = xml.find("<emitter").unwrap();
        let shape = xml.find("<shape").unwrap();
        assert!(integrator < sensor && sensor < emitter && emitter < shape);
        assert!(output.skipped.is_empty());
    }

    #[test]
    fn test_singular_transform_skips_placement() {
        let mut scene = Scene::new();
        scene.add_mesh(quad_mesh("Plane"));
        let mut flat = [[0.0; 4]; 4];
        flat[3][3] = 1.0;
        scene.add_object(SceneObject::mesh("Squashed", "Plane").with_matrix(flat));
        scene.add_object(SceneObject::mesh("Fine", "Plane"));

        let output = run(&scene, &ExportConfig::default().with_instancing(false)).unwrap();
        assert_eq!(output.skipped.len(), 1);
        assert_eq!(output.skipped[0].entity, "Squashed");
        assert_eq!(output.skipped[0].reason, SkipReason::SingularTransform);
        assert_eq!(output.counts.inline_shapes, 1);
    }

    #[test]
    fn test_instanced_lamp_skipped() {
        let mut scene = Scene::new();
        scene.add_object(SceneObject {
            data: ObjectData::Lamp(crate::scene::Lamp {
                name: "Bulb".into(),
                kind: crate::scene::LampKind::Point,
                color: [1.0, 1.0, 1.0],
                intensity: 1.0,
                exterior_medium: None,
            }),
            ..SceneObject::mesh("Bulb", "")
        });
        let mut owner = SceneObject {
            data: ObjectData::Empty,
            ..SceneObject::mesh("Chandelier", "")
        };
        owner.duplicator = Some(Duplicator {
            render_type: crate::scene::DupliRenderType::Verts,
            instances: vec![crate::scene::DupliInstance {
                object: "Bulb".into(),
                matrix_world: crate::types::IDENTITY_ROWS,
            }],
        });
        scene.add_object(owner);

        let output = run(&scene, &ExportConfig::default()).unwrap();
        assert_eq!(output.skipped.len(), 1);
        assert_eq!(output.skipped[0].reason, SkipReason::InstancedEmitter);
    }

    #[test]
    fn test_unsupported_dupli_type() {
        let mut scene = Scene::new();
        scene.add_mesh(quad_mesh("Plane"));
        let mut owner = SceneObject::mesh("Emitter", "Plane");
        owner.duplicator = Some(Duplicator {
            render_type: crate::scene::DupliRenderType::Halo,
            instances: Vec::new(),
        });
        scene.add_object(owner);

        let output = run(&scene, &ExportConfig::default()).unwrap();
        assert_eq!(
            output.skipped[0].reason,
            SkipReason::UnsupportedDupli("halo".into())
        );
        assert_eq!(output.counts.inline_shapes, 1);
    }

    #[test]
    fn test_emissive_material_adds_emitter() {
        let mut scene = Scene::new();
        scene.add_mesh(quad_mesh("Plane"));
        let mut glow = Material::new("Glow", PluginSpec::new("diffuse"));
        glow.emission = Some(crate::scene::Emission {
            color: [1.0, 0.5, 0.5],
            intensity: 2.0,
        });
        scene.add_material(glow);
        scene.add_object(SceneObject::mesh("Panel", "Plane").with_material("Glow"));

        let output = run(&scene, &ExportConfig::default()).unwrap();
        let xml = xml_text(&output);
        assert!(xml.contains(r#"<ref id="Glow-material" name="bsdf"/>"#));
        assert!(xml.contains(r#"<emitter type="area" name="emitter">"#));
        assert!(xml.contains(r#"<rgb name="radiance" value="2 1 1"/>"#));
    }

    #[test]
    fn test_missing_material_keeps_shape() {
        let mut scene = Scene::new();
        scene.add_mesh(quad_mesh("Plane"));
        scene.add_object(SceneObject::mesh("Floor", "Plane").with_material("Nowhere"));

        let output = run(&scene, &ExportConfig::default()).unwrap();
        assert_eq!(output.counts.inline_shapes, 1);
        assert!(!xml_text(&output).contains("bsdf"));
        assert_eq!(output.skipped.len(), 1);
        assert_eq!(output.skipped[0].entity, "Nowhere");
    }

    #[test]
    fn test_shared_record_for_inline_copies() {
        let mut scene = Scene::new();
        scene.add_mesh(quad_mesh("Plane"));
        scene.add_object(SceneObject::mesh("A", "Plane"));
        scene.add_object(SceneObject::mesh("B", "Plane"));

        let config = ExportConfig::default().with_instancing(false);
        let output = run(&scene, &config).unwrap();
        assert_eq!(output.counts.inline_shapes, 2);
        assert_eq!(output.counts.records, 1);
        let reader = SerializedReader::from_bytes(&output.serialized).unwrap();
        assert_eq!(reader.record_count(), 1);
    }

    #[test]
    fn test_divergent_materials_fall_back_to_inline() {
        let mut scene = Scene::new();
        scene.add_mesh(quad_mesh("Plane"));
        scene.add_material(Material::new("Red", PluginSpec::new("diffuse")));
        scene.add_material(Material::new("Blue", PluginSpec::new("diffuse")));
        scene.add_object(SceneObject::mesh("A", "Plane").with_material("Red"));
        scene.add_object(SceneObject::mesh("B", "Plane").with_material("Blue"));

        let output = run(&scene, &ExportConfig::default()).unwrap();
        assert_eq!(output.counts.shapegroups, 1);
        assert_eq!(output.counts.instances, 1);
        assert_eq!(output.counts.inline_shapes, 1);
    }

    #[test]
    fn test_unknown_bsdf_plugin_keeps_shape() {
        let mut scene = Scene::new();
        scene.add_mesh(quad_mesh("Plane"));
        scene.add_material(Material::new("Fancy", PluginSpec::new("principled")));
        scene.add_object(SceneObject::mesh("Floor", "Plane").with_material("Fancy"));

        let output = run(&scene, &ExportConfig::default()).unwrap();
        let xml = xml_text(&output);
        assert_eq!(output.counts.inline_shapes, 1);
        assert!(!xml.contains("Fancy-material"));
        assert_eq!(output.skipped.len(), 1);
        assert_eq!(output.skipped[0].entity, "Fancy");
        assert_eq!(
            output.skipped[0].reason,
            SkipReason::UnknownPlugin("principled".into())
        );
    }

    #[test]
    fn test_bad_slot_skips_whole_object() {
        let mut scene = Scene::new();
        let mut mesh = quad_mesh("Split");
        mesh.polygons.push(Polygon::new(vec![0, 1, 99]).with_material(1));
        scene.add_mesh(mesh);
        scene.add_object(SceneObject::mesh("Obj", "Split"));

        let output = run(&scene, &ExportConfig::default()).unwrap();
        assert_eq!(output.skipped.len(), 1);
        assert_eq!(output.skipped[0].entity, "Obj");
        assert!(matches!(output.skipped[0].reason, SkipReason::MeshConversion(_)));
        assert_eq!(output.counts.inline_shapes, 0);
        assert_eq!(output.counts.records, 0);
        assert!(!xml_text(&output).contains("<shape"));
    }
}
