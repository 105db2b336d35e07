//! Reference-tracking, deduplicating serialization of [`SceneDict`] trees.
//!
//! Every id is written at most once per session. Re-emitting an identical
//! top-level element is a no-op; a nested element whose id was already written
//! becomes a `<ref>`. Ids referenced but never written fail the session when it
//! is finished.

use std::collections::{BTreeSet, HashMap};
use std::io::Write;

use glam::DMat4;

use crate::dict::{element_kind, is_allowed_param, ElementKind, SceneDict, Value};
use crate::error::{ExportError, Result};
use crate::types::{matrix_rows, to_y_up_matrix, to_y_up_point, to_y_up_vector};
use crate::xml::{OutputTarget, XmlOutputs, XmlWriter};

/// Emitted and referenced ids for one session.
#[derive(Debug, Default)]
pub struct IdRegistry {
    emitted: HashMap<String, SceneDict>,
    pending: BTreeSet<String>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The definition first written for `id`.
    pub fn definition(&self, id: &str) -> Option<&SceneDict> {
        self.emitted.get(id)
    }

    pub fn mark_emitted(&mut self, id: &str, dict: &SceneDict) {
        self.pending.remove(id);
        self.emitted.insert(id.to_string(), dict.clone());
    }

    /// Record a reference; it stays pending until the id is emitted.
    pub fn note_reference(&mut self, id: &str) {
        if !self.emitted.contains_key(id) {
            self.pending.insert(id.to_string());
        }
    }

    /// Referenced ids that have not been emitted, sorted.
    pub fn unresolved(&self) -> Vec<String> {
        self.pending.iter().cloned().collect()
    }
}

/// What happened to a top-level emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    Written,
    /// Same id and contents were already written.
    Deduplicated,
    /// Unknown plugin type; nothing was written.
    Skipped,
}

/// Counters collected while emitting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    pub elements: usize,
    pub deduplicated: usize,
    pub references: usize,
    /// Plugin types that were not recognised.
    pub unknown_plugins: Vec<String>,
    /// `(element kind, parameter)` pairs dropped by the whitelist.
    pub dropped_params: Vec<(String, String)>,
}

/// Serializes dictionaries into one or more XML outputs.
pub struct ExportEngine<W: Write> {
    outputs: XmlOutputs<W>,
    registry: IdRegistry,
    stats: EngineStats,
    scene_version: String,
    started: bool,
}

impl<W: Write> ExportEngine<W> {
    pub fn new(outputs: XmlOutputs<W>, scene_version: impl Into<String>) -> Self {
        Self {
            outputs,
            registry: IdRegistry::new(),
            stats: EngineStats::default(),
            scene_version: scene_version.into(),
            started: false,
        }
    }

    /// Open the `<scene>` root of every output. The main file includes the
    /// given files right after its root opens.
    pub fn begin(&mut self, includes: &[String]) -> Result<()> {
        let version = self.scene_version.clone();
        for target in self.outputs.targets() {
            let xml = self.outputs.writer(target);
            xml.declaration()?;
            xml.open("scene", &[("version", version.as_str())])?;
            if target == OutputTarget::Main {
                for filename in includes {
                    xml.empty("include", &[("filename", filename.as_str())])?;
                }
            }
        }
        self.started = true;
        Ok(())
    }

    pub fn registry(&self) -> &IdRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Write a comment into one output.
    pub fn comment(&mut self, target: OutputTarget, text: &str) -> Result<()> {
        self.outputs.writer(target).comment(text)
    }

    /// Emit one top-level dictionary.
    pub fn emit(&mut self, dict: &SceneDict, target: OutputTarget) -> Result<Emission> {
        if !dict.is_reference() {
            if element_kind(&dict.plugin).is_none() {
                log::warn!(
                    "Unknown plugin type '{}'{}, element skipped",
                    dict.plugin,
                    dict.id.as_deref().map(|id| format!(" (id '{}')", id)).unwrap_or_default()
                );
                self.stats.unknown_plugins.push(dict.plugin.clone());
                return Ok(Emission::Skipped);
            }
            if let Some(id) = &dict.id {
                if let Some(previous) = self.registry.definition(id) {
                    if previous != dict {
                        return Err(ExportError::ConflictingDefinition { id: id.clone() });
                    }
                    log::debug!("'{}' already emitted", id);
                    self.stats.deduplicated += 1;
                    return Ok(Emission::Deduplicated);
                }
            }
        }

        let mut ctx = EmitContext {
            xml: self.outputs.writer(target),
            registry: &mut self.registry,
            stats: &mut self.stats,
        };
        ctx.write_dict(dict, None)?;
        Ok(Emission::Written)
    }

    /// Close every root and check that all references resolved.
    ///
    /// Outputs are flushed even when references are missing.
    pub fn finish(mut self) -> Result<Vec<(OutputTarget, W)>> {
        if self.started {
            for target in self.outputs.targets() {
                self.outputs.writer(target).close()?;
            }
        }
        let unresolved = self.registry.unresolved();
        if !unresolved.is_empty() {
            self.outputs.abort();
            return Err(ExportError::UnresolvedReferences(unresolved));
        }
        self.outputs.finish()
    }

    /// Flush partial output after a fatal error.
    pub fn abort(self) {
        self.outputs.abort();
    }
}

struct EmitContext<'a, W: Write> {
    xml: &'a mut XmlWriter<W>,
    registry: &'a mut IdRegistry,
    stats: &'a mut EngineStats,
}

impl<W: Write> EmitContext<'_, W> {
    fn write_dict(&mut self, dict: &SceneDict, slot: Option<&str>) -> Result<()> {
        if dict.is_reference() {
            return self.write_ref(dict, slot);
        }

        let Some(kind) = element_kind(&dict.plugin) else {
            log::warn!("Unknown plugin type '{}', element skipped", dict.plugin);
            self.stats.unknown_plugins.push(dict.plugin.clone());
            return Ok(());
        };

        if let Some(id) = &dict.id {
            if let Some(previous) = self.registry.definition(id) {
                if previous != dict {
                    return Err(ExportError::ConflictingDefinition { id: id.clone() });
                }
                let reference = SceneDict::reference(id.clone());
                return self.write_ref(&reference, slot);
            }
            self.registry.mark_emitted(id, dict);
        }

        let mut attrs: Vec<(&str, &str)> = vec![("type", dict.plugin.as_str())];
        if let Some(id) = &dict.id {
            attrs.push(("id", id.as_str()));
        }
        if let Some(name) = slot {
            attrs.push(("name", name));
        }

        self.stats.elements += 1;
        let tag = kind.tag();
        if dict.params().next().is_none() {
            return self.xml.empty(tag, &attrs);
        }

        self.xml.open(tag, &attrs)?;
        let unnamed = kind.has_unnamed_children() || dict.plugin == "shapegroup";
        for (name, value) in dict.params() {
            self.write_param(kind, name, value, unnamed)?;
        }
        self.xml.close()
    }

    fn write_ref(&mut self, dict: &SceneDict, slot: Option<&str>) -> Result<()> {
        let Some(id) = &dict.id else {
            log::warn!("Reference without id skipped");
            return Ok(());
        };
        self.registry.note_reference(id);
        self.stats.references += 1;
        let mut attrs: Vec<(&str, &str)> = vec![("id", id.as_str())];
        if let Some(name) = slot {
            attrs.push(("name", name));
        }
        self.xml.empty("ref", &attrs)
    }

    fn write_param(
        &mut self,
        kind: ElementKind,
        name: &str,
        value: &Value,
        unnamed_children: bool,
    ) -> Result<()> {
        match value {
            Value::Dict(child) => {
                let slot = (!unnamed_children).then_some(name);
                return self.write_dict(child, slot);
            }
            Value::List(children) => {
                for child in children {
                    self.write_dict(child, None)?;
                }
                return Ok(());
            }
            _ => {}
        }

        if !is_allowed_param(kind, name) {
            log::warn!("Parameter '{}' not exported for {} elements", name, kind.tag());
            self.stats
                .dropped_params
                .push((kind.tag().to_string(), name.to_string()));
            return Ok(());
        }

        match value {
            Value::String(s) => self.xml.empty("string", &[("name", name), ("value", s.as_str())]),
            Value::Bool(b) => self.xml.empty(
                "boolean",
                &[("name", name), ("value", if *b { "true" } else { "false" })],
            ),
            Value::Integer(i) => {
                self.xml.empty("integer", &[("name", name), ("value", i.to_string().as_str())])
            }
            Value::Float(f) => {
                self.xml.empty("float", &[("name", name), ("value", format_float(*f).as_str())])
            }
            Value::Color(c) => self
                .xml
                .empty("rgb", &[("name", name), ("value", format_floats(c).as_str())]),
            Value::Vector(v) => self.write_xyz("vector", name, to_y_up_vector(*v)),
            Value::Point(p) => self.write_xyz("point", name, to_y_up_point(*p)),
            Value::Transform(m) => {
                self.xml.open("transform", &[("name", name)])?;
                let matrix = format_matrix(&to_y_up_matrix(m));
                self.xml.empty("matrix", &[("value", matrix.as_str())])?;
                self.xml.close()
            }
            Value::Dict(_) | Value::List(_) => Ok(()),
        }
    }

    fn write_xyz(&mut self, tag: &str, name: &str, v: [f64; 3]) -> Result<()> {
        let [x, y, z] = v.map(format_float);
        self.xml.empty(
            tag,
            &[("name", name), ("x", x.as_str()), ("y", y.as_str()), ("z", z.as_str())],
        )
    }
}

/// Fixed-notation float text; negative zero prints as `0`.
pub fn format_float(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        format!("{}", value)
    }
}

fn format_floats(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format_float(*v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sixteen components, row-major.
pub fn format_matrix(matrix: &DMat4) -> String {
    let values: Vec<f64> = matrix_rows(matrix).iter().flatten().copied().collect();
    format_floats(&values)
}
