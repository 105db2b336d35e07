//! Scene export to Mitsuba XML plus a serialized mesh container.
//!
//! [`export`] writes `<base>.xml` and `<base>.serialized` into an output
//! directory. With [`ExportConfig::split_files`] the materials, media and
//! geometry go to sibling files that the main file includes.

pub mod engine;
pub mod instancing;
pub mod session;

pub use engine::{format_float, format_matrix, EngineStats, ExportEngine, IdRegistry};
pub use instancing::InstancingPolicy;
pub use session::{ExportSession, SessionOutput, ShapeCounts};

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::{Result, SkipReason};
use crate::scene::SceneModel;
use crate::serialized::RecordEncoding;
use crate::xml::{OutputTarget, XmlOutputs};

/// Export configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Written on every `<scene>` root.
    pub scene_version: String,
    /// Write materials, media and geometry to separate included files.
    pub split_files: bool,
    /// Share repeated geometry through shapegroups.
    pub instancing: bool,
    /// Deflate level for serialized records (0-9).
    pub compression_level: u32,
    pub encoding: RecordEncoding,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scene_version: "0.5.0".to_string(),
            split_files: false,
            instancing: true,
            compression_level: 6,
            encoding: RecordEncoding::Streaming,
        }
    }
}

impl ExportConfig {
    pub fn with_scene_version(mut self, version: impl Into<String>) -> Self {
        self.scene_version = version.into();
        self
    }

    pub fn with_split_files(mut self, split: bool) -> Self {
        self.split_files = split;
        self
    }

    pub fn with_instancing(mut self, instancing: bool) -> Self {
        self.instancing = instancing;
        self
    }

    /// Levels above 9 are clamped.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn with_encoding(mut self, encoding: RecordEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// An entity left out of the export.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntity {
    pub entity: String,
    pub reason: SkipReason,
}

/// Whether every entity made it into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStatus {
    Complete,
    CompletedWithSkips,
}

/// Summary of a successful export.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub xml_path: PathBuf,
    pub serialized_path: PathBuf,
    /// Included split files, in include order.
    pub split_paths: Vec<PathBuf>,
    pub records: usize,
    pub shapegroups: usize,
    pub instances: usize,
    pub inline_shapes: usize,
    pub skipped: Vec<SkippedEntity>,
    pub stats: EngineStats,
}

impl ExportReport {
    pub fn status(&self) -> ExportStatus {
        if self.skipped.is_empty() && self.stats.dropped_params.is_empty() {
            ExportStatus::Complete
        } else {
            ExportStatus::CompletedWithSkips
        }
    }
}

/// Export a scene with the default configuration.
pub fn export<S: SceneModel + ?Sized>(
    scene: &S,
    output_dir: impl AsRef<Path>,
    basename: &str,
) -> Result<ExportReport> {
    export_with_config(scene, output_dir, basename, &ExportConfig::default())
}

/// Export a scene into `output_dir`, naming every file after `basename`.
pub fn export_with_config<S: SceneModel + ?Sized>(
    scene: &S,
    output_dir: impl AsRef<Path>,
    basename: &str,
    config: &ExportConfig,
) -> Result<ExportReport> {
    let dir = output_dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let xml_path = dir.join(format!("{}.xml", basename));
    let serialized_name = format!("{}.serialized", basename);
    let serialized_path = dir.join(&serialized_name);

    let main = BufWriter::new(File::create(&xml_path)?);
    let mut includes = Vec::new();
    let mut split_paths = Vec::new();
    let outputs = if config.split_files {
        let mut others = Vec::new();
        for target in OutputTarget::SPLIT {
            let name = format!("{}{}.xml", basename, target.suffix());
            let path = dir.join(&name);
            others.push((target, BufWriter::new(File::create(&path)?)));
            includes.push(name);
            split_paths.push(path);
        }
        XmlOutputs::split(main, others)
    } else {
        XmlOutputs::single(main)
    };
    let serialized = BufWriter::new(File::create(&serialized_path)?);

    log::info!("Exporting scene to {}", xml_path.display());
    let output = ExportSession::new(scene, config, outputs, serialized, serialized_name, includes)
        .run()?;

    let report = ExportReport {
        xml_path,
        serialized_path,
        split_paths,
        records: output.counts.records,
        shapegroups: output.counts.shapegroups,
        instances: output.counts.instances,
        inline_shapes: output.counts.inline_shapes,
        skipped: output.skipped,
        stats: output.stats,
    };
    log::info!(
        "Exported {} records, {} shapegroups, {} instances, {} inline shapes ({} skipped)",
        report.records,
        report.shapegroups,
        report.instances,
        report.inline_shapes,
        report.skipped.len()
    );
    Ok(report)
}
