//! # Mitsuba Export
//!
//! A Rust library for exporting 3D scene graphs to the Mitsuba renderer.
//!
//! ## Overview
//!
//! This library reads a scene (objects, meshes, materials, lamps, cameras,
//! media) through the [`SceneModel`] trait and writes a Mitsuba XML scene plus a
//! binary serialized mesh container that the XML points into.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mitsuba_export::{export, Scene};
//!
//! // Load a scene description
//! let scene = Scene::load("scene.json")?;
//!
//! // Write out/scene.xml and out/scene.serialized
//! let report = export(&scene, "out", "scene")?;
//! println!("{} mesh records", report.records);
//! ```
//!
//! ## Configuration
//!
//! ```ignore
//! use mitsuba_export::{export_with_config, ExportConfig};
//!
//! let config = ExportConfig::default()
//!     .with_split_files(true)
//!     .with_instancing(false);
//! let report = export_with_config(&scene, "out", "scene", &config)?;
//! ```

pub mod error;
pub mod types;
pub mod scene;
pub mod mesher;
pub mod serialized;
pub mod xml;
pub mod dict;
pub mod builder;
pub mod export;

// Re-export main types for convenience
pub use error::{EntityError, ExportError, Result, SkipReason};
pub use scene::{Scene, SceneModel};
pub use mesher::{MeshRecord, Vertex};
pub use serialized::{RecordEncoding, SerializedReader, SerializedWriter};
pub use dict::{SceneDict, Value};
pub use export::{
    export, export_with_config, ExportConfig, ExportReport, ExportStatus, SkippedEntity,
};
