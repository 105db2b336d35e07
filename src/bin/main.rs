//! Mitsuba Export CLI
//!
//! Export JSON scene descriptions to Mitsuba scenes and inspect serialized
//! mesh containers.

use clap::{Parser, Subcommand};
use mitsuba_export::{
    export_with_config, ExportConfig, ExportStatus, RecordEncoding, Scene, SerializedReader,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mitsuba-export")]
#[command(author, version, about = "Export scenes to Mitsuba XML and serialized meshes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a JSON scene description
    Export {
        /// Input JSON scene
        #[arg(short, long)]
        scene: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Base name for the written files
        #[arg(short, long, default_value = "scene")]
        name: String,

        /// Write materials, volumes and geometry to separate files
        #[arg(long)]
        split_files: bool,

        /// Inline every shape instead of using shapegroups
        #[arg(long)]
        no_instancing: bool,

        /// Version written on the scene root
        #[arg(long, default_value = "0.5.0")]
        scene_version: String,

        /// Deflate level for mesh records (0 to 9)
        #[arg(long, default_value = "6")]
        compression: u32,

        /// Compress each record from one in-memory buffer
        #[arg(long)]
        buffered: bool,
    },

    /// Show the records of a serialized mesh container
    Inspect {
        /// Path to a .serialized file
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            scene,
            output,
            name,
            split_files,
            no_instancing,
            scene_version,
            compression,
            buffered,
        } => {
            let encoding = if buffered {
                RecordEncoding::Buffered
            } else {
                RecordEncoding::Streaming
            };
            let config = ExportConfig::default()
                .with_scene_version(scene_version)
                .with_split_files(split_files)
                .with_instancing(!no_instancing)
                .with_compression_level(compression)
                .with_encoding(encoding);
            export_scene(&scene, &output, &name, &config)?;
        }
        Commands::Inspect { file } => {
            inspect(&file)?;
        }
    }

    Ok(())
}

fn export_scene(
    scene_path: &PathBuf,
    output_dir: &PathBuf,
    name: &str,
    config: &ExportConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading scene from {:?}...", scene_path);
    let scene = Scene::load(scene_path)?;
    println!(
        "  Found {} objects, {} meshes, {} materials",
        scene.objects.len(),
        scene.meshes.len(),
        scene.materials.len()
    );
    for duplicate in scene.duplicate_names() {
        println!("  Warning: name '{}' is used more than once", duplicate);
    }

    let report = export_with_config(&scene, output_dir, name, config)?;

    println!("Wrote {:?}", report.xml_path);
    for path in &report.split_paths {
        println!("Wrote {:?}", path);
    }
    println!("Wrote {:?}", report.serialized_path);
    println!(
        "  {} records, {} shapegroups, {} instances, {} inline shapes",
        report.records, report.shapegroups, report.instances, report.inline_shapes
    );

    if report.status() == ExportStatus::CompletedWithSkips {
        println!("Completed with skips:");
        for skipped in &report.skipped {
            println!("  - {}: {}", skipped.entity, skipped.reason);
        }
        for (kind, param) in &report.stats.dropped_params {
            println!("  - parameter '{}' dropped from {}", param, kind);
        }
    }

    Ok(())
}

fn inspect(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(path)?;
    let reader = SerializedReader::from_bytes(&data)?;

    println!("{:?}: {} records", path, reader.record_count());
    for (index, offset) in reader.offsets().iter().enumerate() {
        let (magic, version) = reader.header(index)?;
        let record = reader.read_record(index)?;
        println!(
            "  [{}] offset {} header {:#06x}/{} '{}': {} vertices, {} triangles{}{}{}",
            index,
            offset,
            magic,
            version,
            record.name,
            record.vertex_count(),
            record.triangle_count(),
            if record.normals.is_some() { ", normals" } else { "" },
            if record.uvs.is_some() { ", uvs" } else { "" },
            if record.vertex_colors.is_some() { ", colors" } else { "" },
        );
    }

    Ok(())
}
