//! Polygon-to-triangle conversion for serialized meshes.
//!
//! This module turns source polygons into deduplicated, triangulated
//! [`MeshRecord`]s, one per material slot.

pub mod dedup;
pub mod geometry;

pub use dedup::{collect_faces, dedupe, validate_mesh, Corner, Face, VertexDeduplicator};
pub use geometry::{MeshRecord, Vertex};

use crate::error::SkipReason;
use crate::scene::MeshData;

/// Build the record for one material slot of a mesh.
///
/// Returns `Ok(None)` when no polygon uses the slot.
pub fn build_record(
    mesh: &MeshData,
    material_index: usize,
    name: &str,
) -> Result<Option<MeshRecord>, SkipReason> {
    if mesh.positions.is_empty() || mesh.polygons.is_empty() {
        return Err(SkipReason::MeshConversion(format!(
            "'{}' has no geometry",
            mesh.name
        )));
    }
    let faces = collect_faces(mesh, material_index)?;
    if faces.is_empty() {
        return Ok(None);
    }
    Ok(Some(dedupe(name, &faces)))
}

/// Material slot indices used by a mesh's polygons, ascending.
pub fn used_slots(mesh: &MeshData) -> Vec<usize> {
    let mut slots: Vec<usize> = mesh.polygons.iter().map(|p| p.material_index).collect();
    slots.sort_unstable();
    slots.dedup();
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Polygon;

    #[test]
    fn test_empty_mesh_is_skipped() {
        let mesh = MeshData {
            name: "empty".into(),
            ..MeshData::default()
        };
        assert!(matches!(
            build_record(&mesh, 0, "empty"),
            Err(SkipReason::MeshConversion(_))
        ));
    }

    #[test]
    fn test_used_slots() {
        let mesh = MeshData {
            name: "slots".into(),
            positions: vec![[0.0; 3]; 3],
            polygons: vec![
                Polygon::new(vec![0, 1, 2]).with_material(2),
                Polygon::new(vec![0, 1, 2]),
                Polygon::new(vec![0, 2, 1]).with_material(2),
            ],
            ..MeshData::default()
        };
        assert_eq!(used_slots(&mesh), vec![0, 2]);
        assert!(build_record(&mesh, 1, "slots").unwrap().is_none());
        let record = build_record(&mesh, 2, "slots_2").unwrap().unwrap();
        assert_eq!(record.triangle_count(), 2);
        assert_eq!(record.name, "slots_2");
    }
}
