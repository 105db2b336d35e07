//! Name lookups over a scene's object list.

use std::collections::{HashMap, HashSet};

use super::object::SceneObject;

/// Object lookups built once per export pass.
///
/// When two objects share a name the first one in scene order wins.
#[derive(Debug, Default)]
pub struct SceneIndex<'s> {
    objects: HashMap<&'s str, &'s SceneObject>,
    mesh_users: HashMap<&'s str, usize>,
    dupli_sources: HashSet<&'s str>,
}

impl<'s> SceneIndex<'s> {
    pub fn new(objects: &'s [SceneObject]) -> Self {
        let mut index = Self::default();
        for object in objects {
            index.objects.entry(object.name.as_str()).or_insert(object);
            if let Some(mesh) = object.mesh_name() {
                *index.mesh_users.entry(mesh).or_insert(0) += 1;
            }
            if let Some(duplicator) = &object.duplicator {
                index
                    .dupli_sources
                    .extend(duplicator.instances.iter().map(|i| i.object.as_str()));
            }
        }
        index
    }

    pub fn object(&self, name: &str) -> Option<&'s SceneObject> {
        self.objects.get(name).copied()
    }

    /// Number of objects whose data is the given mesh.
    pub fn mesh_users(&self, mesh: &str) -> usize {
        self.mesh_users.get(mesh).copied().unwrap_or(0)
    }

    /// Whether some duplicator places copies of this object.
    pub fn is_dupli_source(&self, object: &str) -> bool {
        self.dupli_sources.contains(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{DupliInstance, DupliRenderType, Duplicator};
    use crate::types::IDENTITY_ROWS;

    #[test]
    fn test_mesh_users_and_dupli_source() {
        let mut tree = SceneObject::mesh("Tree", "TreeMesh");
        tree.duplicator = Some(Duplicator {
            render_type: DupliRenderType::Object,
            instances: vec![DupliInstance {
                object: "Leaf".into(),
                matrix_world: IDENTITY_ROWS,
            }],
        });
        let objects = vec![
            SceneObject::mesh("A", "Shared"),
            SceneObject::mesh("B", "Shared"),
            SceneObject::mesh("Leaf", "LeafMesh"),
            tree,
        ];

        let index = SceneIndex::new(&objects);
        assert_eq!(index.mesh_users("Shared"), 2);
        assert_eq!(index.mesh_users("LeafMesh"), 1);
        assert_eq!(index.mesh_users("Nothing"), 0);
        assert!(index.is_dupli_source("Leaf"));
        assert!(!index.is_dupli_source("A"));
    }

    #[test]
    fn test_first_object_wins() {
        let objects = vec![
            SceneObject::mesh("Twin", "First"),
            SceneObject::mesh("Twin", "Second"),
        ];
        let index = SceneIndex::new(&objects);
        assert_eq!(index.object("Twin").and_then(|o| o.mesh_name()), Some("First"));
        assert!(index.object("Missing").is_none());
    }
}
