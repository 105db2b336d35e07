//! Materials, textures, subsurface integrators and media.

use super::BuildContext;
use crate::dict::SceneDict;
use crate::error::EntityResult;
use crate::scene::{Material, Medium, PluginSpec, SceneModel, Texture};

/// The BSDF of a material. Object-dependent extras (emission, interior
/// medium, subsurface) are attached on the shape instead.
pub fn build_material<S: SceneModel + ?Sized>(
    ctx: &mut BuildContext<'_, S>,
    material: &Material,
) -> EntityResult<SceneDict> {
    ctx.plugin_dict(&material.bsdf)
}

pub fn build_texture<S: SceneModel + ?Sized>(
    ctx: &mut BuildContext<'_, S>,
    texture: &Texture,
) -> EntityResult<SceneDict> {
    ctx.plugin_dict(&texture.spec)
}

pub fn build_subsurface<S: SceneModel + ?Sized>(
    ctx: &mut BuildContext<'_, S>,
    spec: &PluginSpec,
) -> EntityResult<SceneDict> {
    ctx.plugin_dict(spec)
}

/// A medium with its optional phase function nested inline.
pub fn build_medium<S: SceneModel + ?Sized>(
    ctx: &mut BuildContext<'_, S>,
    medium: &Medium,
) -> EntityResult<SceneDict> {
    let mut dict = ctx.plugin_dict(&medium.spec)?;
    if let Some(phase) = &medium.phase {
        dict.set("phase", ctx.plugin_dict(phase)?.into());
    }
    Ok(dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::Value;
    use crate::error::{EntityError, ExportError};
    use crate::scene::{ParamValue, Scene};
    use crate::xml::OutputTarget;

    #[test]
    fn test_material_cycle_is_fatal() {
        let mut scene = Scene::new();
        scene.add_material(Material::new(
            "A",
            PluginSpec::new("twosided").with_param("inner", ParamValue::Material("B".into())),
        ));
        scene.add_material(Material::new(
            "B",
            PluginSpec::new("twosided").with_param("inner", ParamValue::Material("A".into())),
        ));
        let mut ctx = BuildContext::new(&scene);
        match ctx.require_material("A") {
            Err(EntityError::Fatal(ExportError::ReferenceCycle { chain })) => {
                assert_eq!(chain, vec!["material 'A'", "material 'B'", "material 'A'"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_blend_references_children() {
        let mut scene = Scene::new();
        scene.add_material(Material::new("Red", PluginSpec::new("diffuse")));
        scene.add_material(Material::new("Blue", PluginSpec::new("diffuse")));
        scene.add_material(Material::new(
            "Mix",
            PluginSpec::new("blendbsdf")
                .with_param("weight", ParamValue::Float(0.25))
                .with_param("a", ParamValue::Material("Red".into()))
                .with_param("b", ParamValue::Material("Blue".into())),
        ));
        let mut ctx = BuildContext::new(&scene);
        ctx.require_material("Mix").unwrap();
        let pending = ctx.take_pending();
        assert_eq!(pending.len(), 3);
        let mix = &pending[2].0;
        assert_eq!(mix.plugin, "blendbsdf");
        match mix.get("a") {
            Some(Value::Dict(child)) => {
                assert!(child.is_reference());
                assert_eq!(child.id.as_deref(), Some("Red-material"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_medium_with_phase() {
        let mut scene = Scene::new();
        scene.add_medium(Medium {
            name: "Fog".into(),
            spec: PluginSpec::new("homogeneous")
                .with_param("sigmaT", ParamValue::Color([0.1, 0.1, 0.1])),
            phase: Some(PluginSpec::new("hg").with_param("g", ParamValue::Float(0.7))),
        });
        let mut ctx = BuildContext::new(&scene);
        assert_eq!(ctx.require_medium("Fog").unwrap(), "Fog-medium");
        let pending = ctx.take_pending();
        assert_eq!(pending[0].1, OutputTarget::Volumes);
        match pending[0].0.get("phase") {
            Some(Value::Dict(phase)) => assert_eq!(phase.plugin, "hg"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_subsurface_only_when_present() {
        let mut scene = Scene::new();
        scene.add_material(Material::new("Plain", PluginSpec::new("diffuse")));
        let mut skin = Material::new("Skin", PluginSpec::new("diffuse"));
        skin.subsurface = Some(PluginSpec::new("dipole").with_param("scale", ParamValue::Float(10.0)));
        scene.add_material(skin);

        let mut ctx = BuildContext::new(&scene);
        assert_eq!(ctx.require_subsurface("Plain").unwrap(), None);
        assert_eq!(
            ctx.require_subsurface("Skin").unwrap().as_deref(),
            Some("Skin-subsurface")
        );
    }
}
