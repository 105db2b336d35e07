//! Lamp to emitter conversion.
//!
//! Area lamps become a `rectangle` shape carrying an `area` emitter; every
//! other lamp type maps to a single emitter element.

use glam::{DMat4, DVec3};

use super::{BuildContext, SourceKey};
use crate::dict::{SceneDict, Value};
use crate::error::EntityResult;
use crate::scene::{Lamp, LampKind, SceneModel};
use crate::types::scale_color;

/// Build the emitter for the lamp owned by `object`, placed at `world`.
pub fn build_lamp<S: SceneModel + ?Sized>(
    ctx: &mut BuildContext<'_, S>,
    object: &str,
    lamp: &Lamp,
    world: DMat4,
) -> EntityResult<SceneDict> {
    let id = ctx.id_for(&SourceKey::Lamp(object.to_string()))?;
    let power = scale_color(lamp.color, lamp.intensity);
    // Lamps point down local -Z.
    let aim = world * DMat4::from_scale(DVec3::new(-1.0, 1.0, -1.0));

    let (mut dict, medium_slot) = match &lamp.kind {
        LampKind::Point => {
            let position = world.transform_point3(DVec3::ZERO).to_array();
            let dict = SceneDict::new("point")
                .with("position", Value::Point(position))
                .with("intensity", Value::Color(power));
            (dict, "medium")
        }
        LampKind::Spot {
            spot_size,
            spot_blend,
        } => {
            let cutoff = spot_size / 2.0;
            let dict = SceneDict::new("spot")
                .with("toWorld", Value::Transform(aim))
                .with("intensity", Value::Color(power))
                .with("cutoffAngle", Value::Float(cutoff))
                .with("beamWidth", Value::Float(cutoff * (1.0 - spot_blend.clamp(0.0, 1.0))));
            (dict, "medium")
        }
        LampKind::Sun => {
            let direction = world
                .transform_vector3(DVec3::NEG_Z)
                .normalize_or_zero()
                .to_array();
            let dict = SceneDict::new("directional")
                .with("direction", Value::Vector(direction))
                .with("irradiance", Value::Color(power));
            (dict, "medium")
        }
        LampKind::Area { size_x, size_y } => {
            let extent = DMat4::from_scale(DVec3::new(size_x / 2.0, size_y / 2.0, -1.0));
            let emitter = SceneDict::new("area").with("radiance", Value::Color(power));
            let dict = SceneDict::new("rectangle")
                .with("toWorld", Value::Transform(world * extent))
                .with("emitter", emitter.into());
            (dict, "exterior")
        }
        LampKind::Hemi { envmap: Some(file) } => {
            let dict = SceneDict::new("envmap")
                .with("filename", Value::String(file.clone()))
                .with("toWorld", Value::Transform(world))
                .with("scale", Value::Float(lamp.intensity));
            (dict, "medium")
        }
        LampKind::Hemi { envmap: None } => {
            let dict = SceneDict::new("constant").with("radiance", Value::Color(power));
            (dict, "medium")
        }
    };

    if let Some(medium) = &lamp.exterior_medium {
        let medium_id = ctx.require_medium(medium)?;
        dict.set(medium_slot, SceneDict::reference(medium_id).into());
    }
    Ok(dict.with_id(id))
}
