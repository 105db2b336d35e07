//! Camera to sensor conversion.

use glam::{DMat4, DVec3};

use super::{BuildContext, SourceKey};
use crate::dict::{SceneDict, Value};
use crate::error::EntityResult;
use crate::scene::{Camera, Projection, SceneModel};

/// Source cameras look down local -Z; sensors look down +Z with X mirrored.
fn view_flip() -> DMat4 {
    DMat4::from_scale(DVec3::new(-1.0, 1.0, -1.0))
}

/// Build the sensor for the camera owned by `object`, placed at `world`,
/// with film, filter and sampler nested inside.
///
/// The returned dictionary already carries its id; emit it directly.
pub fn build_camera<S: SceneModel + ?Sized>(
    ctx: &mut BuildContext<'_, S>,
    object: &str,
    camera: &Camera,
    world: DMat4,
) -> EntityResult<SceneDict> {
    let id = ctx.id_for(&SourceKey::Camera(object.to_string()))?;
    let scene = ctx.scene();
    let settings = scene.settings();
    let (width, height) = scene.resolution();

    let world = world * view_flip();
    let mut sensor = match camera.projection {
        Projection::Perspective { fov } => SceneDict::new("perspective")
            .with("fov", Value::Float(fov))
            .with("fovAxis", Value::String("x".into()))
            .with("toWorld", Value::Transform(world)),
        Projection::Orthographic { scale } => SceneDict::new("orthographic").with(
            "toWorld",
            Value::Transform(world * DMat4::from_scale(DVec3::new(scale, scale, 1.0))),
        ),
    }
    .with_id(id)
    .with("nearClip", Value::Float(camera.near_clip))
    .with("farClip", Value::Float(camera.far_clip));

    let mut film = ctx.plugin_dict(&settings.film)?;
    film.set("width", Value::Integer(i64::from(width)));
    film.set("height", Value::Integer(i64::from(height)));
    film.set("rfilter", ctx.plugin_dict(&settings.rfilter)?.into());

    sensor.set("sampler", ctx.plugin_dict(&settings.sampler)?.into());
    sensor.set("film", film.into());

    if let Some(medium) = &camera.exterior_medium {
        let medium_id = ctx.require_medium(medium)?;
        sensor.set("exterior", SceneDict::reference(medium_id).into());
    }
    Ok(sensor)
}
