use crate::scene::components::{TransformComponent, Visible};
use crate::scene::drawable::{Drawable, DrawableData};
use crate::scene::light::{Light, LightData, LightId};
use crate::scene::transform::Transform;
use hecs::World;
use rayon::prelude::*;

struct DrawableEntity {
    drawable: Drawable,
    transform: Transform,
    visible: bool,
}

pub(crate) fn collect_drawables(world: &World) -> Vec<DrawableData> {
    let entities: Vec<DrawableEntity> = world
        .query::<(&Drawable, Option<&TransformComponent>, Option<&Visible>)>()
        .iter()
        .map(|(_entity, (drawable, transform, visible))| DrawableEntity {
            drawable: drawable.clone(),
            transform: transform.map(|t| t.0).unwrap_or_default(),
            visible: visible.map_or(true, |v| v.0),
        })
        .collect();

    entities
        .into_par_iter()
        .filter(|entity| entity.visible)
        .map(|entity| DrawableData::new(entity.drawable, entity.transform.matrix()))
        .collect()
}

pub(crate) fn collect_lights(world: &World) -> Vec<LightData> {
    let mut lights: Vec<LightData> = world
        .query::<(&Light, &LightId, Option<&TransformComponent>, Option<&Visible>)>()
        .iter()
        .filter(|(_entity, (_, _, _, visible))| visible.map_or(true, |v| v.0))
        .map(|(_entity, (light, id, transform, _))| {
            let transform = transform.map(|t| t.0).unwrap_or_default();
            LightData::new(*id, *light, transform.translation, transform.rotation)
        })
        .collect();
    // hecs iteration order depends on archetypes; keep frames deterministic
    lights.sort_by_key(|light| light.id);
    lights
}
