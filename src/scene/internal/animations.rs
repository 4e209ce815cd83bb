use crate::scene::components::{OrbitAnimation, RotateAnimation, TransformComponent};
use glam::{Quat, Vec3};
use hecs::World;
use rayon::prelude::*;

pub(crate) fn update_rotate_animations(world: &mut World, dt: f64) {
    let entities: Vec<_> = world
        .query::<(&TransformComponent, &RotateAnimation)>()
        .iter()
        .map(|(entity, (transform, anim))| (entity, transform.0, *anim))
        .collect();

    let updates: Vec<_> = entities
        .par_iter()
        .map(|(entity, transform, anim)| {
            let rotation = Quat::from_axis_angle(anim.axis.normalize_or_zero(), anim.speed * dt as f32);
            (*entity, (rotation * transform.rotation).normalize())
        })
        .collect();

    for (entity, new_rotation) in updates {
        if let Ok(mut transform) = world.get::<&mut TransformComponent>(entity) {
            transform.0.rotation = new_rotation;
        }
    }
}

pub(crate) fn update_orbit_animations(world: &mut World, time: f64) {
    let time = time as f32;

    let entities: Vec<_> = world
        .query::<(&TransformComponent, &OrbitAnimation)>()
        .iter()
        .map(|(entity, (_, orbit))| (entity, *orbit))
        .collect();

    let updates: Vec<_> = entities
        .par_iter()
        .map(|(entity, orbit)| {
            let angle = time * orbit.speed + orbit.offset;
            let new_translation = orbit.center
                + Vec3::new(
                    angle.cos() * orbit.radius,
                    (time + orbit.offset).sin() * 0.5,
                    angle.sin() * orbit.radius,
                );
            (*entity, new_translation)
        })
        .collect();

    for (entity, new_translation) in updates {
        if let Ok(mut transform) = world.get::<&mut TransformComponent>(entity) {
            transform.0.translation = new_translation;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Transform;

    #[test]
    fn orbit_moves_entity_around_center() {
        let mut world = World::new();
        let entity = world.spawn((
            TransformComponent(Transform::default()),
            OrbitAnimation {
                center: Vec3::new(10.0, 0.0, 0.0),
                radius: 2.0,
                speed: 1.0,
                offset: 0.0,
            },
        ));
        update_orbit_animations(&mut world, 0.0);
        let transform = world.get::<&TransformComponent>(entity).map(|t| t.0).unwrap();
        assert!((transform.translation - Vec3::new(12.0, 0.0, 0.0)).length() < 1e-5);
    }
}
