// scene/builder.rs
// Fluent helper over hecs::EntityBuilder

use glam::Vec3;
use hecs::World;

use super::components::*;
use crate::scene::{Drawable, Light, LightId, Transform};

/// Helper for building entities with a fluent API
pub struct EntityBuilder<'w> {
    world: &'w mut World,
    builder: hecs::EntityBuilder,
}

impl<'w> EntityBuilder<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Self {
            world,
            builder: hecs::EntityBuilder::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.builder.add(Name::new(name));
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.builder.add(TransformComponent(transform));
        self
    }

    pub fn with_drawable(mut self, drawable: Drawable) -> Self {
        self.builder.add(drawable);
        self
    }

    /// Lights need a stable id so their processors survive across frames.
    pub fn with_light(mut self, id: LightId, light: Light) -> Self {
        self.builder.add(light);
        self.builder.add(id);
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.builder.add(Visible(visible));
        self
    }

    pub fn with_rotation_animation(mut self, axis: Vec3, speed: f32) -> Self {
        self.builder.add(RotateAnimation { axis, speed });
        self
    }

    pub fn with_orbit_animation(mut self, center: Vec3, radius: f32, speed: f32, offset: f32) -> Self {
        self.builder.add(OrbitAnimation {
            center,
            radius,
            speed,
            offset,
        });
        self
    }

    /// Spawn the entity into the world
    pub fn spawn(&mut self) -> hecs::Entity {
        self.world.spawn(self.builder.build())
    }
}
