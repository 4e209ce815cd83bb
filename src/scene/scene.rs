use std::sync::Arc;

use glam::Vec3;
use hecs::World;

use super::internal::{animations, snapshot};
use crate::math::{Frustum, Sphere};
use crate::scene::builder::EntityBuilder;
use crate::scene::drawable::{DrawableData, DrawableIndex};
use crate::scene::light::{LightData, LightId, LightType};
use crate::scene::material::MaterialLibrary;
use crate::scene::query::{LightIndex, SpatialQuery};
use crate::scene::Camera;

pub struct Scene {
    pub world: World,
    materials: Arc<MaterialLibrary>,
    camera: Camera,
    ambient_color: Vec3,
    time: f64,
    next_light_id: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            materials: Arc::new(MaterialLibrary::default()),
            camera: Camera::default(),
            ambient_color: Vec3::splat(0.1),
            time: 0.0,
            next_light_id: 1,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn ambient_color(&self) -> Vec3 {
        self.ambient_color
    }

    pub fn set_ambient_color(&mut self, color: Vec3) {
        self.ambient_color = color;
    }

    pub fn materials(&self) -> &MaterialLibrary {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialLibrary {
        Arc::make_mut(&mut self.materials)
    }

    pub fn spawn(&mut self) -> EntityBuilder<'_> {
        EntityBuilder::new(&mut self.world)
    }

    /// Hands out a light id that stays unique for the lifetime of the scene.
    pub fn allocate_light_id(&mut self) -> LightId {
        let id = LightId(self.next_light_id);
        self.next_light_id += 1;
        id
    }

    pub fn update(&mut self, dt: f64) {
        self.time += dt;
        animations::update_rotate_animations(&mut self.world, dt);
        animations::update_orbit_animations(&mut self.world, self.time);
    }

    /// Resolves world placement of every visible drawable and light for one frame.
    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            drawables: snapshot::collect_drawables(&self.world),
            lights: snapshot::collect_lights(&self.world),
            materials: Arc::clone(&self.materials),
            ambient_color: self.ambient_color,
        }
    }
}

/// Immutable view of the scene for one frame.
#[derive(Clone)]
pub struct SceneSnapshot {
    pub drawables: Vec<DrawableData>,
    pub lights: Vec<LightData>,
    pub materials: Arc<MaterialLibrary>,
    pub ambient_color: Vec3,
}

impl SceneSnapshot {
    pub fn new(drawables: Vec<DrawableData>, lights: Vec<LightData>) -> Self {
        Self {
            drawables,
            lights,
            materials: Arc::new(MaterialLibrary::default()),
            ambient_color: Vec3::ZERO,
        }
    }

    pub fn with_materials(mut self, materials: MaterialLibrary) -> Self {
        self.materials = Arc::new(materials);
        self
    }

    pub fn with_ambient(mut self, color: Vec3) -> Self {
        self.ambient_color = color;
        self
    }
}

impl SpatialQuery for SceneSnapshot {
    fn query_drawables(&self, frustum: &Frustum, view_mask: u32, out: &mut Vec<DrawableIndex>) {
        out.extend(
            self.drawables
                .iter()
                .enumerate()
                .filter(|(_, d)| d.drawable.view_mask & view_mask != 0)
                .filter(|(_, d)| frustum.intersects_box(&d.world_bounds))
                .map(|(i, _)| i),
        );
    }

    fn query_drawables_in_sphere(&self, sphere: &Sphere, view_mask: u32, out: &mut Vec<DrawableIndex>) {
        out.extend(
            self.drawables
                .iter()
                .enumerate()
                .filter(|(_, d)| d.drawable.view_mask & view_mask != 0)
                .filter(|(_, d)| sphere.intersects_box(&d.world_bounds))
                .map(|(i, _)| i),
        );
    }

    fn query_lights(&self, frustum: &Frustum, view_mask: u32, out: &mut Vec<LightIndex>) {
        out.extend(
            self.lights
                .iter()
                .enumerate()
                .filter(|(_, l)| l.light.view_mask & view_mask != 0)
                .filter(|(_, l)| match l.light_type() {
                    LightType::Directional => true,
                    LightType::Point => frustum.intersects_sphere(&l.sphere()),
                    LightType::Spot => frustum.intersects_frustum(&l.frustum()),
                })
                .map(|(i, _)| i),
        );
    }

    fn query_occluders(&self, frustum: &Frustum, view_mask: u32, out: &mut Vec<DrawableIndex>) {
        out.extend(
            self.drawables
                .iter()
                .enumerate()
                .filter(|(_, d)| d.drawable.occluder && d.drawable.view_mask & view_mask != 0)
                .filter(|(_, d)| frustum.intersects_box(&d.world_bounds))
                .map(|(i, _)| i),
        );
    }

    fn drawable(&self, index: DrawableIndex) -> &DrawableData {
        &self.drawables[index]
    }

    fn light(&self, index: LightIndex) -> &LightData {
        &self.lights[index]
    }

    fn num_drawables(&self) -> usize {
        self.drawables.len()
    }
}
