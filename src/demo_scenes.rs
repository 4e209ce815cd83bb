use glam::{Quat, Vec3};
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use scene_pipeline::math::BoundingBox;
use scene_pipeline::scene::{
    Camera, Drawable, GeometryId, Light, LightImportance, Material, MaterialId, Scene, Technique, Transform,
};

const CUBE_GEOMETRY: GeometryId = GeometryId(1);

#[allow(dead_code)]
#[derive(Clone, Copy, Debug)]
pub enum DemoScene {
    /// Floor and one cube lit by a shadowed sun and a point fill light.
    ShadowTest,
    /// Grid of cubes with many small point and spot lights.
    Grid { size: i32, num_lights: usize, seed: u64 },
}

impl DemoScene {
    pub fn build(self) -> Scene {
        let mut scene = Scene::new();
        let materials = DemoMaterials::register(&mut scene);
        match self {
            DemoScene::ShadowTest => setup_shadow_test_scene(&mut scene, &materials),
            DemoScene::Grid { size, num_lights, seed } => {
                setup_grid_scene(&mut scene, &materials, size, num_lights, seed)
            }
        }
        scene
    }
}

struct DemoMaterials {
    lit: MaterialId,
    unlit: MaterialId,
    glass: MaterialId,
}

impl DemoMaterials {
    fn register(scene: &mut Scene) -> Self {
        let materials = scene.materials_mut();
        Self {
            lit: materials.add(Material::new("lit", Technique::forward_lit())),
            unlit: materials.add(Material::new("unlit", Technique::unlit())),
            glass: materials.add(Material::new("glass", Technique::lit_transparent()).with_render_order(200)),
        }
    }
}

fn unit_cube(material: MaterialId) -> Drawable {
    Drawable::new(BoundingBox::from_center_half_size(Vec3::ZERO, Vec3::splat(0.5)))
        .with_batch(CUBE_GEOMETRY, material)
        .with_shadows()
}

/// Camera circling the origin.
pub fn orbit_camera(time: f32, radius: f32, height: f32) -> Camera {
    let eye = Vec3::new(time.cos() * radius, height, time.sin() * radius);
    Camera::look_at(eye, Vec3::ZERO, Vec3::Y)
}

fn setup_shadow_test_scene(scene: &mut Scene, materials: &DemoMaterials) {
    info!("Creating shadow map test scene...");

    scene
        .spawn()
        .with_name("Shadow Test Floor")
        .with_transform(Transform::from_trs(
            Vec3::new(0.0, -0.05, 0.0),
            Quat::IDENTITY,
            Vec3::new(25.0, 0.1, 25.0),
        ))
        .with_drawable(unit_cube(materials.lit).as_occluder())
        .spawn();

    scene
        .spawn()
        .with_name("Shadow Test Cube")
        .with_transform(Transform::from_trs(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY, Vec3::splat(1.5)))
        .with_drawable(unit_cube(materials.lit))
        .with_rotation_animation(Vec3::Y, 0.5)
        .spawn();

    let sun_direction = Vec3::new(-0.6, -1.0, -0.4).normalize();
    let sun = scene.allocate_light_id();
    scene
        .spawn()
        .with_name("Shadow Test Sun")
        .with_transform(Transform::facing(Vec3::ZERO, sun_direction))
        .with_light(sun, Light::directional().with_brightness(6.0).with_shadows())
        .spawn();

    let fill = scene.allocate_light_id();
    scene
        .spawn()
        .with_name("Shadow Test Fill")
        .with_transform(Transform::from_translation(Vec3::new(3.0, 4.0, 2.0)))
        .with_light(
            fill,
            Light::point(20.0)
                .with_color(Vec3::new(0.9, 0.95, 1.0))
                .with_brightness(2.0)
                .with_shadows(),
        )
        .spawn();

    scene.set_ambient_color(Vec3::splat(0.1));
    scene.set_camera(orbit_camera(0.0, 8.0, 4.0));
}

fn setup_grid_scene(scene: &mut Scene, materials: &DemoMaterials, size: i32, num_lights: usize, seed: u64) {
    info!("Creating {0}x{0} grid scene with {1} lights...", size * 2 + 1, num_lights);
    let mut rng = SmallRng::seed_from_u64(seed);

    scene
        .spawn()
        .with_name("Grid Floor")
        .with_transform(Transform::from_trs(
            Vec3::new(0.0, -0.05, 0.0),
            Quat::IDENTITY,
            Vec3::new(size as f32 * 4.0 + 4.0, 0.1, size as f32 * 4.0 + 4.0),
        ))
        .with_drawable(unit_cube(materials.lit).as_occluder())
        .spawn();

    for x in -size..=size {
        for z in -size..=size {
            let material = match rng.gen_range(0..10) {
                0 => materials.glass,
                1 => materials.unlit,
                _ => materials.lit,
            };
            let mut drawable = unit_cube(material);
            drawable.outlined = rng.gen_bool(0.05);
            scene
                .spawn()
                .with_name(format!("Cube {x} {z}"))
                .with_transform(Transform::from_trs(
                    Vec3::new(x as f32 * 2.0, 0.5, z as f32 * 2.0),
                    Quat::from_rotation_y(rng.gen_range(0.0..std::f32::consts::TAU)),
                    Vec3::splat(rng.gen_range(0.5..1.2)),
                ))
                .with_drawable(drawable)
                .spawn();
        }
    }

    let extent = size as f32 * 2.0;
    for i in 0..num_lights {
        let id = scene.allocate_light_id();
        let position = Vec3::new(
            rng.gen_range(-extent..=extent),
            rng.gen_range(1.0..4.0),
            rng.gen_range(-extent..=extent),
        );
        let color = Vec3::new(rng.gen_range(0.2..1.0), rng.gen_range(0.2..1.0), rng.gen_range(0.2..1.0));
        let mut light = if rng.gen_bool(0.3) {
            Light::spot(rng.gen_range(4.0..10.0), rng.gen_range(0.4..1.2))
        } else {
            Light::point(rng.gen_range(2.0..6.0))
        }
        .with_color(color);
        if i % 8 == 0 {
            light = light.with_shadows().with_importance(LightImportance::Important);
        }

        let transform = Transform::facing(position, Vec3::new(0.0, -1.0, 0.1));
        let orbit_radius = Vec3::new(position.x, 0.0, position.z).length();
        scene
            .spawn()
            .with_name(format!("Light {i}"))
            .with_transform(transform)
            .with_light(id, light)
            .with_orbit_animation(Vec3::new(0.0, position.y, 0.0), orbit_radius, 0.2, i as f32)
            .spawn();
    }

    let sun = scene.allocate_light_id();
    scene
        .spawn()
        .with_name("Grid Sun")
        .with_transform(Transform::facing(Vec3::ZERO, Vec3::new(-0.3, -1.0, -0.2)))
        .with_light(sun, Light::directional().with_brightness(0.5).with_shadows())
        .spawn();

    scene.set_ambient_color(Vec3::splat(0.05));
    scene.set_camera(orbit_camera(0.0, extent + 6.0, extent * 0.5 + 4.0));
}
