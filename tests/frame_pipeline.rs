use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use scene_pipeline::math::BoundingBox;
use scene_pipeline::renderer::{
    DeviceCapabilities, GraphicsDevice, HeadlessDevice, LightShaderParamsRaw, PassTarget, RenderPipelineStats,
    SceneProcessor,
};
use scene_pipeline::scene::{
    Camera, Drawable, DrawableData, GeometryId, Light, LightData, LightId, Material, MaterialId, MaterialLibrary,
    PassId, SceneSnapshot, Technique,
};
use scene_pipeline::{LightingMode, PipelineSettings};

const TIME_STEP: f32 = 1.0 / 60.0;

struct TestScene {
    snapshot: SceneSnapshot,
    camera: Camera,
}

fn cube(center: Vec3, scale: Vec3, material: MaterialId) -> DrawableData {
    let drawable = Drawable::new(BoundingBox::from_center_half_size(Vec3::ZERO, Vec3::splat(0.5)))
        .with_batch(GeometryId(1), material)
        .with_shadows();
    DrawableData::new(drawable, Mat4::from_scale_rotation_translation(scale, Quat::IDENTITY, center))
}

/// Floor, two cubes, a shadowed sun and `num_point_lights` unshadowed point lights
/// around the first cube.
fn build_scene(num_point_lights: usize) -> TestScene {
    let mut materials = MaterialLibrary::default();
    let lit = materials.add(Material::new("lit", Technique::forward_lit()));
    let glass = materials.add(Material::new("glass", Technique::lit_transparent()).with_render_order(200));

    let drawables = vec![
        cube(Vec3::new(0.0, -0.05, 0.0), Vec3::new(20.0, 0.1, 20.0), lit),
        cube(Vec3::new(0.0, 0.5, 0.0), Vec3::ONE, lit),
        cube(Vec3::new(2.0, 0.5, 1.0), Vec3::ONE, glass),
    ];

    let sun_direction = Vec3::new(-0.5, -1.0, -0.3).normalize();
    let mut lights = vec![LightData::new(
        LightId(0),
        Light::directional().with_shadows(),
        Vec3::ZERO,
        Quat::from_rotation_arc(Vec3::NEG_Z, sun_direction),
    )];
    for i in 0..num_point_lights {
        let angle = i as f32 / num_point_lights as f32 * std::f32::consts::TAU;
        lights.push(LightData::new(
            LightId(i as u64 + 1),
            Light::point(6.0),
            Vec3::new(angle.cos() * 1.5, 1.0, angle.sin() * 1.5),
            Quat::IDENTITY,
        ));
    }

    TestScene {
        snapshot: SceneSnapshot::new(drawables, lights)
            .with_materials(materials)
            .with_ambient(Vec3::splat(0.1)),
        camera: Camera::look_at(Vec3::new(0.0, 4.0, 8.0), Vec3::ZERO, Vec3::Y),
    }
}

fn run_frame(
    settings: PipelineSettings,
    scene: &TestScene,
    device: &mut HeadlessDevice,
) -> (SceneProcessor, RenderPipelineStats) {
    let mut processor = SceneProcessor::new(settings);
    processor.define(&[scene.camera]).expect("one camera is valid");
    processor.update(&scene.snapshot, TIME_STEP, device);
    let stats = processor.render(device);
    (processor, stats)
}

fn scene_pass_position(device: &HeadlessDevice, name: &str) -> Option<usize> {
    device
        .passes()
        .iter()
        .position(|pass| matches!(pass, PassTarget::Scene { pass_name } if pass_name == name))
}

#[test]
fn forward_frame_renders_shadows_before_scene_passes() {
    let scene = build_scene(2);
    let mut device = HeadlessDevice::new();
    let (processor, stats) = run_frame(PipelineSettings::default(), &scene, &mut device);

    assert_eq!(stats.num_lights, 3);
    assert_eq!(stats.num_shadowed_lights, 1);
    assert_eq!(stats.num_geometries, 3);
    assert_eq!(stats.num_batches_skipped, 0);
    assert_eq!(stats.num_batches_submitted, stats.num_batches);
    assert_eq!(stats.num_draw_calls, device.commands().len());

    assert_eq!(device.num_uploaded_lights(), 3);
    assert_eq!(device.light_buffer().len(), 3 * std::mem::size_of::<LightShaderParamsRaw>());

    let num_shadow_passes = device
        .passes()
        .iter()
        .filter(|pass| matches!(pass, PassTarget::ShadowSplit { .. }))
        .count();
    assert!(num_shadow_passes > 0);
    assert_eq!(num_shadow_passes, processor.batch_compositor().shadow_batches().len());
    assert!(matches!(device.passes()[0], PassTarget::ShadowSplit { .. }));

    let opaque = scene_pass_position(&device, "opaque").expect("opaque pass rendered");
    let alpha = scene_pass_position(&device, "alpha").expect("alpha pass rendered");
    let outline = scene_pass_position(&device, "outline").expect("outline pass rendered");
    assert!(opaque >= num_shadow_passes && opaque < alpha && alpha < outline);
    assert!(!device.passes().contains(&PassTarget::LightVolumes));
    assert!(processor.batch_compositor().light_volume_batches().is_empty());
}

#[test]
fn deferred_frame_draws_light_volumes_after_gbuffer() {
    let scene = build_scene(2);
    let mut device = HeadlessDevice::new();
    let settings = PipelineSettings {
        lighting_mode: LightingMode::DeferredBlinnPhong,
        ..PipelineSettings::default()
    };
    let (processor, stats) = run_frame(settings, &scene, &mut device);

    let deferred = scene_pass_position(&device, "deferred").expect("deferred pass rendered");
    assert_eq!(device.passes()[deferred + 1], PassTarget::LightVolumes);
    assert!(scene_pass_position(&device, "opaque").is_none());

    let volumes = processor.batch_compositor().light_volume_batches();
    assert!(!volumes.is_empty());
    assert!(volumes.len() <= stats.num_lights);
    assert!(device
        .pipeline_states()
        .iter()
        .any(|desc| desc.shader == "deferred_light"));
    assert_eq!(stats.num_batches_skipped, 0);
}

#[test]
fn deferred_frame_keeps_materials_without_gbuffer_pass() {
    let mut materials = MaterialLibrary::default();
    let unlit = materials.add(Material::new("unlit", Technique::unlit()));
    let scene = TestScene {
        snapshot: SceneSnapshot::new(vec![cube(Vec3::ZERO, Vec3::ONE, unlit)], Vec::new()).with_materials(materials),
        camera: Camera::look_at(Vec3::new(0.0, 2.0, 6.0), Vec3::ZERO, Vec3::Y),
    };

    for lighting_mode in [LightingMode::Forward, LightingMode::DeferredBlinnPhong, LightingMode::DeferredPbr] {
        let mut device = HeadlessDevice::new();
        let settings = PipelineSettings {
            lighting_mode,
            ..PipelineSettings::default()
        };
        let (processor, stats) = run_frame(settings, &scene, &mut device);

        let opaque = &processor.batch_compositor().scene_batches()[0];
        assert_eq!(opaque.len(), 1, "{:?}", lighting_mode);
        assert_eq!(opaque.batches[0].pass, PassId::BASE);
        assert_eq!(opaque.batches[0].drawable_index, 0);
        assert_eq!(stats.num_batches_submitted, stats.num_batches);
        assert!(device
            .pipeline_states()
            .iter()
            .any(|desc| desc.shader == "unlit_solid"));
    }
}

#[test]
fn pbr_mode_uses_pbr_light_volumes() {
    let scene = build_scene(1);
    let mut device = HeadlessDevice::new();
    let settings = PipelineSettings {
        lighting_mode: LightingMode::DeferredPbr,
        ..PipelineSettings::default()
    };
    run_frame(settings, &scene, &mut device);

    let shaders: Vec<&str> = device.pipeline_states().iter().map(|desc| desc.shader.as_str()).collect();
    assert!(shaders.contains(&"deferred_light_pbr"));
    assert!(!shaders.contains(&"deferred_light"));
}

#[test]
fn rejected_shaders_are_skipped_not_fatal() {
    let scene = build_scene(2);
    let mut device = HeadlessDevice::new();
    device.reject_shader("lit_solid_litbase");
    device.reject_shader("shadow");
    let (_, stats) = run_frame(PipelineSettings::default(), &scene, &mut device);

    assert!(stats.num_batches_skipped > 0);
    assert_eq!(stats.num_batches_submitted + stats.num_batches_skipped, stats.num_batches);
    assert!(device
        .commands()
        .iter()
        .all(|command| device.pipeline_states()[command.pipeline_state.0 as usize].shader != "shadow"));
}

#[test]
fn pixel_and_vertex_light_limits_apply_per_drawable() {
    let scene = build_scene(6);
    let mut device = HeadlessDevice::new();
    let settings = PipelineSettings {
        enable_shadows: false,
        max_pixel_lights: 1,
        max_vertex_lights: 4,
        ..PipelineSettings::default()
    };
    let (processor, _) = run_frame(settings, &scene, &mut device);

    // The centre cube is inside every point light
    let lighting = processor
        .drawable_processor()
        .geometry_lighting(1)
        .expect("visible drawable has lighting");
    assert_eq!(lighting.get_pixel_lights().len(), 1);
    assert_eq!(lighting.num_lights(), 5);
    assert!(lighting.spherical_harmonics.evaluate_average().x > 0.0);
    assert!(lighting.vertex_lights_hash() != 0);
}

#[test]
fn second_camera_adds_its_drawables() {
    let scene = build_scene(0);
    let mut device = HeadlessDevice::new();
    let mut processor = SceneProcessor::new(PipelineSettings::default());

    let narrow = Camera {
        fov_y_radians: 5f32.to_radians(),
        ..Camera::look_at(Vec3::new(0.0, 4.0, 8.0), Vec3::new(0.0, 0.5, 0.0), Vec3::Y)
    };
    processor.define(&[narrow]).expect("one camera is valid");
    processor.update(&scene.snapshot, TIME_STEP, &mut device);
    let single = processor.stats().num_geometries;

    processor.define(&[narrow, scene.camera]).expect("matching cameras are valid");
    processor.update(&scene.snapshot, TIME_STEP, &mut device);
    let both = processor.stats().num_geometries;

    assert!(single < both);
    assert_eq!(both, 3);
}

#[test]
fn light_processors_are_reused_between_frames() {
    let scene = build_scene(3);
    let mut device = HeadlessDevice::new();
    let mut processor = SceneProcessor::new(PipelineSettings::default());
    processor.define(&[scene.camera]).expect("one camera is valid");

    for _ in 0..3 {
        device.clear_frame();
        processor.update(&scene.snapshot, TIME_STEP, &mut device);
        processor.render(&mut device);
    }

    let cache = processor.drawable_processor().light_processor_cache();
    assert_eq!(cache.len(), 4);
    for light in &scene.snapshot.lights {
        assert!(cache.contains(light.id));
    }
    // Pipeline states survive across frames
    let num_states = device.pipeline_states().len();
    processor.update(&scene.snapshot, TIME_STEP, &mut device);
    assert_eq!(device.pipeline_states().len(), num_states);
}

#[test]
fn composition_does_not_depend_on_thread_count() {
    let scene = build_scene(4);
    let compose_with = |threads: usize| {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("thread pool");
        let mut processor = SceneProcessor::new(PipelineSettings::default()).with_thread_pool(Arc::new(pool));
        let mut device = HeadlessDevice::new();
        processor.define(&[scene.camera]).expect("one camera is valid");
        processor.update(&scene.snapshot, TIME_STEP, &mut device);
        processor
            .batch_compositor()
            .scene_batches()
            .iter()
            .flat_map(|sorted| {
                sorted.order.iter().map(move |&i| {
                    let batch = &sorted.batches[i];
                    (batch.drawable_index, batch.pass, batch.pixel_light, batch.pipeline_state_key)
                })
            })
            .collect::<Vec<_>>()
    };

    let serial = compose_with(1);
    assert!(!serial.is_empty());
    assert_eq!(serial, compose_with(4));
}

#[test]
fn capabilities_limit_instancing() {
    let scene = build_scene(0);
    let mut device = HeadlessDevice::with_capabilities(DeviceCapabilities {
        supports_instancing: false,
        ..Default::default()
    });
    run_frame(PipelineSettings::default(), &scene, &mut device);

    assert!(device.capabilities().max_shadow_atlas_pages > 0);
    assert!(device
        .pipeline_states()
        .iter()
        .all(|desc| !desc.defines.iter().any(|define| define == "INSTANCED")));
    assert!(device.commands().iter().all(|command| command.num_instances == 1));
}
