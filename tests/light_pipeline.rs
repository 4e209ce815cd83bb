use glam::{Mat4, Quat, Vec3};
use scene_pipeline::math::{BoundingBox, FloatRange, SphericalHarmonicsDot9};
use scene_pipeline::renderer::device::HeadlessDevice;
use scene_pipeline::renderer::light_accumulator::{
    INVALID_LIGHT_INDEX, LIGHT_ACCUMULATOR_CAPACITY, MAX_PIXEL_LIGHTS, MAX_VERTEX_LIGHTS,
};
use scene_pipeline::renderer::light_processor::active_cascade_splits;
use scene_pipeline::renderer::{
    DrawableUpdateFlags, LightAccumulator, LightAccumulatorContext, LightDataForAccumulator, LightProcessorContext,
    SceneProcessor, ShadowSplitProcessor,
};
use scene_pipeline::scene::{
    Camera, CascadeParameters, Drawable, DrawableData, GeometryId, Light, LightData, LightId, LightImportance,
    Material, MaterialId, MaterialLibrary, SceneSnapshot, Technique, MAX_CASCADE_SPLITS,
};
use scene_pipeline::PipelineSettings;

const EPSILON: f32 = 1e-3;

fn sun(cascade: CascadeParameters) -> LightData {
    let mut light = Light::directional().with_shadows();
    light.cascade = cascade;
    let direction = Vec3::new(-0.4, -1.0, -0.3).normalize();
    LightData::new(LightId(1), light, Vec3::ZERO, Quat::from_rotation_arc(Vec3::NEG_Z, direction))
}

fn far_camera() -> Camera {
    Camera {
        far: 1000.0,
        ..Camera::look_at(Vec3::new(0.0, 5.0, 10.0), Vec3::new(0.0, 0.0, -20.0), Vec3::Y)
    }
}

fn cube_at(center: Vec3, material: MaterialId) -> DrawableData {
    let drawable = Drawable::new(BoundingBox::from_center_half_size(Vec3::ZERO, Vec3::splat(0.5)))
        .with_batch(GeometryId(1), material)
        .with_shadows();
    DrawableData::new(drawable, Mat4::from_translation(center))
}

fn initialize_cascades(camera: &Camera, light: &LightData, scene_z_range: FloatRange) -> Vec<ShadowSplitProcessor> {
    let scene = SceneSnapshot::new(Vec::new(), Vec::new());
    let update_flags = DrawableUpdateFlags::default();
    let ctx = LightProcessorContext {
        cull_camera: camera,
        scene: &scene,
        geometries: &[],
        geometry_flags: &[],
        geometry_z_ranges: &[],
        scene_z_range,
        update_flags: &update_flags,
        pcf_kernel_size: 1,
        normal_offset_scale: 1.0,
    };

    active_cascade_splits(&light.light.cascade, camera.near, camera.far)
        .into_iter()
        .enumerate()
        .map(|(index, range)| {
            let mut split = ShadowSplitProcessor::new(index);
            split.initialize_directional(&ctx, light, range, &[]);
            split
        })
        .collect()
}

#[test]
fn focused_cascades_stay_inside_scene_depth() {
    let camera = far_camera();
    let light = sun(CascadeParameters::new([10.0, 50.0, 200.0, 1000.0]));
    let scene_z_range = FloatRange::new(1.0, 1000.0);
    let splits = initialize_cascades(&camera, &light, scene_z_range);
    assert_eq!(splits.len(), 4);

    let mut previous_width = 0.0;
    for split in &splits {
        let cascade = split.cascade_z_range();
        let focused = split.focused_z_range();
        assert!(focused.is_valid());
        assert!(cascade.intersection(scene_z_range).contains_range(focused));

        let bounds = split.light_space_bounds();
        assert!(bounds.is_defined());
        assert!(bounds.size().z > 0.0);
        assert!(split.shadow_camera().far > 0.0);
        assert!(split.shadow_camera().orthographic);

        // Farther cascades cover more of the view
        let width = bounds.size().x.max(bounds.size().y);
        assert!(width + EPSILON >= previous_width);
        previous_width = width;
    }
}

#[test]
fn cascades_beyond_scene_depth_lose_their_focus() {
    let camera = far_camera();
    let light = sun(CascadeParameters::new([10.0, 50.0, 200.0, 1000.0]));
    let scene_z_range = FloatRange::new(5.0, 120.0);
    let splits = initialize_cascades(&camera, &light, scene_z_range);

    assert!((splits[0].focused_z_range().min - 5.0).abs() < EPSILON);
    assert!((splits[2].focused_z_range().max - 120.0).abs() < EPSILON);
    assert!(!splits[3].focused_z_range().is_valid());
    // Without a focused range the whole cascade is covered
    assert!(splits[3].light_space_bounds().is_defined());
}

#[test]
fn unfocused_cascade_covers_whole_range() {
    let camera = far_camera();
    let mut light = sun(CascadeParameters::new([10.0, 50.0, 200.0, 1000.0]));
    light.light.focus.focus = false;
    let splits = initialize_cascades(&camera, &light, FloatRange::new(20.0, 30.0));

    for split in &splits {
        assert_eq!(split.focused_z_range(), split.cascade_z_range());
    }
}

#[test]
fn point_faces_outside_view_get_no_shadow_map() {
    let mut materials = MaterialLibrary::default();
    let lit = materials.add(Material::new("lit", Technique::forward_lit()));

    // Light behind the camera: the +Z face looks away from everything the camera sees
    let light = LightData::new(
        LightId(7),
        Light::point(10.0).with_shadows(),
        Vec3::new(0.0, 0.0, 6.0),
        Quat::IDENTITY,
    );
    let scene = SceneSnapshot::new(
        vec![
            cube_at(Vec3::new(0.0, 0.0, -1.0), lit),
            cube_at(Vec3::new(0.0, 0.0, 10.0), lit),
        ],
        vec![light],
    )
    .with_materials(materials);

    let camera = Camera::look_at(Vec3::new(0.0, 0.0, 3.0), Vec3::new(0.0, 0.0, -10.0), Vec3::Y);
    let mut processor = SceneProcessor::new(PipelineSettings::default());
    processor.define(&[camera]).expect("one camera is valid");
    let mut device = HeadlessDevice::new();
    processor.update(&scene, 0.016, &mut device);

    let lights = processor.drawable_processor().light_processors();
    assert_eq!(lights.len(), 1);
    let point = &lights[0];
    assert!(point.has_shadow());
    assert_eq!(point.num_active_splits(), 6);

    let back_face = &point.splits()[4];
    assert!(!back_face.has_shadow_casters());
    assert!(!back_face.shadow_map().is_valid());

    let front_face = &point.splits()[5];
    assert!(front_face.has_shadow_casters());
    assert!(front_face.shadow_map().is_valid());

    for split in processor.batch_compositor().shadow_batches() {
        assert_ne!(split.split_index, 4);
        assert!(split.region.is_valid());
    }
}

#[test]
fn directional_light_exposes_every_cascade_matrix() {
    let mut materials = MaterialLibrary::default();
    let lit = materials.add(Material::new("lit", Technique::forward_lit()));
    let scene = SceneSnapshot::new(
        vec![cube_at(Vec3::ZERO, lit)],
        vec![sun(CascadeParameters::new([10.0, 50.0, 0.0, 0.0]))],
    )
    .with_materials(materials);

    let camera = Camera::look_at(Vec3::new(0.0, 3.0, 6.0), Vec3::ZERO, Vec3::Y);
    let mut processor = SceneProcessor::new(PipelineSettings::default());
    processor.define(&[camera]).expect("one camera is valid");
    let mut device = HeadlessDevice::new();
    processor.update(&scene, 0.016, &mut device);

    let sun = &processor.drawable_processor().light_processors()[0];
    assert!(sun.has_shadow());
    assert_eq!(sun.num_active_splits(), 2);

    let params = sun.cooked_params();
    assert_eq!(params.num_light_matrices, MAX_CASCADE_SPLITS);
    assert_ne!(params.light_matrices[0], Mat4::IDENTITY);
    assert_ne!(params.light_matrices[1], Mat4::IDENTITY);
    assert_eq!(params.light_matrices[2], Mat4::IDENTITY);
    assert_eq!(params.light_matrices[3], Mat4::IDENTITY);
}

fn accumulator_lights(count: usize) -> Vec<LightDataForAccumulator> {
    (0..count)
        .map(|i| {
            let data = LightData::new(
                LightId(i as u64),
                Light::point(30.0).with_color(Vec3::new(1.0, 0.8, 0.6)),
                Vec3::new(i as f32 - 2.5, 3.0, 1.0),
                Quat::IDENTITY,
            );
            LightDataForAccumulator::from_light(&data, false)
        })
        .collect()
}

#[test]
fn surplus_lights_fold_into_ambient() {
    let lights = accumulator_lights(6);
    let ctx = LightAccumulatorContext {
        max_pixel_lights: 1,
        max_vertex_lights: 4,
        lights: &lights,
    };
    let bounds = BoundingBox::from_center_half_size(Vec3::ZERO, Vec3::splat(0.5));

    let mut accumulator = LightAccumulator::default();
    for (index, penalty) in [(3, 0.4), (0, 0.1), (5, 0.6), (1, 0.2), (4, 0.5), (2, 0.3)] {
        accumulator.accumulate_light(&ctx, &bounds, LightImportance::Auto, index, penalty);
    }
    accumulator.cook();

    assert_eq!(accumulator.get_pixel_lights(), &[(0.1, 0)]);
    assert_eq!(accumulator.get_vertex_lights(), [1, 2, 3, 4]);
    assert!(!accumulator.get_vertex_lights().contains(&INVALID_LIGHT_INDEX));
    // The dropped light still contributes through spherical harmonics
    assert!(accumulator.spherical_harmonics.evaluate_average().x > 0.0);
}

#[test]
fn equal_lights_split_between_pixel_and_vertex_slots() {
    let lights = accumulator_lights(5);
    let ctx = LightAccumulatorContext {
        max_pixel_lights: 1,
        max_vertex_lights: 4,
        lights: &lights,
    };
    let bounds = BoundingBox::from_center_half_size(Vec3::ZERO, Vec3::splat(0.5));

    let mut accumulator = LightAccumulator::default();
    for index in 0..5 {
        accumulator.accumulate_light(&ctx, &bounds, LightImportance::Auto, index, 0.5);
    }
    accumulator.cook();

    // Everything fits, so nothing reaches the ambient term
    assert_eq!(accumulator.num_lights(), 5);
    assert_eq!(accumulator.get_pixel_lights(), &[(0.5, 0)]);
    assert_eq!(accumulator.get_vertex_lights(), [1, 2, 3, 4]);
    assert_eq!(accumulator.spherical_harmonics, SphericalHarmonicsDot9::ZERO);
}

#[test]
fn important_lights_are_bounded_by_accumulator_capacity() {
    let lights = accumulator_lights(20);
    let ctx = LightAccumulatorContext {
        max_pixel_lights: MAX_PIXEL_LIGHTS,
        max_vertex_lights: MAX_VERTEX_LIGHTS,
        lights: &lights,
    };
    let bounds = BoundingBox::from_center_half_size(Vec3::ZERO, Vec3::splat(0.5));

    let mut accumulator = LightAccumulator::default();
    for index in 0..20 {
        accumulator.accumulate_light(&ctx, &bounds, LightImportance::Important, index, -1.0);
        assert!(accumulator.num_lights() < LIGHT_ACCUMULATOR_CAPACITY);
    }
    accumulator.cook();

    assert_eq!(accumulator.num_important_lights(), 20);
    assert_eq!(accumulator.num_lights(), LIGHT_ACCUMULATOR_CAPACITY - 1);
    // Equal penalties keep arrival order, so the latest lights are evicted
    let kept: Vec<u32> = accumulator.get_pixel_lights().iter().map(|&(_, index)| index).collect();
    assert_eq!(kept, (0..12).collect::<Vec<u32>>());
    assert_eq!(accumulator.get_vertex_lights(), [INVALID_LIGHT_INDEX; MAX_VERTEX_LIGHTS]);
    assert!(accumulator.spherical_harmonics.evaluate_average().x > 0.0);
}

#[test]
fn cooking_twice_changes_nothing() {
    let lights = accumulator_lights(6);
    let ctx = LightAccumulatorContext {
        max_pixel_lights: 2,
        max_vertex_lights: 2,
        lights: &lights,
    };
    let bounds = BoundingBox::from_center_half_size(Vec3::new(1.0, 0.0, 0.0), Vec3::splat(1.0));

    let mut accumulator = LightAccumulator::default();
    accumulator.accumulate_light(&ctx, &bounds, LightImportance::Important, 4, -1.0);
    for (index, penalty) in [(2, 0.7), (0, 0.2), (5, 0.9), (1, 0.4)] {
        accumulator.accumulate_light(&ctx, &bounds, LightImportance::Auto, index, penalty);
    }

    accumulator.cook();
    let hash = accumulator.vertex_lights_hash();
    let pixel_lights = accumulator.get_pixel_lights().to_vec();
    let vertex_lights = accumulator.get_vertex_lights();
    accumulator.cook();

    assert_eq!(accumulator.vertex_lights_hash(), hash);
    assert_eq!(accumulator.get_pixel_lights(), pixel_lights.as_slice());
    assert_eq!(accumulator.get_vertex_lights(), vertex_lights);
    assert_eq!(pixel_lights[0].1, 4);
}
