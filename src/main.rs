mod demo_scenes;

use demo_scenes::{orbit_camera, DemoScene};
use log::{error, info};
use scene_pipeline::renderer::{HeadlessDevice, SceneProcessor};
use scene_pipeline::PipelineSettings;

//const ACTIVE_SCENE: DemoScene = DemoScene::ShadowTest;

const ACTIVE_SCENE: DemoScene = DemoScene::Grid {
    size: 6,
    num_lights: 24,
    seed: 7,
};

const NUM_FRAMES: usize = 120;
const TIME_STEP: f32 = 1.0 / 60.0;
const SETTINGS_PATH: &str = "pipeline_settings.json";

fn main() {
    scene_pipeline::init_logging();
    info!("Starting headless scene pipeline demo: {:?}", ACTIVE_SCENE);

    let settings = PipelineSettings::load_from_path(SETTINGS_PATH);
    let mut scene = ACTIVE_SCENE.build();
    let mut processor = SceneProcessor::new(settings);
    let mut device = HeadlessDevice::new();

    let start = scene.camera().position;
    let radius = start.x.hypot(start.z);
    let height = start.y;

    for frame in 0..NUM_FRAMES {
        scene.update(TIME_STEP as f64);
        let time = scene.time() as f32;
        scene.set_camera(orbit_camera(time * 0.2, radius, height));

        if let Err(err) = processor.define(&[*scene.camera()]) {
            error!("Frame {}: {}", frame, err);
            return;
        }

        device.clear_frame();
        let snapshot = scene.snapshot();
        processor.update(&snapshot, TIME_STEP, &mut device);
        let stats = processor.render(&mut device);

        if frame % 30 == 0 {
            info!(
                "Frame {}: {} geometries, {} lights ({} shadowed), {} batches in {} draw calls, {} skipped",
                frame,
                stats.num_geometries,
                stats.num_lights,
                stats.num_shadowed_lights,
                stats.num_batches,
                stats.num_draw_calls,
                stats.num_batches_skipped
            );
        }
    }

    info!(
        "Done: {} pipeline states, {} shadow atlas pages",
        device.pipeline_states().len(),
        device.atlas_pages().len()
    );
}
