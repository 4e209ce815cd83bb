use log::warn;

use crate::renderer::batch_compositor::SortedBatches;
use crate::renderer::device::{DrawCommand, GraphicsDevice, PassTarget};
use crate::renderer::pipeline_batch::group_batches;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchRenderStats {
    pub draw_calls: usize,
    pub batches_submitted: usize,
    /// Batches dropped because their pipeline state could not be created.
    pub batches_skipped: usize,
}

impl BatchRenderStats {
    pub fn merge(&mut self, other: BatchRenderStats) {
        self.draw_calls += other.draw_calls;
        self.batches_submitted += other.batches_submitted;
        self.batches_skipped += other.batches_skipped;
    }
}

/// Submits sorted pipeline batches to a device, merging compatible neighbours into
/// instanced draw calls.
#[derive(Debug, Default)]
pub struct BatchRenderer {
    warned_missing_state: bool,
    total_skipped: usize,
}

impl BatchRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches skipped since this renderer was created.
    pub fn total_skipped(&self) -> usize {
        self.total_skipped
    }

    pub fn render_batches(
        &mut self,
        device: &mut dyn GraphicsDevice,
        target: &PassTarget,
        batches: &SortedBatches,
        instancing: bool,
    ) -> BatchRenderStats {
        let mut stats = BatchRenderStats::default();
        device.begin_pass(target);

        for group in group_batches(&batches.batches, batches.order.iter().copied(), instancing) {
            let Some(&first) = group.batches.first() else {
                continue;
            };
            let batch = &batches.batches[first];

            let Some(pipeline_state) = batch.pipeline_state else {
                if !self.warned_missing_state {
                    warn!(
                        "Skipping batches without pipeline state (geometry {:?}, material {:?}, pass {:?})",
                        batch.geometry, batch.material, batch.pass
                    );
                    self.warned_missing_state = true;
                }
                stats.batches_skipped += group.batches.len();
                continue;
            };

            device.submit(&DrawCommand {
                pipeline_state,
                geometry: batch.geometry,
                material: batch.material,
                drawable: batch.drawable_index,
                light: batch.pixel_light,
                vertex_lights: batch.vertex_lights,
                start_instance: group.start_instance,
                num_instances: group.num_instances,
            });
            stats.draw_calls += 1;
            stats.batches_submitted += group.batches.len();
        }

        self.total_skipped += stats.batches_skipped;
        stats
    }
}
