use std::cmp::Ordering;

use crate::renderer::device::PipelineStateId;
use crate::renderer::light_accumulator::{INVALID_LIGHT_INDEX, MAX_VERTEX_LIGHTS};
use crate::renderer::pipeline_state::PipelineStateKey;
use crate::scene::{DrawableIndex, GeometryId, MaterialId, PassId};

/// Drawable index of batches that do not belong to a scene drawable, such as light volumes.
pub const NO_DRAWABLE: DrawableIndex = usize::MAX;

/// One draw of one source batch with one material pass, ready for sorting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineBatch {
    pub drawable_index: DrawableIndex,
    pub source_batch_index: usize,
    pub geometry: GeometryId,
    pub material: MaterialId,
    pub pass: PassId,
    /// Per-pixel light applied by this batch, as an index into the frame's light list.
    pub pixel_light: Option<u32>,
    pub vertex_lights: [u32; MAX_VERTEX_LIGHTS],
    pub distance: f32,
    pub render_order: u8,
    pub shader_hash: u32,
    pub state_hash: u32,
    pub pipeline_state_key: PipelineStateKey,
    pub pipeline_state: Option<PipelineStateId>,
}

impl PipelineBatch {
    pub fn new(drawable_index: DrawableIndex, geometry: GeometryId, material: MaterialId, pass: PassId) -> Self {
        Self {
            drawable_index,
            source_batch_index: 0,
            geometry,
            material,
            pass,
            pixel_light: None,
            vertex_lights: [INVALID_LIGHT_INDEX; MAX_VERTEX_LIGHTS],
            distance: 0.0,
            render_order: 0,
            shader_hash: 0,
            state_hash: 0,
            pipeline_state_key: 0,
            pipeline_state: None,
        }
    }

    /// Batches that compare equal here can be drawn as instances of one draw call.
    pub fn can_instance_with(&self, other: &PipelineBatch) -> bool {
        self.pipeline_state == other.pipeline_state
            && self.geometry == other.geometry
            && self.material == other.material
            && self.pixel_light == other.pixel_light
            && self.vertex_lights == other.vertex_lights
    }
}

/// Sort key minimizing state changes: pipeline state, then material and geometry,
/// then distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineBatchByState {
    /// Render order in the top 8 bits, shader hash below it, low 24 bits of state hash.
    pub primary_key: u64,
    /// Material in the high 32 bits, geometry in the low 32 bits.
    pub secondary_key: u64,
    pub distance: f32,
    pub batch_index: usize,
}

impl PipelineBatchByState {
    pub fn new(batch: &PipelineBatch, batch_index: usize) -> Self {
        Self {
            primary_key: (batch.render_order as u64) << 56
                | (batch.shader_hash as u64) << 24
                | (batch.state_hash & 0x00FF_FFFF) as u64,
            secondary_key: (batch.material.0 as u64) << 32 | batch.geometry.0 as u64,
            distance: batch.distance,
            batch_index,
        }
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        self.primary_key
            .cmp(&other.primary_key)
            .then(self.secondary_key.cmp(&other.secondary_key))
            .then(other.distance.total_cmp(&self.distance))
    }
}

/// Sort key for blended geometry: render order, then far to near.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineBatchBackToFront {
    pub render_order: u8,
    pub distance: f32,
    pub batch_index: usize,
}

impl PipelineBatchBackToFront {
    pub fn new(batch: &PipelineBatch, batch_index: usize) -> Self {
        Self {
            render_order: batch.render_order,
            distance: batch.distance,
            batch_index,
        }
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        self.render_order
            .cmp(&other.render_order)
            .then(other.distance.total_cmp(&self.distance))
    }
}

pub fn sort_batches_by_state(batches: &[PipelineBatch]) -> Vec<PipelineBatchByState> {
    let mut keys: Vec<_> = batches
        .iter()
        .enumerate()
        .map(|(index, batch)| PipelineBatchByState::new(batch, index))
        .collect();
    keys.sort_by(PipelineBatchByState::compare);
    keys
}

pub fn sort_batches_back_to_front(batches: &[PipelineBatch]) -> Vec<PipelineBatchBackToFront> {
    let mut keys: Vec<_> = batches
        .iter()
        .enumerate()
        .map(|(index, batch)| PipelineBatchBackToFront::new(batch, index))
        .collect();
    keys.sort_by(PipelineBatchBackToFront::compare);
    keys
}

/// Consecutive sorted batches submitted with one draw call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineBatchGroup {
    pub batches: Vec<usize>,
    pub start_instance: u32,
    pub num_instances: u32,
}

/// Groups `order` (indices into `batches`) into draw calls. Without instancing every
/// batch is its own group.
pub fn group_batches(
    batches: &[PipelineBatch],
    order: impl IntoIterator<Item = usize>,
    instancing: bool,
) -> Vec<PipelineBatchGroup> {
    let mut groups: Vec<PipelineBatchGroup> = Vec::new();
    let mut next_instance = 0;

    for index in order {
        let batch = &batches[index];
        if instancing {
            if let Some(group) = groups.last_mut() {
                if batches[group.batches[0]].can_instance_with(batch) {
                    group.batches.push(index);
                    group.num_instances += 1;
                    next_instance += 1;
                    continue;
                }
            }
        }
        groups.push(PipelineBatchGroup {
            batches: vec![index],
            start_instance: if instancing { next_instance } else { 0 },
            num_instances: 1,
        });
        if instancing {
            next_instance += 1;
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn batch(order: u8, shader: u32, material: u32, distance: f32) -> PipelineBatch {
        PipelineBatch {
            render_order: order,
            shader_hash: shader,
            distance,
            ..PipelineBatch::new(0, GeometryId(1), MaterialId(material), PassId::BASE)
        }
    }

    #[test]
    fn render_order_dominates_shader() {
        let a = PipelineBatchByState::new(&batch(0, u32::MAX, 9, 1.0), 0);
        let b = PipelineBatchByState::new(&batch(1, 0, 0, 1.0), 1);
        assert_eq!(a.compare(&b), Ordering::Less);
    }

    #[test]
    fn equal_state_orders_by_descending_distance() {
        let batches = [batch(0, 5, 1, 2.0), batch(0, 5, 1, 9.0), batch(0, 5, 1, 4.0)];
        let keys = sort_batches_by_state(&batches);
        let order: Vec<usize> = keys.iter().map(|k| k.batch_index).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn back_to_front_draws_far_first() {
        let batches = [batch(1, 0, 0, 2.0), batch(0, 0, 0, 1.0), batch(1, 0, 0, 8.0)];
        let keys = sort_batches_back_to_front(&batches);
        let order: Vec<usize> = keys.iter().map(|k| k.batch_index).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn sorting_is_idempotent() {
        let mut rng = SmallRng::seed_from_u64(11);
        let batches: Vec<PipelineBatch> = (0..500)
            .map(|_| {
                let mut b = batch(rng.gen_range(0..3), rng.gen_range(0..4), rng.gen_range(0..4), rng.gen_range(0.0..100.0));
                b.state_hash = rng.gen();
                b.geometry = GeometryId(rng.gen_range(0..3));
                b
            })
            .collect();

        let mut keys = sort_batches_by_state(&batches);
        let once = keys.clone();
        keys.sort_by(PipelineBatchByState::compare);
        assert_eq!(keys, once);
        assert!(keys.windows(2).all(|w| w[0].compare(&w[1]) != Ordering::Greater));
        for w in keys.windows(2) {
            if w[0].primary_key == w[1].primary_key && w[0].secondary_key == w[1].secondary_key {
                assert!(w[0].distance >= w[1].distance);
            }
        }
    }

    #[test]
    fn instanced_groups_merge_compatible_neighbours() {
        let mut batches = vec![batch(0, 1, 1, 1.0), batch(0, 1, 1, 2.0), batch(0, 1, 2, 3.0)];
        for b in &mut batches {
            b.pipeline_state = Some(PipelineStateId(4));
        }
        let groups = group_batches(&batches, 0..3, true);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].num_instances, 2);
        assert_eq!(groups[1].start_instance, 2);

        let plain = group_batches(&batches, 0..3, false);
        assert_eq!(plain.len(), 3);
        assert!(plain.iter().all(|g| g.num_instances == 1 && g.start_instance == 0));
    }
}
