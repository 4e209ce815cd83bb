use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use scene_pipeline::renderer::pipeline_batch::{sort_batches_back_to_front, sort_batches_by_state};
use scene_pipeline::renderer::{DrawableUpdateFlags, PipelineBatch, PipelineBatchBackToFront, PipelineBatchByState};
use scene_pipeline::scene::{GeometryId, MaterialId, PassId};

const NUM_DRAWABLES: usize = 4096;

#[test]
fn update_flags_are_set_once_across_rayon_workers() {
    let mut flags = DrawableUpdateFlags::default();
    flags.begin_frame(NUM_DRAWABLES);

    // Every index is marked by several workers; exactly one of them wins
    let winners: Vec<usize> = (0..NUM_DRAWABLES * 8)
        .into_par_iter()
        .filter_map(|i| {
            let index = i % NUM_DRAWABLES;
            flags.mark(index).then_some(index)
        })
        .collect();

    let mut counts = vec![0usize; NUM_DRAWABLES];
    for index in winners {
        counts[index] += 1;
    }
    assert!(counts.iter().all(|&count| count == 1));
    assert!((0..NUM_DRAWABLES).all(|index| flags.is_marked(index)));
}

#[test]
fn update_flags_are_set_once_across_scoped_threads() {
    let mut flags = DrawableUpdateFlags::default();
    flags.begin_frame(NUM_DRAWABLES);
    let wins = AtomicUsize::new(0);

    thread::scope(|scope| {
        for worker in 0..6 {
            let flags = &flags;
            let wins = &wins;
            scope.spawn(move || {
                for offset in 0..NUM_DRAWABLES {
                    let index = (offset + worker * 97) % NUM_DRAWABLES;
                    if flags.mark(index) {
                        wins.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    assert_eq!(wins.load(Ordering::Relaxed), NUM_DRAWABLES);
}

#[test]
fn new_frame_clears_marks() {
    let mut flags = DrawableUpdateFlags::default();
    flags.begin_frame(16);
    (0..16).into_par_iter().for_each(|index| {
        flags.mark(index);
    });

    flags.begin_frame(32);
    assert_eq!(flags.len(), 32);
    assert!((0..32).all(|index| !flags.is_marked(index)));
    assert!(flags.mark(3));
    assert!(!flags.mark(3));
}

fn random_batches(rng: &mut SmallRng, count: usize) -> Vec<PipelineBatch> {
    (0..count)
        .map(|i| PipelineBatch {
            render_order: rng.gen_range(0..4) * 64,
            shader_hash: rng.gen_range(0..8),
            state_hash: rng.gen_range(0..4),
            distance: rng.gen_range(0.0..100.0),
            ..PipelineBatch::new(
                i,
                GeometryId(rng.gen_range(0..6)),
                MaterialId(rng.gen_range(0..5)),
                PassId::BASE,
            )
        })
        .collect()
}

#[test]
fn parallel_sort_matches_serial_sort() {
    let mut rng = SmallRng::seed_from_u64(1234);
    for _ in 0..20 {
        let batches = random_batches(&mut rng, 512);
        let serial = sort_batches_by_state(&batches);

        let mut parallel: Vec<PipelineBatchByState> = batches
            .iter()
            .enumerate()
            .map(|(index, batch)| PipelineBatchByState::new(batch, index))
            .collect();
        parallel.par_sort_by(PipelineBatchByState::compare);
        assert_eq!(parallel, serial);

        // Sorting sorted keys again keeps their order
        let mut resorted = serial.clone();
        resorted.sort_by(PipelineBatchByState::compare);
        assert_eq!(resorted, serial);
    }
}

#[test]
fn back_to_front_order_is_stable_under_resorting() {
    let mut rng = SmallRng::seed_from_u64(99);
    let batches = random_batches(&mut rng, 256);

    let mut keys = sort_batches_back_to_front(&batches);
    let first = keys.clone();
    keys.par_sort_by(PipelineBatchBackToFront::compare);
    assert_eq!(keys, first);

    for pair in first.windows(2) {
        assert!(pair[0].render_order <= pair[1].render_order);
        if pair[0].render_order == pair[1].render_order {
            assert!(pair[0].distance >= pair[1].distance);
        }
    }
}
