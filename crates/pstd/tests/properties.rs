//! Property tests for distribution, the exchange contract, receiver
//! output, and checkpoint cadence.

use std::sync::Arc;

use indexmap::IndexMap;
use pstd::engine::{distribute, CheckpointLog, SequentialBackend};
use pstd::prelude::*;
use pstd_test_utils::{fixtures, LinearDerivative};
use proptest::prelude::*;

/// A `rows x cols` grid of 2x2 air domains.
fn grid(rows: usize, cols: usize) -> Scene {
    let mut b = SceneBuilder::new(0.2);
    for r in 0..rows {
        for c in 0..cols {
            b.domain(
                GridPoint::new(2 * c as i64, 2 * r as i64),
                Shape::new(2, 2),
            );
        }
    }
    b.build().unwrap()
}

proptest! {
    #[test]
    fn distribution_is_a_fair_partition(
        rows in 1usize..5,
        cols in 1usize..5,
        workers in 1usize..9,
    ) {
        let scene = grid(rows, cols);
        let assigned = distribute(&scene, workers);
        prop_assert_eq!(assigned.len(), workers);

        let mut owners = vec![0usize; scene.domain_count()];
        for w in &assigned {
            for id in w.owned() {
                owners[id.0 as usize] += 1;
            }
        }
        prop_assert!(owners.iter().all(|&n| n == 1));

        let sizes: Vec<usize> = assigned.iter().map(|w| w.owned().count()).collect();
        let max = sizes.iter().copied().max().unwrap_or(0);
        let min = sizes.iter().copied().min().unwrap_or(0);
        prop_assert!(max - min <= 1);
    }

    #[test]
    fn dependencies_are_foreign_neighbours(
        rows in 1usize..5,
        cols in 1usize..5,
        workers in 1usize..6,
    ) {
        let scene = grid(rows, cols);
        for w in distribute(&scene, workers) {
            let owned: Vec<DomainId> = w.owned().collect();
            let mut expected: Vec<DomainId> = owned
                .iter()
                .flat_map(|&id| scene.domain(id).unwrap().neighbours().keys().copied())
                .filter(|id| !owned.contains(id))
                .collect();
            expected.sort();
            expected.dedup();
            let actual: Vec<DomainId> = w.dependencies().iter().copied().collect();
            prop_assert_eq!(actual, expected);
        }
    }

    #[test]
    fn exchange_accepts_exactly_the_dependency_set(
        rows in 1usize..4,
        cols in 2usize..5,
        workers in 2usize..5,
        drop_one in any::<bool>(),
        add_own in any::<bool>(),
    ) {
        let scene = grid(rows, cols);
        let mut assigned = distribute(&scene, workers);
        let mut all = IndexMap::new();
        for w in &assigned {
            all.extend(w.get_numerical_data());
        }

        let target = &mut assigned[0];
        let mut data: IndexMap<_, _> = target
            .dependencies()
            .iter()
            .map(|id| (*id, all[id].clone()))
            .collect();
        let mut tampered = false;
        if drop_one && !data.is_empty() {
            data.pop();
            tampered = true;
        }
        if add_own {
            let own = target.owned().next().unwrap();
            data.insert(own, all[&own].clone());
            tampered = true;
        }
        let result = target.set_numerical_data(data);
        prop_assert_eq!(result.is_ok(), !tampered);
    }

    #[test]
    fn checkpoints_land_on_multiples_of_the_cadence(frames in 1u64..12, cadence in 1u64..5) {
        let mut scene = fixtures::rigid_and_air(2, 2);
        let config = SolverConfig {
            frame_count: frames,
            checkpoint_cadence: cadence,
            ..SolverConfig::default()
        };
        let mut checkpoints = CheckpointLog::default();
        let mut receivers = MemoryReceiverSink::new();
        TimeStepScheduler::new(config)
            .unwrap()
            .run(
                &mut scene,
                &mut SequentialBackend::new(Arc::new(LinearDerivative)),
                &mut receivers,
                &mut checkpoints,
                &mut |_: &ProgressReport| ProgressControl::Continue,
            )
            .unwrap();
        let expected: Vec<u64> = (0..frames).filter(|f| f % cadence == 0).collect();
        prop_assert_eq!(checkpoints.frames, expected);
        prop_assert_eq!(receivers.samples(ReceiverId(0)).len() as u64, frames);
    }
}

#[test]
fn every_receiver_gets_one_sample_per_frame() {
    let mut scene = fixtures::strip(4, 3, 3);
    let config = SolverConfig {
        frame_count: 5,
        ..SolverConfig::default()
    };
    let mut receivers = MemoryReceiverSink::new();
    pstd::engine::run(
        &config,
        &mut scene,
        Arc::new(LinearDerivative),
        &mut receivers,
        &mut NoCheckpoints,
        &mut |_: &ProgressReport| ProgressControl::Continue,
    )
    .unwrap();
    let ids: Vec<ReceiverId> = receivers.receivers().collect();
    assert_eq!(ids, (0..4).map(ReceiverId).collect::<Vec<_>>());
    for id in ids {
        assert_eq!(receivers.samples(id).len(), 5);
    }
}
