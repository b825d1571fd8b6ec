/*!
 * Property Tests
 * Model-checked allocation and reclamation over random workloads
 */

use pagepool::{ArenaCollection, PoolConfig, WORD};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

fn pool() -> ArenaCollection {
    ArenaCollection::new(PoolConfig::new(16 * 1024, 1024, 64)).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_accounting_and_placement_match_a_model(
        rounds in prop::collection::vec(
            (prop::collection::vec(1..=8usize, 1..48), any::<u64>()),
            1..4,
        ),
    ) {
        let mut pool = pool();
        let mut live: Vec<(usize, usize)> = Vec::new();

        for (classes, seed) in rounds {
            for class in classes {
                let size = class * WORD;
                let addr = pool.malloc(size);
                live.push((addr, size));
            }

            // No live block may overlap another.
            let mut sorted = live.clone();
            sorted.sort_unstable();
            for pair in sorted.windows(2) {
                prop_assert!(
                    pair[0].0 + pair[0].1 <= pair[1].0,
                    "blocks overlap: {:?} and {:?}",
                    pair[0],
                    pair[1]
                );
            }

            // Doom a pseudo-random half and sweep.
            let mut rng = StdRng::seed_from_u64(seed);
            let mut doomed = HashSet::new();
            live.retain(|&(addr, _)| {
                if rng.gen_bool(0.5) {
                    doomed.insert(addr);
                    false
                } else {
                    true
                }
            });
            pool.mass_free(|obj| doomed.contains(&obj));

            let expected: usize = live.iter().map(|&(_, size)| size).sum();
            prop_assert_eq!(pool.total_memory_used(), expected);
        }
    }

    #[test]
    fn prop_sweep_visits_exactly_the_live_blocks(
        classes in prop::collection::vec(1..=8usize, 1..64),
    ) {
        let mut pool = pool();
        let mut expected: Vec<usize> =
            classes.iter().map(|&class| pool.malloc(class * WORD)).collect();

        let mut seen = Vec::new();
        pool.mass_free(|obj| {
            seen.push(obj);
            false
        });

        seen.sort_unstable();
        expected.sort_unstable();
        prop_assert_eq!(seen, expected);

        pool.mass_free(|_| true);
        prop_assert_eq!(pool.total_memory_used(), 0);
    }

    #[test]
    fn prop_incremental_and_oneshot_sweeps_agree(
        classes in prop::collection::vec(1..=8usize, 1..64),
        budget in 1..6usize,
        seed in any::<u64>(),
    ) {
        let make = || {
            let mut pool = pool();
            let blocks: Vec<usize> =
                classes.iter().map(|&class| pool.malloc(class * WORD)).collect();
            let mut rng = StdRng::seed_from_u64(seed);
            let doomed: HashSet<usize> =
                blocks.iter().copied().filter(|_| rng.gen_bool(0.5)).collect();
            (pool, doomed)
        };

        let (mut oneshot, doomed) = make();
        oneshot.mass_free(|obj| doomed.contains(&obj));

        let (mut stepped, doomed) = make();
        stepped.mass_free_prepare();
        while !stepped.mass_free_incremental(|obj| doomed.contains(&obj), budget) {}

        prop_assert_eq!(oneshot.total_memory_used(), stepped.total_memory_used());
        prop_assert_eq!(oneshot.stats(), stepped.stats());

        // Both pools must also allocate at the same offsets from here on.
        let a = oneshot.malloc(16);
        let b = stepped.malloc(16);
        let base_a = oneshot.arenas().next().unwrap().base();
        let base_b = stepped.arenas().next().unwrap().base();
        prop_assert_eq!(a - base_a, b - base_b);
    }
}
