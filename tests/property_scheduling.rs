// tests/property_scheduling.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use proptest::prelude::*;
use xp::exec::CoreAllocator;
use xp::task::sweep;
use xp::types::ParamValue;

proptest! {
    #[test]
    fn allocator_cycles_through_cores_in_order(
        cores in proptest::collection::vec(0usize..256, 1..16),
        tasks in 0usize..100,
    ) {
        let alloc = CoreAllocator::new(cores.clone());
        for i in 0..tasks {
            prop_assert_eq!(alloc.next_core(), Some(cores[i % cores.len()]));
        }
    }

    #[test]
    fn first_round_never_repeats_a_core(n in 1usize..32) {
        let cores: Vec<usize> = (0..n).collect();
        let alloc = CoreAllocator::new(cores);
        let first: BTreeSet<usize> = (0..n).filter_map(|_| alloc.next_core()).collect();
        prop_assert_eq!(first.len(), n);
    }

    #[test]
    fn sweep_names_are_unique(
        seeds in proptest::collection::btree_set(0i64..1000, 1..6),
        modes in proptest::collection::btree_set("[a-z]{1,6}", 1..4),
    ) {
        let mut params = BTreeMap::new();
        params.insert("seed".to_string(), seeds.iter().copied().map(ParamValue::from).collect());
        params.insert("mode".to_string(), modes.iter().cloned().map(ParamValue::from).collect());

        let tasks = sweep(Path::new("/opt/solver"), Path::new("inst/a.col"), &params);
        let names: BTreeSet<String> = tasks.iter().map(|t| t.name()).collect();

        prop_assert_eq!(tasks.len(), seeds.len() * modes.len());
        prop_assert_eq!(names.len(), tasks.len());
    }
}

#[test]
fn disabled_allocator_never_pins() {
    let alloc = CoreAllocator::disabled();
    assert!((0..10).all(|_| alloc.next_core().is_none()));
}
