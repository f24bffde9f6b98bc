use proptest::prelude::*;

/// Strategy for acyclic dependency lists: node `i` only depends on nodes `< i`
pub fn acyclic_dependencies_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..12).prop_flat_map(|count| {
        (0..count)
            .map(|index| {
                if index == 0 {
                    Just(Vec::new()).boxed()
                } else {
                    prop::collection::vec(0..index, 0..=index.min(3)).boxed()
                }
            })
            .collect::<Vec<_>>()
    })
}

/// Strategy for independent actions, `true` meaning a stop
pub fn stop_flags_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..20)
}
