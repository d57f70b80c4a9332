//! Property-based tests for the memory store using proptest.
//!
//! These tests exercise store-level invariants against randomly generated
//! inputs:
//!
//! - A saved value is recalled unchanged
//! - Appending joins old and new values with a single space
//! - Category statistics always sum to the record count
//! - A relation triple exists at most once
//! - Path queries agree with the shape of a generated chain

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    use crate::memory::store::MemoryStore;
    use crate::memory::types::{Direction, DEFAULT_CATEGORY};

    // Keys drawn from a small alphabet so collisions (overwrites) happen
    fn key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,11}"
    }

    fn value() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            Just("{\"nested\": [1, 2, 3]}".to_string()),
            Just("multi\nline\tvalue".to_string()),
            Just("안녕하세요 memory".to_string()),
            "[ -~]{0,64}",
        ]
    }

    fn category() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(DEFAULT_CATEGORY.to_string()),
            Just("project".to_string()),
            Just("personal".to_string()),
            Just("session-context".to_string()),
        ]
    }

    // =========================================================================
    // Record Properties
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Whatever is saved is recalled byte-for-byte.
        #[test]
        fn save_then_recall_returns_value(
            key in key(),
            value in value(),
            category in category(),
            priority in -5i64..10
        ) {
            let store = MemoryStore::in_memory().unwrap();
            store.save(&key, &value, &category, priority).unwrap();

            let record = store.recall(&key).unwrap().unwrap();
            prop_assert_eq!(record.value, value);
            prop_assert_eq!(record.category, category);
            prop_assert_eq!(record.priority, priority);
        }

        /// Append mode concatenates with exactly one separating space.
        #[test]
        fn append_joins_with_space(first in value(), second in value()) {
            let store = MemoryStore::in_memory().unwrap();
            store.save("k", &first, DEFAULT_CATEGORY, 0).unwrap();
            prop_assert!(store.update("k", &second, true).unwrap());

            let record = store.get("k").unwrap().unwrap();
            prop_assert_eq!(record.value, format!("{} {}", first, second));
        }

        /// Stats always agree with the set of distinct keys saved.
        #[test]
        fn stats_sum_to_total(
            entries in prop::collection::vec((key(), category()), 0..30)
        ) {
            let store = MemoryStore::in_memory().unwrap();
            let mut expected: BTreeMap<String, String> = BTreeMap::new();
            for (key, category) in &entries {
                store.save(key, "v", category, 0).unwrap();
                expected.insert(key.clone(), category.clone());
            }

            let stats = store.stats().unwrap();
            prop_assert_eq!(stats.total, expected.len() as u64);
            prop_assert_eq!(stats.by_category.values().sum::<u64>(), stats.total);
            prop_assert_eq!(store.list(None).unwrap().len(), expected.len());
        }

        /// An empty query matches every record.
        #[test]
        fn empty_query_matches_all(keys in prop::collection::btree_set(key(), 0..20)) {
            let store = MemoryStore::in_memory().unwrap();
            for key in &keys {
                store.save(key, "v", DEFAULT_CATEGORY, 0).unwrap();
            }
            prop_assert_eq!(store.search("").unwrap().len(), keys.len());
        }
    }

    // =========================================================================
    // Relation Properties
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Re-linking the same triple never duplicates it; the last weight wins.
        #[test]
        fn relink_keeps_single_edge(weights in prop::collection::vec(0.0f64..1.0, 1..8)) {
            let store = MemoryStore::in_memory().unwrap();
            store.save("a", "1", DEFAULT_CATEGORY, 0).unwrap();
            store.save("b", "2", DEFAULT_CATEGORY, 0).unwrap();
            for weight in &weights {
                prop_assert!(store.link("a", "b", "related_to", *weight).unwrap());
            }

            let outgoing = store.relations_of("a", Direction::Outgoing).unwrap();
            prop_assert_eq!(outgoing.len(), 1);
            prop_assert_eq!(outgoing[0].weight, *weights.last().unwrap());
            prop_assert_eq!(store.relation_count().unwrap(), 1);
        }

        /// In a chain every pair is connected by a path of |i - j| hops.
        #[test]
        fn chain_paths_have_expected_length(
            len in 2usize..10,
            i in 0usize..10,
            j in 0usize..10
        ) {
            let (i, j) = (i % len, j % len);
            let store = MemoryStore::in_memory().unwrap();
            let keys: Vec<String> = (0..len).map(|n| format!("node-{}", n)).collect();
            for key in &keys {
                store.save(key, "v", DEFAULT_CATEGORY, 0).unwrap();
            }
            for pair in keys.windows(2) {
                store.link(&pair[0], &pair[1], "next", 1.0).unwrap();
            }

            let path = store.find_path(&keys[i], &keys[j]).unwrap().unwrap();
            prop_assert_eq!(path.len(), i.abs_diff(j) + 1);
            prop_assert_eq!(path.first(), Some(&keys[i]));
            prop_assert_eq!(path.last(), Some(&keys[j]));

            let related = store.related_memories(&keys[0], len, None).unwrap();
            prop_assert_eq!(related.len(), len - 1);

            let graph = store.memory_graph(None, len).unwrap();
            prop_assert_eq!(graph.clusters.len(), 1);
            prop_assert_eq!(graph.clusters[0].len(), len);
        }

        /// Deleting any record leaves no relation naming it.
        #[test]
        fn delete_cascades(len in 2usize..8, victim in 0usize..8) {
            let victim = victim % len;
            let store = MemoryStore::in_memory().unwrap();
            let keys: Vec<String> = (0..len).map(|n| format!("k{}", n)).collect();
            for key in &keys {
                store.save(key, "v", DEFAULT_CATEGORY, 0).unwrap();
            }
            for a in &keys {
                for b in &keys {
                    store.link(a, b, "related_to", 0.5).unwrap();
                }
            }

            prop_assert!(store.delete(&keys[victim]).unwrap());
            let remaining = store.relations().unwrap();
            prop_assert!(remaining.iter().all(|r| !r.touches(&keys[victim])));
            prop_assert_eq!(remaining.len(), (len - 1) * (len - 1));
        }
    }
}
