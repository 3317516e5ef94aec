//! Registry Module Tests
//!
//! Validates the shared availability model.
//!
//! ## Test Scopes
//! - **Ordering & Identity**: join order is preserved, lookups are id-keyed.
//! - **Round Scoring**: live nodes gain points, absent nodes go dead.
//! - **Liveness Classification**: the 30% cutoff in peer mode.
//! - **Concurrency**: timer and packet handlers share one lock safely.

#[cfg(test)]
mod tests {
    use crate::packet::types::NodeRecord;
    use crate::registry::registry::{LiveSet, NodeRegistry};
    use crate::registry::types::{availability_percentage, classify, Liveness};

    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn record(id: i32) -> NodeRecord {
        NodeRecord::registered("10.0.0.1".parse().unwrap(), 6000 + id as u16, id)
    }

    // ============================================================
    // ORDERING & IDENTITY TESTS
    // ============================================================

    #[test]
    fn test_insertion_order_is_join_order() {
        let mut registry = NodeRegistry::new();
        registry.insert(record(2));
        registry.insert(record(0));
        registry.insert(record(1));

        let ids: Vec<i32> = registry.iter().map(|r| r.node_id).collect();
        assert_eq!(ids, vec![2, 0, 1]);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut registry = NodeRegistry::new();
        assert!(registry.insert(record(0)));
        assert!(!registry.insert(record(0)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_is_by_id_not_endpoint() {
        let mut registry = NodeRegistry::new();
        // Two nodes behind the same endpoint must remain distinct.
        let mut a = record(0);
        let mut b = record(1);
        b.address = a.address;
        b.port = a.port;
        a.availability = 3;
        registry.insert(a);
        registry.insert(b);

        assert_eq!(registry.get(0).unwrap().availability, 3);
        assert_eq!(registry.get(1).unwrap().availability, 0);
    }

    #[test]
    fn test_endpoint_update_keeps_single_record() {
        let mut registry = NodeRegistry::new();
        registry.insert(record(0));

        let moved = registry.update_endpoint(0, "192.168.5.9".parse().unwrap(), 7777);
        assert!(moved);
        assert_eq!(registry.len(), 1);

        let rec = registry.get(0).unwrap();
        assert_eq!(rec.port, 7777);
        assert_eq!(rec.address.to_string(), "192.168.5.9");
    }

    #[test]
    fn test_update_endpoint_unknown_id() {
        let mut registry = NodeRegistry::new();
        assert!(!registry.update_endpoint(9, "10.0.0.1".parse().unwrap(), 1));
    }

    #[test]
    fn test_remove_returns_record_and_shrinks() {
        let mut registry = NodeRegistry::new();
        registry.insert(record(0));
        registry.insert(record(1));

        let removed = registry.remove(0).expect("record should exist");
        assert_eq!(removed.node_id, 0);
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(0).is_none());
    }

    #[test]
    fn test_replace_all_swaps_view() {
        let mut registry = NodeRegistry::new();
        registry.insert(record(0));

        registry.replace_all(vec![record(5), record(6)]);
        let ids: Vec<i32> = registry.iter().map(|r| r.node_id).collect();
        assert_eq!(ids, vec![5, 6]);
    }

    // ============================================================
    // ROUND SCORING TESTS
    // ============================================================

    #[test]
    fn test_round_scores_live_and_marks_absent_dead() {
        let mut registry = NodeRegistry::new();
        let mut scored = record(0);
        scored.availability = 4;
        scored.dead = false;
        registry.insert(scored);
        registry.insert(record(1));

        let mut live = LiveSet::new();
        live.insert(0);

        registry.apply_round(&live);

        let present = registry.get(0).unwrap();
        assert_eq!(present.availability, 5);
        assert!(!present.dead);

        // Absent node: dead flag set, score untouched.
        let absent = registry.get(1).unwrap();
        assert_eq!(absent.availability, 0);
        assert!(absent.dead);
    }

    #[test]
    fn test_scores_never_decrease_across_rounds() {
        let mut registry = NodeRegistry::new();
        registry.insert(record(0));

        let mut live = LiveSet::new();
        live.insert(0);
        registry.apply_round(&live);
        registry.apply_round(&live);

        live.clear();
        registry.apply_round(&live);

        let rec = registry.get(0).unwrap();
        assert_eq!(rec.availability, 2);
        assert!(rec.dead);
    }

    #[test]
    fn test_live_set_insert_is_idempotent() {
        let mut live = LiveSet::new();
        assert!(live.insert(3));
        assert!(!live.insert(3));
        assert_eq!(live.len(), 1);

        assert!(live.remove(3));
        assert!(!live.remove(3));
        assert!(live.is_empty());
    }

    #[test]
    fn test_live_set_clear_empties_round() {
        let mut live = LiveSet::new();
        live.insert(0);
        live.insert(1);
        live.clear();
        assert!(live.is_empty());
    }

    // ============================================================
    // LIVENESS CLASSIFICATION TESTS
    // ============================================================

    #[test]
    fn test_forty_percent_is_alive() {
        assert_eq!(availability_percentage(4, 10), 40.0);
        assert_eq!(classify(4, 10), Liveness::Alive);
    }

    #[test]
    fn test_exactly_thirty_percent_is_dead() {
        assert_eq!(availability_percentage(3, 10), 30.0);
        assert_eq!(classify(3, 10), Liveness::Dead);
    }

    #[test]
    fn test_zero_rounds_classifies_dead() {
        assert_eq!(classify(0, 0), Liveness::Dead);
    }

    #[test]
    fn test_dead_flag_mapping() {
        assert_eq!(Liveness::from_dead_flag(false), Liveness::Alive);
        assert_eq!(Liveness::from_dead_flag(true), Liveness::Dead);
        assert_eq!(Liveness::Alive.to_string(), "ALIVE");
        assert_eq!(Liveness::Dead.to_string(), "DEAD");
    }

    // ============================================================
    // CONCURRENT ACCESS TESTS
    // ============================================================

    /// The round timer and per-packet tasks mutate the registry and live set
    /// together; production wraps both in a single mutex. Hammer that setup
    /// from many tasks and check nothing is lost or corrupted.
    #[tokio::test]
    async fn test_concurrent_reports_and_rounds() {
        struct Shared {
            registry: NodeRegistry,
            live: LiveSet,
        }

        let mut registry = NodeRegistry::new();
        for id in 0..4 {
            registry.insert(record(id));
        }
        let shared = Arc::new(Mutex::new(Shared {
            registry,
            live: LiveSet::new(),
        }));

        let mut handles = Vec::new();

        // Reporters: repeatedly mark every node live.
        for _ in 0..8 {
            let shared = shared.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    {
                        let mut state = shared.lock().await;
                        for id in 0..4 {
                            state.live.insert(id);
                        }
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        // Scorer: close ten rounds while the reporters run.
        let scorer = {
            let shared = shared.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    {
                        let mut state = shared.lock().await;
                        let live = state.live.clone();
                        state.registry.apply_round(&live);
                        state.live.clear();
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                }
            })
        };
        handles.push(scorer);

        for handle in handles {
            handle.await.expect("task panicked");
        }

        let state = shared.lock().await;
        assert_eq!(state.registry.len(), 4, "no records lost or duplicated");
        for rec in state.registry.iter() {
            assert!(rec.availability <= 10, "score cannot exceed rounds closed");
        }
    }
}
