//! Edge case tests for the task graph.
//!
//! Tests boundary conditions, unusual inputs, and deep or degenerate graphs.

mod common;

use common::TestEnv;
use std::time::Duration;
use taskweave::{DESCRIPTION_MAX, Error, GraphStore, ITEM_TEXT_MAX, Status, TaskBuilder, TaskNode, algo, ops};

// =============================================================================
// Unicode and Text Bounds
// =============================================================================

#[test]
fn test_unicode_title_and_search() {
    let mut env = TestEnv::new();
    let id = env.add(
        TaskBuilder::new("Übersetzung prüfen 日本語")
            .description("Überprüfe die Texte")
            .build()
            .unwrap(),
    );
    env.save();

    assert_eq!(env.reload().get_node(&id).unwrap().title(), "Übersetzung prüfen 日本語");
    assert_eq!(env.store.search("übersetzung").unwrap(), [id.clone()]);
    assert_eq!(env.store.search("日本語").unwrap(), [id]);
}

#[test]
fn test_title_limit_counts_characters_not_bytes() {
    let title: String = "é".repeat(200);
    assert!(title.len() > 200);
    assert!(TaskNode::new(title).is_ok());
}

#[test]
fn test_control_characters_rejected() {
    assert!(TaskNode::new("line\nbreak").is_err());
}

#[test]
fn test_description_and_item_limits() {
    assert!(
        TaskBuilder::new("Task")
            .description("d".repeat(DESCRIPTION_MAX))
            .build()
            .is_ok()
    );
    assert!(
        TaskBuilder::new("Task")
            .description("d".repeat(DESCRIPTION_MAX + 1))
            .build()
            .is_err()
    );
    assert!(TaskBuilder::new("Task").criterion("c".repeat(ITEM_TEXT_MAX)).build().is_ok());
    assert!(TaskBuilder::new("Task").criterion("c".repeat(ITEM_TEXT_MAX + 1)).build().is_err());
}

// =============================================================================
// Degenerate Graphs
// =============================================================================

#[test]
fn test_algorithms_on_empty_graph() {
    let graph = GraphStore::new("empty");
    assert!(algo::topological_sort(&graph).order.is_empty());
    assert!(!algo::detect_cycles(&graph).has_cycle());
    assert!(algo::execution_levels(&graph).unwrap().is_empty());
    assert_eq!(algo::critical_path_unit(&graph).unwrap().length, 0);
    assert!(algo::connected_components(&graph).is_empty());
}

#[test]
fn test_self_loop_is_reported_as_cycle() {
    let mut env = TestEnv::new();
    let id = env.create_task("Loop");
    env.block(&id, &id);

    let report = algo::detect_cycles(&env.graph);
    assert_eq!(report.cycles, [vec![id.clone(), id.clone()]]);
    assert_eq!(algo::topological_sort(&env.graph).cycle_nodes, [id.clone()]);
    env.assert_status(&id, Status::Blocked);
}

#[test]
fn test_deep_chain_does_not_overflow() {
    let mut env = TestEnv::new();
    let ids = env.chain(5_000);

    assert!(!algo::detect_cycles(&env.graph).has_cycle());
    let path = algo::critical_path_unit(&env.graph).unwrap();
    assert_eq!(path.length, 5_000);
    assert_eq!(algo::descendants(&env.graph, &ids[0]).len(), 4_999);

    env.block(&ids[4_999], &ids[0]);
    let report = algo::detect_cycles(&env.graph);
    assert_eq!(report.cycles.len(), 1);
    assert_eq!(report.cycles[0].len(), 5_001);

    let deleted = ops::cascade_delete(&mut env.graph, &ids[0]).unwrap();
    assert_eq!(deleted.len(), 5_000);
}

#[test]
fn test_nodes_behind_cycle_are_left_out_of_order() {
    let mut env = TestEnv::new();
    let a = env.create_task("A");
    let b = env.create_task("B");
    let downstream = env.create_task("Downstream");
    let free = env.create_task("Free");
    env.block(&a, &b);
    env.block(&b, &a);
    env.block(&b, &downstream);

    let topo = algo::topological_sort(&env.graph);
    assert_eq!(topo.order, [free]);
    let mut stuck = vec![a, b, downstream];
    stuck.sort();
    assert_eq!(topo.cycle_nodes, stuck);
}

// =============================================================================
// Identifier Edge Cases
// =============================================================================

#[test]
fn test_ambiguous_prefix_is_not_found() {
    let mut graph = GraphStore::new("prefix");
    // Fabricate two ids sharing a long prefix.
    let a: TaskNode = serde_json::from_value(serde_json::json!({
        "id": "abcdef01-0000-4000-8000-000000000001",
        "title": "A",
        "status": "ready",
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
    }))
    .unwrap();
    let mut b_json = serde_json::to_value(&a).unwrap();
    b_json["id"] = "abcdef01-0000-4000-8000-000000000002".into();
    let b: TaskNode = serde_json::from_value(b_json).unwrap();
    graph.add_node(a).unwrap();
    graph.add_node(b).unwrap();

    assert!(matches!(graph.resolve_id("abcdef01"), Err(Error::NotFound(_))));
    assert_eq!(
        graph.resolve_id("abcdef01-0000-4000-8000-00000000000").map_err(|e| e.to_string()),
        Err("task not found: abcdef01-0000-4000-8000-00000000000".to_string())
    );
    assert_eq!(
        graph.resolve_id("abcdef01-0000-4000-8000-000000000002").unwrap(),
        "abcdef01-0000-4000-8000-000000000002"
    );
}

// =============================================================================
// Cache Edge Cases
// =============================================================================

#[test]
fn test_disabled_cache_still_sorts() {
    let mut env = TestEnv::new();
    env.graph.set_cache_ttl(Duration::ZERO);
    let ids = env.chain(3);
    assert_eq!(algo::topological_sort(&env.graph).order, ids);
    assert!(env.graph.cache().is_empty());
}

#[test]
fn test_cache_cleared_by_node_removal() {
    let mut env = TestEnv::new();
    let ids = env.chain(3);
    algo::topological_sort(&env.graph);
    assert!(!env.graph.cache().is_empty());

    env.graph.remove_node(&ids[1]);
    assert!(env.graph.cache().is_empty());
    let order = algo::topological_sort(&env.graph).order;
    assert_eq!(order.len(), 2);
    assert!(!order.contains(&ids[1]));
}
