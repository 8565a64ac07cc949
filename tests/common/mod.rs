//! Shared test infrastructure for taskweave integration tests.
//!
//! Provides TestEnv helper for consistent test setup/teardown.

#![allow(dead_code)]

use taskweave::{GraphStore, ProjectStore, Status, TaskBuilder, TaskNode};
use tempfile::TempDir;

/// Test environment with automatic cleanup.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub store: ProjectStore,
    pub graph: GraphStore,
}

impl TestEnv {
    /// Create a new test environment with an initialized project.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = ProjectStore::init(temp_dir.path(), "test").expect("Failed to init project");
        let graph = store.load().expect("Failed to load project");
        Self { temp_dir, store, graph }
    }

    /// Add a task with only a title.
    pub fn create_task(&mut self, title: &str) -> String {
        self.add(TaskNode::new(title).expect("Failed to build task"))
    }

    /// Add a task with success criteria.
    pub fn create_task_with_criteria(&mut self, title: &str, criteria: &[&str]) -> String {
        let node = TaskBuilder::new(title)
            .criteria(criteria.iter().copied())
            .build()
            .expect("Failed to build task");
        self.add(node)
    }

    /// Add a prebuilt task and return its id.
    pub fn add(&mut self, node: TaskNode) -> String {
        let id = node.id().to_string();
        self.graph.add_node(node).expect("Failed to add task");
        id
    }

    /// `blocker` blocks `blocked`.
    pub fn block(&mut self, blocker: &str, blocked: &str) {
        self.graph.add_edge(blocker, blocked).expect("Failed to add edge");
    }

    /// A linear chain t0 -> t1 -> ... of `len` tasks.
    pub fn chain(&mut self, len: usize) -> Vec<String> {
        let ids: Vec<String> = (0..len).map(|i| self.create_task(&format!("Task {i}"))).collect();
        for pair in ids.windows(2) {
            self.block(&pair[0], &pair[1]);
        }
        ids
    }

    pub fn task(&self, id: &str) -> &TaskNode {
        self.graph.get_node(id).expect("Task not found")
    }

    pub fn status(&self, id: &str) -> Status {
        self.task(id).status()
    }

    /// Complete every criterion of a task.
    pub fn complete_criteria(&mut self, id: &str) {
        let node = self.graph.get_node_mut(id).expect("Task not found");
        let item_ids: Vec<String> = node.criteria().iter().map(|c| c.id.clone()).collect();
        for item in item_ids {
            node.set_criterion_completed(&item, true).expect("Failed to complete criterion");
        }
    }

    /// Save the in-memory graph.
    pub fn save(&mut self) {
        self.store.save(&mut self.graph).expect("Failed to save");
    }

    /// Load a fresh copy from disk.
    pub fn reload(&self) -> GraphStore {
        self.store.load().expect("Failed to load")
    }

    /// Assert that a task is absent and that nothing references it.
    pub fn assert_gone(&self, id: &str) {
        assert!(!self.graph.contains(id), "Expected task {id} to be removed");
        for edge in self.graph.edges() {
            assert!(edge.from != id && edge.to != id, "Dangling edge {edge:?}");
        }
        for node in self.graph.nodes() {
            assert!(
                !node.blockers().iter().any(|b| b == id),
                "Task {} still lists {id} as a blocker",
                node.id()
            );
        }
    }

    pub fn assert_status(&self, id: &str, expected: Status) {
        assert_eq!(
            self.status(id),
            expected,
            "Expected task {} ({}) to be {expected}",
            id,
            self.task(id).title()
        );
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
