//! In-memory task graph.
//!
//! An edge `from -> to` means "`from` blocks `to`". The graph keeps three
//! views of the same edge set: the outgoing map, the incoming map, and each
//! node's blocker list. All three are only ever changed inside
//! [`GraphStore::add_edge`] and [`GraphStore::remove_edge`], which also clear
//! the topological order cache.

use crate::cache::TopoCache;
use crate::error::{Error, Result, ValidationError};
use crate::id::is_usable_prefix;
use crate::task::TaskNode;
use crate::types::{Edge, ProjectMetadata};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Serialized form of a graph: metadata, tasks and the normalized edge list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub metadata: ProjectMetadata,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// Adjacency-map graph of tasks.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    metadata: ProjectMetadata,
    nodes: BTreeMap<String, TaskNode>,
    outgoing: BTreeMap<String, BTreeSet<String>>,
    incoming: BTreeMap<String, BTreeSet<String>>,
    cache: TopoCache,
}

impl PartialEq for GraphStore {
    fn eq(&self, other: &Self) -> bool {
        self.metadata == other.metadata && self.nodes == other.nodes && self.outgoing == other.outgoing
    }
}

impl GraphStore {
    /// Create an empty graph for a project.
    pub fn new(project_name: impl Into<String>) -> Self {
        Self::with_metadata(ProjectMetadata::new(project_name))
    }

    pub fn with_metadata(metadata: ProjectMetadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    pub fn metadata(&self) -> &ProjectMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut ProjectMetadata {
        &mut self.metadata
    }

    pub fn cache(&self) -> &TopoCache {
        &self.cache
    }

    /// Change how long a computed topological order is reused.
    pub fn set_cache_ttl(&mut self, ttl: Duration) {
        self.cache.set_ttl(ttl);
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Insert a task. Its blocker list becomes incoming edges.
    pub fn add_node(&mut self, node: TaskNode) -> Result<()> {
        node.validate()?;
        let id = node.id().to_string();
        if self.nodes.contains_key(&id) {
            return Err(ValidationError::DuplicateId(id).into());
        }
        for blocker in node.blockers() {
            if blocker == &id {
                return Err(ValidationError::SelfEdge(id).into());
            }
            if !self.nodes.contains_key(blocker) {
                return Err(ValidationError::DanglingEdge(blocker.clone()).into());
            }
        }

        let blockers = node.blockers().to_vec();
        self.nodes.insert(id.clone(), node);
        for blocker in blockers {
            self.add_edge(&blocker, &id)?;
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.refresh_status();
        }
        self.cache.invalidate();
        log::debug!("added task {id}");
        Ok(())
    }

    /// Remove a task and every edge touching it.
    ///
    /// Dependents lose this task from their blocker lists. Returns the removed
    /// task, or `None` if it did not exist.
    pub fn remove_node(&mut self, id: &str) -> Option<TaskNode> {
        if !self.nodes.contains_key(id) {
            return None;
        }
        let successors: Vec<String> = self.outgoing(id).map(String::from).collect();
        let predecessors: Vec<String> = self.incoming(id).map(String::from).collect();
        for succ in &successors {
            self.remove_edge(id, succ);
        }
        for pred in &predecessors {
            self.remove_edge(pred, id);
        }
        self.outgoing.remove(id);
        self.incoming.remove(id);
        self.cache.invalidate();
        log::debug!("removed task {id}");
        self.nodes.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get_node(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.get(id)
    }

    /// Mutable access for checklist and field edits.
    pub fn get_node_mut(&mut self, id: &str) -> Option<&mut TaskNode> {
        self.nodes.get_mut(id)
    }

    /// Look up by full id, or by a unique prefix of at least 8 characters.
    pub fn get_node_by_id_or_prefix(&self, id_or_prefix: &str) -> Result<&TaskNode> {
        let id = self.resolve_id(id_or_prefix)?;
        self.nodes
            .get(&id)
            .ok_or_else(|| Error::NotFound(id_or_prefix.to_string()))
    }

    /// Resolve a full id or unique prefix to the full id.
    pub fn resolve_id(&self, id_or_prefix: &str) -> Result<String> {
        if self.nodes.contains_key(id_or_prefix) {
            return Ok(id_or_prefix.to_string());
        }
        if !is_usable_prefix(id_or_prefix) {
            return Err(Error::NotFound(id_or_prefix.to_string()));
        }
        let mut matches = self
            .nodes
            .range(id_or_prefix.to_string()..)
            .take_while(|(id, _)| id.starts_with(id_or_prefix))
            .map(|(id, _)| id);
        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id.clone()),
            _ => Err(Error::NotFound(id_or_prefix.to_string())),
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    /// All node ids in sorted order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Approve a task (see [`TaskNode::approve`]).
    pub fn approve(&mut self, id: &str) -> Result<()> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?
            .approve()
    }

    // =========================================================================
    // Edges
    // =========================================================================

    /// Add `from -> to`. Both tasks must exist; adding an existing edge is a no-op.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<()> {
        self.insert_adjacency(from, to)?;
        if let Some(blocked) = self.nodes.get_mut(to) {
            blocked.add_blocker(from);
        }
        self.cache.invalidate();
        Ok(())
    }

    fn insert_adjacency(&mut self, from: &str, to: &str) -> Result<()> {
        for endpoint in [from, to] {
            if !self.nodes.contains_key(endpoint) {
                return Err(ValidationError::DanglingEdge(endpoint.to_string()).into());
            }
        }
        self.outgoing
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.incoming
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
        Ok(())
    }

    /// Remove `from -> to`. Returns false if there was no such edge.
    pub fn remove_edge(&mut self, from: &str, to: &str) -> bool {
        let removed = self.outgoing.get_mut(from).is_some_and(|set| set.remove(to));
        if let Some(set) = self.incoming.get_mut(to) {
            set.remove(from);
        }
        if let Some(blocked) = self.nodes.get_mut(to) {
            blocked.remove_blocker(from);
        }
        if removed {
            self.cache.invalidate();
        }
        removed
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.outgoing.get(from).is_some_and(|set| set.contains(to))
    }

    /// Tasks blocked by `id`. Empty for unknown ids.
    pub fn outgoing<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.outgoing.get(id).into_iter().flatten().map(String::as_str)
    }

    /// Tasks blocking `id`. Empty for unknown ids.
    pub fn incoming<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.incoming.get(id).into_iter().flatten().map(String::as_str)
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.outgoing.get(id).map_or(0, BTreeSet::len)
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.incoming.get(id).map_or(0, BTreeSet::len)
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(BTreeSet::len).sum()
    }

    /// Normalized edge list, sorted by (from, to).
    pub fn edges(&self) -> Vec<Edge> {
        self.outgoing
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| Edge::new(from.clone(), to.clone())))
            .collect()
    }

    /// Tasks with no incoming edges.
    pub fn root_tasks(&self) -> Vec<&str> {
        self.node_ids().filter(|id| self.in_degree(id) == 0).collect()
    }

    /// Tasks with no edges at all.
    pub fn orphan_tasks(&self) -> Vec<&str> {
        self.node_ids()
            .filter(|id| self.in_degree(id) == 0 && self.out_degree(id) == 0)
            .collect()
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            metadata: self.metadata.clone(),
            tasks: self.nodes.clone(),
            edges: self.edges(),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.to_snapshot())?)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let snapshot: GraphSnapshot = serde_json::from_value(value.clone())?;
        Self::from_snapshot(snapshot)
    }

    /// Rebuild a graph from its serialized form.
    ///
    /// Edges must reference known tasks. Blocker ids that name no task are
    /// dropped with a warning; blockers without a matching edge get one.
    /// Repairs keep `updated_at`, and every status is re-derived.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        let mut graph = Self::with_metadata(snapshot.metadata);

        for (key, node) in snapshot.tasks {
            if key != node.id() {
                return Err(ValidationError::InvalidId(key).into());
            }
            node.validate()?;
            graph.nodes.insert(key, node);
        }

        for edge in &snapshot.edges {
            graph.insert_adjacency(&edge.from, &edge.to)?;
            if let Some(blocked) = graph.nodes.get_mut(&edge.to) {
                blocked.restore_blocker(&edge.from);
            }
        }

        let listed: Vec<(String, String)> = graph
            .nodes
            .values()
            .flat_map(|node| node.blockers().iter().map(|b| (b.clone(), node.id().to_string())))
            .collect();
        for (blocker, blocked) in listed {
            if graph.nodes.contains_key(&blocker) {
                graph.insert_adjacency(&blocker, &blocked)?;
            } else {
                log::warn!("dropping unknown blocker {blocker} from task {blocked}");
                if let Some(node) = graph.nodes.get_mut(&blocked) {
                    node.forget_blocker(&blocker);
                }
            }
        }

        // Stored status is not trusted; it is derived from the loaded fields.
        for node in graph.nodes.values_mut() {
            node.refresh_status();
        }

        Ok(graph)
    }
}
