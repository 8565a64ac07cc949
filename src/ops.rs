//! Composite structural mutations.
//!
//! Built from [`GraphStore`] primitives and the read-only algorithms. Every
//! precondition is checked before the first mutation, so a failed operation
//! leaves the graph untouched.

use crate::algo::would_create_cycle;
use crate::error::{Error, PreconditionError, Result, ValidationError};
use crate::graph::GraphStore;
use crate::task::TaskNode;
use crate::types::Edge;
use std::collections::HashSet;

/// What [`cut_node`] did.
#[derive(Debug, Clone)]
pub struct CutReport {
    pub removed: TaskNode,
    /// Bypass edges created from predecessors to successors.
    pub added_edges: Vec<Edge>,
}

fn require(graph: &GraphStore, id: &str) -> Result<()> {
    if graph.contains(id) {
        Ok(())
    } else {
        Err(Error::NotFound(id.to_string()))
    }
}

fn owned(ids: impl Iterator<Item = impl Into<String>>) -> Vec<String> {
    ids.map(Into::into).collect()
}

/// Splice a task out of the graph, reconnecting around it.
///
/// Every predecessor is wired to every successor (complete bipartite
/// reconnection), skipping edges that already exist and self-loops. A chain
/// `A -> B -> C` becomes `A -> C` when `B` is cut.
pub fn cut_node(graph: &mut GraphStore, id: &str) -> Result<CutReport> {
    require(graph, id)?;

    let preds = owned(graph.incoming(id).filter(|p| *p != id));
    let succs = owned(graph.outgoing(id).filter(|s| *s != id));

    let mut added_edges = Vec::new();
    for pred in &preds {
        for succ in &succs {
            if pred == succ || graph.has_edge(pred, succ) {
                continue;
            }
            graph.add_edge(pred, succ)?;
            added_edges.push(Edge::new(pred.clone(), succ.clone()));
        }
    }

    let removed = graph
        .remove_node(id)
        .ok_or_else(|| Error::NotFound(id.to_string()))?;
    log::info!("cut task {id}, added {} bypass edge(s)", added_edges.len());
    Ok(CutReport { removed, added_edges })
}

/// Delete a task and everything reachable from it along outgoing edges.
///
/// Returns the deleted ids in deletion order. Cycles are safe: each task is
/// removed before its successors are visited, and a visited set guards
/// re-entry.
pub fn cascade_delete(graph: &mut GraphStore, id: &str) -> Result<Vec<String>> {
    require(graph, id)?;

    let mut visited: HashSet<String> = HashSet::new();
    let mut stack = vec![id.to_string()];
    let mut deleted = Vec::new();

    while let Some(current) = stack.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let succs = owned(graph.outgoing(&current));
        if graph.remove_node(&current).is_some() {
            deleted.push(current);
        }
        stack.extend(succs.into_iter().rev());
    }

    log::info!("cascade delete from {id} removed {} task(s)", deleted.len());
    Ok(deleted)
}

/// Merge `source` into `target` and delete `source`.
///
/// Checklists are appended with fresh item ids, related files are
/// de-duplicated, notes are concatenated. Edges touching `source` are moved
/// to `target`, skipping any that would be a self-loop or a duplicate.
pub fn merge_tasks(graph: &mut GraphStore, source: &str, target: &str) -> Result<()> {
    if source == target {
        return Err(ValidationError::SelfMerge(source.to_string()).into());
    }
    require(graph, source)?;
    require(graph, target)?;

    let preds = owned(graph.incoming(source));
    let succs = owned(graph.outgoing(source));
    let absorbed = graph
        .get_node(source)
        .cloned()
        .ok_or_else(|| Error::NotFound(source.to_string()))?;

    if let Some(node) = graph.get_node_mut(target) {
        node.absorb(&absorbed);
    }

    for pred in preds.iter().filter(|p| *p != source && *p != target) {
        if !graph.has_edge(pred, target) {
            graph.add_edge(pred, target)?;
        }
    }
    for succ in succs.iter().filter(|s| *s != source && *s != target) {
        if !graph.has_edge(target, succ) {
            graph.add_edge(target, succ)?;
        }
    }

    graph.remove_node(source);
    log::info!("merged task {source} into {target}");
    Ok(())
}

/// Insert `b` into the existing edge `a -> c`, giving `a -> b -> c`.
///
/// Each new blocker edge needs a rationale, stored on the blocked task:
/// `b_rationale` on `b` (blocked by `a`) and `c_rationale` on `c` (now
/// blocked by `b`). Any failed precondition is reported by name and the
/// graph is left unchanged.
pub fn wire_insert(
    graph: &mut GraphStore,
    a: &str,
    b: &str,
    c: &str,
    b_rationale: &str,
    c_rationale: &str,
) -> Result<()> {
    for id in [a, b, c] {
        require(graph, id)?;
    }
    if b == a || b == c {
        return Err(PreconditionError::InsertedIsEndpoint(b.to_string()).into());
    }
    if a == c {
        return Err(PreconditionError::SameEndpoints(a.to_string()).into());
    }
    if !graph.has_edge(a, c) {
        return Err(PreconditionError::MissingEdge {
            from: a.to_string(),
            to: c.to_string(),
        }
        .into());
    }
    if !graph.get_node(c).is_some_and(|node| node.blockers().iter().any(|x| x == a)) {
        return Err(PreconditionError::MissingBlocker {
            blocker: a.to_string(),
            blocked: c.to_string(),
        }
        .into());
    }
    for (task, rationale) in [(b, b_rationale), (c, c_rationale)] {
        if rationale.trim().is_empty() {
            return Err(PreconditionError::MissingRationale(task.to_string()).into());
        }
    }
    for (from, to) in [(a, b), (b, c)] {
        if would_create_cycle(graph, from, to) {
            return Err(PreconditionError::WouldCreateCycle {
                from: from.to_string(),
                to: to.to_string(),
            }
            .into());
        }
    }

    graph.remove_edge(a, c);
    graph.add_edge(a, b)?;
    graph.add_edge(b, c)?;
    for (task, rationale) in [(b, b_rationale), (c, c_rationale)] {
        if let Some(node) = graph.get_node_mut(task) {
            node.set_dependency_rationale(Some(rationale.trim().to_string()));
        }
    }

    log::info!("inserted {b} between {a} and {c}");
    Ok(())
}

/// Add `blocker -> blocked` with a required justification.
///
/// Rejects self-edges, duplicates, empty rationales and edges that would
/// close a cycle. The rationale is appended to the blocked task's
/// dependency text.
pub fn link(graph: &mut GraphStore, blocker: &str, blocked: &str, rationale: &str) -> Result<()> {
    require(graph, blocker)?;
    require(graph, blocked)?;
    if blocker == blocked {
        return Err(ValidationError::SelfEdge(blocker.to_string()).into());
    }
    let rationale = rationale.trim();
    if rationale.is_empty() {
        return Err(PreconditionError::MissingRationale(blocked.to_string()).into());
    }
    if graph.has_edge(blocker, blocked) {
        return Err(PreconditionError::EdgeExists {
            from: blocker.to_string(),
            to: blocked.to_string(),
        }
        .into());
    }
    if would_create_cycle(graph, blocker, blocked) {
        return Err(PreconditionError::WouldCreateCycle {
            from: blocker.to_string(),
            to: blocked.to_string(),
        }
        .into());
    }

    graph.add_edge(blocker, blocked)?;
    if let Some(node) = graph.get_node_mut(blocked) {
        let text = match node.dependency_rationale() {
            Some(existing) => format!("{existing}\n{rationale}"),
            None => rationale.to_string(),
        };
        node.set_dependency_rationale(Some(text));
    }
    log::debug!("linked {blocker} -> {blocked}");
    Ok(())
}

/// Remove `blocker -> blocked`. Returns false if the edge did not exist.
pub fn unlink(graph: &mut GraphStore, blocker: &str, blocked: &str) -> Result<bool> {
    require(graph, blocker)?;
    require(graph, blocked)?;
    Ok(graph.remove_edge(blocker, blocked))
}
