//! Graph algorithms over a [`GraphStore`].
//!
//! All functions are read-only. Traversals use explicit stacks/queues so
//! deep graphs cannot exhaust the call stack.

use crate::cache::fingerprint;
use crate::error::{Error, Result};
use crate::graph::GraphStore;
use crate::task::TaskNode;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Result of a topological sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopoOrder {
    /// Tasks in dependency order (blockers first).
    pub order: Vec<String>,
    /// Tasks left over because they sit on or behind a cycle, sorted.
    pub cycle_nodes: Vec<String>,
}

impl TopoOrder {
    pub fn has_cycle(&self) -> bool {
        !self.cycle_nodes.is_empty()
    }
}

/// All cycles found by one depth-first pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Each cycle is a path whose first and last element are the same task.
    pub cycles: Vec<Vec<String>>,
}

impl CycleReport {
    pub fn has_cycle(&self) -> bool {
        !self.cycles.is_empty()
    }
}

/// Longest weighted chain through a DAG.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CriticalPath {
    pub path: Vec<String>,
    pub length: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

struct Frame<'a> {
    node: &'a str,
    neighbors: Vec<&'a str>,
    next: usize,
}

impl<'a> Frame<'a> {
    fn new(graph: &'a GraphStore, node: &'a str) -> Self {
        Self {
            node,
            neighbors: graph.outgoing(node).collect(),
            next: 0,
        }
    }
}

// =============================================================================
// Cycle detection
// =============================================================================

/// Find cycles with a three-color depth-first search.
///
/// Every back edge to a node still on the stack yields one cycle, so all
/// cycles reachable this way are reported, not just the first.
pub fn detect_cycles(graph: &GraphStore) -> CycleReport {
    let mut color: HashMap<&str, Color> = graph.node_ids().map(|id| (id, Color::White)).collect();
    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut cycles = Vec::new();

    for start in graph.node_ids() {
        if color.get(start) != Some(&Color::White) {
            continue;
        }
        color.insert(start, Color::Gray);
        let mut stack = vec![Frame::new(graph, start)];

        while let Some(frame) = stack.last_mut() {
            let node = frame.node;
            let next = frame.neighbors.get(frame.next).copied();
            frame.next += 1;

            let Some(next) = next else {
                color.insert(node, Color::Black);
                stack.pop();
                continue;
            };

            match color.get(next).copied().unwrap_or(Color::Black) {
                Color::White => {
                    parent.insert(next, node);
                    color.insert(next, Color::Gray);
                    stack.push(Frame::new(graph, next));
                }
                Color::Gray => cycles.push(reconstruct_cycle(&parent, node, next)),
                Color::Black => {}
            }
        }
    }

    CycleReport { cycles }
}

/// Walk parent pointers from `current` back to the gray node and close the loop.
fn reconstruct_cycle(parent: &HashMap<&str, &str>, current: &str, gray: &str) -> Vec<String> {
    let mut path = vec![current.to_string()];
    let mut cursor = current;
    while cursor != gray {
        match parent.get(cursor) {
            Some(&up) => {
                path.push(up.to_string());
                cursor = up;
            }
            None => break,
        }
    }
    path.reverse();
    path.push(gray.to_string());
    path
}

/// Fail with the first discovered cycle, if any.
pub fn validate_acyclic(graph: &GraphStore) -> Result<()> {
    match detect_cycles(graph).cycles.into_iter().next() {
        Some(cycle) => Err(Error::CircularDependency { cycle }),
        None => Ok(()),
    }
}

/// Whether adding `from -> to` would close a cycle.
pub fn would_create_cycle(graph: &GraphStore, from: &str, to: &str) -> bool {
    if from == to {
        return true;
    }
    // DFS from 'to': if 'from' is reachable, from -> to closes a loop.
    let mut visited = HashSet::new();
    let mut stack = vec![to];
    while let Some(node) = stack.pop() {
        if node == from {
            return true;
        }
        if visited.insert(node) {
            stack.extend(graph.outgoing(node));
        }
    }
    false
}

// =============================================================================
// Ordering
// =============================================================================

/// Topological order via Kahn's algorithm, memoized in the graph's cache.
pub fn topological_sort(graph: &GraphStore) -> TopoOrder {
    let meta = graph.metadata();
    let key = fingerprint(&meta.project_name, &meta.version, graph.node_ids());
    if let Some(hit) = graph.cache().get(&key) {
        return hit;
    }
    let order = kahn(graph);
    graph.cache().put(key, order.clone());
    order
}

fn kahn(graph: &GraphStore) -> TopoOrder {
    let mut in_degree: HashMap<&str, usize> = graph.node_ids().map(|id| (id, 0)).collect();
    for id in graph.node_ids() {
        for succ in graph.outgoing(id) {
            *in_degree.entry(succ).or_default() += 1;
        }
    }

    let mut queue: VecDeque<&str> = graph.node_ids().filter(|id| in_degree[id] == 0).collect();
    let mut order = Vec::with_capacity(graph.node_count());

    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        for succ in graph.outgoing(id) {
            if let Some(deg) = in_degree.get_mut(succ) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(succ);
                }
            }
        }
    }

    let cycle_nodes = if order.len() < graph.node_count() {
        let placed: HashSet<&str> = order.iter().map(String::as_str).collect();
        graph
            .node_ids()
            .filter(|id| !placed.contains(id))
            .map(String::from)
            .collect()
    } else {
        Vec::new()
    };

    TopoOrder { order, cycle_nodes }
}

fn require_dag(graph: &GraphStore) -> Result<TopoOrder> {
    let topo = topological_sort(graph);
    if topo.has_cycle() {
        let cycle = detect_cycles(graph)
            .cycles
            .into_iter()
            .next()
            .unwrap_or_else(|| topo.cycle_nodes.clone());
        return Err(Error::CircularDependency { cycle });
    }
    Ok(topo)
}

/// Batches of mutually independent tasks, found by peeling zero in-degree frontiers.
pub fn execution_levels(graph: &GraphStore) -> Result<Vec<Vec<String>>> {
    require_dag(graph)?;

    let mut in_degree: HashMap<&str, usize> =
        graph.node_ids().map(|id| (id, graph.in_degree(id))).collect();
    let mut frontier: Vec<&str> = graph.node_ids().filter(|id| in_degree[id] == 0).collect();
    let mut levels = Vec::new();

    while !frontier.is_empty() {
        let mut next = BTreeSet::new();
        for id in &frontier {
            for succ in graph.outgoing(id) {
                if let Some(deg) = in_degree.get_mut(succ) {
                    *deg -= 1;
                    if *deg == 0 {
                        next.insert(succ);
                    }
                }
            }
        }
        levels.push(frontier.iter().map(|id| id.to_string()).collect());
        frontier = next.into_iter().collect();
    }

    Ok(levels)
}

/// Longest chain by total weight, using dynamic programming over the topological order.
pub fn critical_path<F>(graph: &GraphStore, weight: F) -> Result<CriticalPath>
where
    F: Fn(&TaskNode) -> u64,
{
    let topo = require_dag(graph)?;

    let mut dist: HashMap<&str, u64> = HashMap::new();
    let mut prev: HashMap<&str, &str> = HashMap::new();
    let mut best: Option<(&str, u64)> = None;

    for id in &topo.order {
        let id = id.as_str();
        let own = graph.get_node(id).map_or(0, &weight);
        let mut reach = 0;
        let mut via = None;
        for pred in graph.incoming(id) {
            let d = dist.get(pred).copied().unwrap_or(0);
            if via.is_none() || d > reach {
                reach = d;
                via = Some(pred);
            }
        }
        if let Some(pred) = via {
            prev.insert(id, pred);
        }
        let total = reach + own;
        dist.insert(id, total);
        if best.is_none_or(|(_, len)| total > len) {
            best = Some((id, total));
        }
    }

    let Some((end, length)) = best else {
        return Ok(CriticalPath::default());
    };

    let mut path = vec![end.to_string()];
    let mut cursor = end;
    while let Some(&up) = prev.get(cursor) {
        path.push(up.to_string());
        cursor = up;
    }
    path.reverse();

    Ok(CriticalPath { path, length })
}

/// Critical path where every task counts as one unit.
pub fn critical_path_unit(graph: &GraphStore) -> Result<CriticalPath> {
    critical_path(graph, |_| 1)
}

// =============================================================================
// Traversal
// =============================================================================

/// Every task reachable from `id` along outgoing edges, in BFS order.
pub fn descendants(graph: &GraphStore, id: &str) -> Vec<String> {
    bfs(id, |node| graph.outgoing(node).collect())
}

/// Every task from which `id` is reachable, in BFS order.
pub fn ancestors(graph: &GraphStore, id: &str) -> Vec<String> {
    bfs(id, |node| graph.incoming(node).collect())
}

fn bfs<'a, F>(start: &'a str, neighbors: F) -> Vec<String>
where
    F: Fn(&'a str) -> Vec<&'a str>,
{
    let mut seen: HashSet<&str> = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    let mut found = Vec::new();
    while let Some(node) = queue.pop_front() {
        for next in neighbors(node) {
            if seen.insert(next) {
                found.push(next.to_string());
                queue.push_back(next);
            }
        }
    }
    found
}

/// Weakly connected components, each sorted, ordered by smallest member.
pub fn connected_components(graph: &GraphStore) -> Vec<Vec<String>> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut components = Vec::new();

    for start in graph.node_ids() {
        if !seen.insert(start) {
            continue;
        }
        let mut members = BTreeSet::from([start]);
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for next in graph.outgoing(node).chain(graph.incoming(node)) {
                if seen.insert(next) {
                    members.insert(next);
                    stack.push(next);
                }
            }
        }
        components.push(members.into_iter().map(String::from).collect());
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(n: usize) -> (GraphStore, Vec<String>) {
        let mut graph = GraphStore::new("algo");
        let mut ids = Vec::new();
        for i in 0..n {
            let node = TaskNode::new(format!("Task {i}")).unwrap();
            ids.push(node.id().to_string());
            graph.add_node(node).unwrap();
        }
        (graph, ids)
    }

    fn position(order: &[String], id: &str) -> usize {
        order.iter().position(|x| x == id).unwrap()
    }

    #[test]
    fn test_no_cycles_in_chain() {
        let (mut g, ids) = graph_with(3);
        g.add_edge(&ids[0], &ids[1]).unwrap();
        g.add_edge(&ids[1], &ids[2]).unwrap();
        assert!(!detect_cycles(&g).has_cycle());
        assert!(validate_acyclic(&g).is_ok());
    }

    #[test]
    fn test_cycle_path_is_closed() {
        let (mut g, ids) = graph_with(3);
        g.add_edge(&ids[0], &ids[1]).unwrap();
        g.add_edge(&ids[1], &ids[2]).unwrap();
        g.add_edge(&ids[2], &ids[0]).unwrap();

        let report = detect_cycles(&g);
        assert_eq!(report.cycles.len(), 1);
        let cycle = &report.cycles[0];
        assert_eq!(cycle.len(), 4);
        assert_eq!(cycle.first(), cycle.last());
        let members: HashSet<&String> = cycle.iter().collect();
        assert_eq!(members.len(), 3);

        let err = validate_acyclic(&g).unwrap_err();
        assert_eq!(err.cycle().unwrap(), cycle.as_slice());
    }

    #[test]
    fn test_self_loop_is_one_edge_cycle() {
        let (mut g, ids) = graph_with(1);
        g.add_edge(&ids[0], &ids[0]).unwrap();
        let report = detect_cycles(&g);
        assert_eq!(report.cycles, vec![vec![ids[0].clone(), ids[0].clone()]]);
    }

    #[test]
    fn test_reports_multiple_cycles() {
        let (mut g, ids) = graph_with(4);
        g.add_edge(&ids[0], &ids[1]).unwrap();
        g.add_edge(&ids[1], &ids[0]).unwrap();
        g.add_edge(&ids[2], &ids[3]).unwrap();
        g.add_edge(&ids[3], &ids[2]).unwrap();
        assert_eq!(detect_cycles(&g).cycles.len(), 2);
    }

    #[test]
    fn test_topological_sort_respects_edges() {
        let (mut g, ids) = graph_with(4);
        g.add_edge(&ids[3], &ids[1]).unwrap();
        g.add_edge(&ids[1], &ids[0]).unwrap();
        g.add_edge(&ids[2], &ids[0]).unwrap();

        let topo = topological_sort(&g);
        assert!(!topo.has_cycle());
        assert_eq!(topo.order.len(), 4);
        for edge in g.edges() {
            assert!(position(&topo.order, &edge.from) < position(&topo.order, &edge.to));
        }
    }

    #[test]
    fn test_topological_sort_reports_cycle_nodes() {
        let (mut g, ids) = graph_with(3);
        g.add_edge(&ids[0], &ids[1]).unwrap();
        g.add_edge(&ids[1], &ids[0]).unwrap();

        let topo = topological_sort(&g);
        assert_eq!(topo.order, vec![ids[2].clone()]);
        let mut expected = vec![ids[0].clone(), ids[1].clone()];
        expected.sort();
        assert_eq!(topo.cycle_nodes, expected);
    }

    #[test]
    fn test_sort_after_mutation_is_fresh() {
        let (mut g, ids) = graph_with(2);
        let first = topological_sort(&g);
        assert_eq!(first.order.len(), 2);

        g.add_edge(&ids[1], &ids[0]).unwrap();
        let second = topological_sort(&g);
        assert_eq!(second.order, vec![ids[1].clone(), ids[0].clone()]);
    }

    #[test]
    fn test_would_create_cycle() {
        let (mut g, ids) = graph_with(3);
        g.add_edge(&ids[0], &ids[1]).unwrap();
        g.add_edge(&ids[1], &ids[2]).unwrap();
        assert!(would_create_cycle(&g, &ids[2], &ids[0]));
        assert!(would_create_cycle(&g, &ids[0], &ids[0]));
        assert!(!would_create_cycle(&g, &ids[0], &ids[2]));
    }

    #[test]
    fn test_execution_levels() {
        let (mut g, ids) = graph_with(4);
        // 0 -> 2, 1 -> 2, 2 -> 3
        g.add_edge(&ids[0], &ids[2]).unwrap();
        g.add_edge(&ids[1], &ids[2]).unwrap();
        g.add_edge(&ids[2], &ids[3]).unwrap();

        let levels = execution_levels(&g).unwrap();
        assert_eq!(levels.len(), 3);
        let mut first = vec![ids[0].clone(), ids[1].clone()];
        first.sort();
        assert_eq!(levels[0], first);
        assert_eq!(levels[1], vec![ids[2].clone()]);
        assert_eq!(levels[2], vec![ids[3].clone()]);
    }

    #[test]
    fn test_execution_levels_rejects_cycle() {
        let (mut g, ids) = graph_with(2);
        g.add_edge(&ids[0], &ids[1]).unwrap();
        g.add_edge(&ids[1], &ids[0]).unwrap();
        assert!(matches!(
            execution_levels(&g),
            Err(Error::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_critical_path_unit() {
        let (mut g, ids) = graph_with(5);
        // long: 0 -> 1 -> 2 -> 3, short: 4 -> 3
        g.add_edge(&ids[0], &ids[1]).unwrap();
        g.add_edge(&ids[1], &ids[2]).unwrap();
        g.add_edge(&ids[2], &ids[3]).unwrap();
        g.add_edge(&ids[4], &ids[3]).unwrap();

        let cp = critical_path_unit(&g).unwrap();
        assert_eq!(cp.length, 4);
        assert_eq!(cp.path, vec![ids[0].clone(), ids[1].clone(), ids[2].clone(), ids[3].clone()]);
    }

    #[test]
    fn test_critical_path_weighted() {
        let (mut g, ids) = graph_with(3);
        g.add_edge(&ids[0], &ids[2]).unwrap();
        g.add_edge(&ids[1], &ids[2]).unwrap();
        let heavy = ids[1].clone();
        let cp = critical_path(&g, |t| if t.id() == heavy { 10 } else { 1 }).unwrap();
        assert_eq!(cp.length, 11);
        assert_eq!(cp.path, vec![ids[1].clone(), ids[2].clone()]);
    }

    #[test]
    fn test_critical_path_empty_graph() {
        let g = GraphStore::new("empty");
        assert_eq!(critical_path_unit(&g).unwrap(), CriticalPath::default());
    }

    #[test]
    fn test_descendants_and_ancestors() {
        let (mut g, ids) = graph_with(4);
        g.add_edge(&ids[0], &ids[1]).unwrap();
        g.add_edge(&ids[1], &ids[2]).unwrap();
        g.add_edge(&ids[0], &ids[2]).unwrap();

        let mut desc = descendants(&g, &ids[0]);
        desc.sort();
        let mut expected = vec![ids[1].clone(), ids[2].clone()];
        expected.sort();
        assert_eq!(desc, expected);
        assert_eq!(ancestors(&g, &ids[1]), vec![ids[0].clone()]);
        assert!(descendants(&g, &ids[3]).is_empty());
    }

    #[test]
    fn test_connected_components() {
        let (mut g, ids) = graph_with(4);
        g.add_edge(&ids[0], &ids[1]).unwrap();
        g.add_edge(&ids[2], &ids[1]).unwrap();

        let comps = connected_components(&g);
        assert_eq!(comps.len(), 2);
        let sizes: BTreeSet<usize> = comps.iter().map(Vec::len).collect();
        assert_eq!(sizes, BTreeSet::from([1, 3]));
    }
}
