//! Secondary indexes persisted alongside the graph.
//!
//! Rebuilt from scratch on every save. Nothing reads them back to
//! reconstruct the graph; they exist for fast lookups by other readers.

use crate::graph::GraphStore;
use crate::types::{Priority, Status};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Shortest token kept in the search index.
pub const MIN_TOKEN_LEN: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indexes {
    pub by_status: BTreeMap<String, Vec<String>>,
    pub by_priority: BTreeMap<String, Vec<String>>,
    pub root_tasks: Vec<String>,
    pub orphan_tasks: Vec<String>,
    pub search_text: BTreeMap<String, Vec<String>>,
    pub files: BTreeMap<String, Vec<String>>,
}

impl Indexes {
    /// Build every index from the current graph.
    pub fn build(graph: &GraphStore) -> Self {
        let mut by_status: BTreeMap<String, Vec<String>> =
            Status::ALL.iter().map(|s| (s.as_str().to_string(), Vec::new())).collect();
        let mut by_priority: BTreeMap<String, Vec<String>> =
            Priority::ALL.iter().map(|p| (p.as_str().to_string(), Vec::new())).collect();
        let mut search: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut files: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for node in graph.nodes() {
            let id = node.id().to_string();
            by_status.entry(node.status().as_str().to_string()).or_default().push(id.clone());
            by_priority
                .entry(node.priority().as_str().to_string())
                .or_default()
                .push(id.clone());

            for token in tokenize(&node.search_text()) {
                search.entry(token).or_default().insert(id.clone());
            }
            for path in node.file_refs() {
                files.entry(path.to_string()).or_default().insert(id.clone());
            }
        }

        Self {
            by_status,
            by_priority,
            root_tasks: graph.root_tasks().into_iter().map(String::from).collect(),
            orphan_tasks: graph.orphan_tasks().into_iter().map(String::from).collect(),
            search_text: flatten(search),
            files: flatten(files),
        }
    }

    /// Ids of tasks whose text contains every token of `query`.
    ///
    /// A query with no usable tokens matches nothing.
    pub fn search(&self, query: &str) -> Vec<String> {
        let mut tokens = tokenize(query).into_iter();
        let Some(first) = tokens.next() else {
            return Vec::new();
        };
        let mut hits: BTreeSet<&String> = match self.search_text.get(&first) {
            Some(ids) => ids.iter().collect(),
            None => return Vec::new(),
        };
        for token in tokens {
            let Some(ids) = self.search_text.get(&token) else {
                return Vec::new();
            };
            hits.retain(|id| ids.contains(id));
        }
        hits.into_iter().cloned().collect()
    }

    /// Ids of tasks that reference `path`.
    pub fn tasks_for_file(&self, path: &str) -> &[String] {
        self.files.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    /// Ids of tasks currently in `status`.
    pub fn tasks_with_status(&self, status: Status) -> &[String] {
        self.by_status.get(status.as_str()).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Lowercased alphanumeric runs, deduplicated, shorter ones dropped.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .collect()
}

fn flatten(map: BTreeMap<String, BTreeSet<String>>) -> BTreeMap<String, Vec<String>> {
    map.into_iter().map(|(k, v)| (k, v.into_iter().collect())).collect()
}
