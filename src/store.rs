//! Project-level load/save of the task graph.

use crate::config::{Config, DOCUMENT_FILE, PROJECT_DIR};
use crate::graph::{GraphSnapshot, GraphStore};
use crate::index::Indexes;
use crate::storage::{AtomicFileWriter, WriteOptions};
use chrono::Utc;
use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk document: the graph snapshot plus derived indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDocument {
    #[serde(flatten)]
    pub snapshot: GraphSnapshot,
    #[serde(default)]
    pub indexes: Indexes,
}

impl ProjectDocument {
    fn from_graph(graph: &GraphStore) -> Self {
        Self {
            snapshot: graph.to_snapshot(),
            indexes: Indexes::build(graph),
        }
    }
}

/// A taskweave project rooted at a directory.
pub struct ProjectStore {
    root: PathBuf,
    config: Config,
    writer: AtomicFileWriter,
}

impl ProjectStore {
    /// Create `.taskweave/` under `root` with an empty graph.
    pub fn init(root: &Path, project_name: &str) -> Result<Self> {
        let store = Self::with_config(root, Config::load(root)?);
        if store.writer.exists(&store.document_path()) {
            bail!("project already initialized at {}", store.document_path().display());
        }
        store
            .writer
            .ensure_dir(&root.join(PROJECT_DIR))
            .context("Failed to create project directory")?;

        let mut graph = GraphStore::new(project_name);
        store.save(&mut graph).context("Failed to write initial project document")?;
        log::info!("initialized project '{project_name}' at {}", root.display());
        Ok(store)
    }

    /// Open an existing project.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root).context("Failed to load project config")?;
        let store = Self::with_config(root, config);
        if !store.writer.exists(&store.document_path()) {
            bail!(
                "no taskweave project at {} (run `tw init` first)",
                root.display()
            );
        }
        Ok(store)
    }

    fn with_config(root: &Path, config: Config) -> Self {
        let writer = config.writer();
        Self {
            root: root.to_path_buf(),
            config,
            writer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn document_path(&self) -> PathBuf {
        self.root.join(PROJECT_DIR).join(DOCUMENT_FILE)
    }

    /// Read the document and rebuild the in-memory graph.
    pub fn load(&self) -> Result<GraphStore> {
        let mut graph = load_with(&self.writer, &self.document_path())?;
        graph.set_cache_ttl(self.config.topo_cache_ttl());
        Ok(graph)
    }

    /// Persist the graph, rebuilding every index. Returns the indexes written.
    pub fn save(&self, graph: &mut GraphStore) -> Result<Indexes> {
        save_with(
            &self.writer,
            self.config.write_options(),
            &self.document_path(),
            graph,
        )
    }

    /// Load, apply `mutate`, and save only if it succeeded.
    pub fn update<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut GraphStore) -> crate::Result<T>,
    {
        let mut graph = self.load()?;
        let value = mutate(&mut graph)?;
        self.save(&mut graph)?;
        Ok(value)
    }

    /// Ids of tasks matching every token of `query`, from the saved index.
    pub fn search(&self, query: &str) -> Result<Vec<String>> {
        let path = self.document_path();
        let document: ProjectDocument = self
            .writer
            .read_json(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(document.indexes.search(query))
    }
}

/// Load a graph from an explicit document path.
pub fn load(path: &Path) -> Result<GraphStore> {
    load_with(&AtomicFileWriter::default(), path)
}

/// Save a graph to an explicit document path with default settings.
pub fn save(path: &Path, graph: &mut GraphStore) -> Result<()> {
    save_with(&AtomicFileWriter::default(), WriteOptions::default(), path, graph)?;
    Ok(())
}

fn load_with(writer: &AtomicFileWriter, path: &Path) -> Result<GraphStore> {
    let document: ProjectDocument = writer
        .read_json(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let graph = GraphStore::from_snapshot(document.snapshot)
        .with_context(|| format!("Invalid project document {}", path.display()))?;
    log::debug!("loaded {} tasks from {}", graph.node_count(), path.display());
    Ok(graph)
}

fn save_with(
    writer: &AtomicFileWriter,
    options: WriteOptions,
    path: &Path,
    graph: &mut GraphStore,
) -> Result<Indexes> {
    graph.metadata_mut().updated_at = Utc::now();
    let document = ProjectDocument::from_graph(graph);
    writer
        .write_json(path, &document, options)
        .with_context(|| format!("Failed to save {}", path.display()))?;
    log::info!(
        "saved {} tasks, {} edges to {}",
        graph.node_count(),
        graph.edge_count(),
        path.display()
    );
    Ok(document.indexes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::task::TaskNode;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ProjectStore) {
        let temp = TempDir::new().unwrap();
        let store = ProjectStore::init(temp.path(), "demo").unwrap();
        (temp, store)
    }

    #[test]
    fn test_init_and_open() {
        let (temp, store) = setup();
        assert!(store.document_path().exists());
        let graph = store.load().unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.metadata().project_name, "demo");

        assert!(ProjectStore::open(temp.path()).is_ok());
        assert!(ProjectStore::init(temp.path(), "again").is_err());
    }

    #[test]
    fn test_open_missing_project() {
        let temp = TempDir::new().unwrap();
        let err = ProjectStore::open(temp.path()).err().unwrap();
        assert!(err.to_string().contains("tw init"));
    }

    #[test]
    fn test_save_load_preserves_graph() {
        let (_temp, store) = setup();
        let mut graph = store.load().unwrap();
        let a = TaskNode::new("first").unwrap();
        let b = TaskNode::new("second").unwrap();
        let (a_id, b_id) = (a.id().to_string(), b.id().to_string());
        graph.add_node(a).unwrap();
        graph.add_node(b).unwrap();
        graph.add_edge(&a_id, &b_id).unwrap();

        let indexes = store.save(&mut graph).unwrap();
        assert_eq!(indexes.root_tasks, [a_id.clone()]);

        let loaded = store.load().unwrap();
        assert_eq!(loaded, graph);
        assert_eq!(loaded.get_node(&b_id).unwrap().blockers(), [a_id]);
    }

    #[test]
    fn test_update_does_not_save_on_error() {
        let (_temp, store) = setup();
        let before = std::fs::read(store.document_path()).unwrap();
        let result = store.update(|graph| graph.add_edge("x", "y"));
        assert!(result.is_err());
        assert_eq!(std::fs::read(store.document_path()).unwrap(), before);
    }

    #[test]
    fn test_typed_error_downcasts() {
        let (_temp, store) = setup();
        let err = store.update(|graph| graph.resolve_id("deadbeefcafe")).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotFound(_))));
    }

    #[test]
    fn test_search_uses_saved_index() {
        let (_temp, store) = setup();
        let id = store
            .update(|graph| {
                let node = TaskNode::new("Render markdown preview")?;
                let id = node.id().to_string();
                graph.add_node(node)?;
                Ok(id)
            })
            .unwrap();
        assert_eq!(store.search("markdown").unwrap(), [id]);
        assert!(store.search("missing").unwrap().is_empty());
    }

    #[test]
    fn test_free_functions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("graph.json");
        let mut graph = GraphStore::new("loose");
        graph.add_node(TaskNode::new("solo").unwrap()).unwrap();
        save(&path, &mut graph).unwrap();
        assert_eq!(load(&path).unwrap(), graph);
    }
}
