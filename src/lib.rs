//! Taskweave: a task dependency graph with crash-safe JSON persistence.
//!
//! Tasks carry success criteria, deliverables and review fixes; their
//! status is derived from that checklist state and from their blockers.
//! Blocking relationships form a directed graph that supports cycle
//! detection, topological ordering, critical paths and structural edits
//! such as cutting, merging and inserting tasks.
//!
//! # Example
//!
//! ```no_run
//! use taskweave::{ProjectStore, TaskBuilder, algo, ops};
//! use std::path::Path;
//!
//! let store = ProjectStore::init(Path::new("."), "website").unwrap();
//! let mut graph = store.load().unwrap();
//!
//! let design = TaskBuilder::new("Design schema").criterion("tables reviewed").build().unwrap();
//! let api = TaskBuilder::new("Build API").build().unwrap();
//! let (design_id, api_id) = (design.id().to_string(), api.id().to_string());
//! graph.add_node(design).unwrap();
//! graph.add_node(api).unwrap();
//!
//! // The API needs the schema first.
//! ops::link(&mut graph, &design_id, &api_id, "API reads the schema").unwrap();
//!
//! let order = algo::topological_sort(&graph);
//! assert_eq!(order.order, [design_id, api_id]);
//!
//! store.save(&mut graph).unwrap();
//! ```

mod builder;
mod cache;
mod config;
mod error;
mod graph;
mod id;
mod index;
mod status;
mod storage;
mod store;
mod task;
mod types;

pub mod algo;
pub mod migrate;
pub mod ops;

// Re-export public API
pub use builder::TaskBuilder;
pub use cache::TopoCache;
pub use config::{CONFIG_FILE, Config, DOCUMENT_FILE, PROJECT_DIR};
pub use error::{Error, PreconditionError, Result, ValidationError};
pub use graph::{GraphSnapshot, GraphStore};
pub use id::MIN_PREFIX_LEN;
pub use index::Indexes;
pub use status::{StatusInputs, derive_status};
pub use storage::{AtomicFileWriter, RetryPolicy, WriteOptions};
pub use store::{ProjectDocument, ProjectStore, load, save};
pub use task::{DESCRIPTION_MAX, ITEM_TEXT_MAX, TITLE_MAX, TaskNode};
pub use types::{ChecklistItem, Deliverable, Edge, FORMAT_VERSION, NeedFix, Priority, ProjectMetadata, Status};
