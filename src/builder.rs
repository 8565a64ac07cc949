//! Builder pattern API for creating tasks.

use crate::error::Result;
use crate::id::generate_id;
use crate::task::TaskNode;
use crate::types::{ChecklistItem, Deliverable, Priority};
use chrono::Utc;

/// Builder for creating tasks with a fluent API.
///
/// # Example
///
/// ```
/// use taskweave::{Priority, TaskBuilder};
///
/// let task = TaskBuilder::new("Implement login")
///     .priority(Priority::Top)
///     .description("Add the new authentication flow")
///     .criterion("Users can sign in")
///     .deliverable("Login form", Some("src/login.rs"))
///     .related_file("src/session.rs")
///     .build()
///     .unwrap();
///
/// assert_eq!(task.criteria().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    title: String,
    description: Option<String>,
    priority: Priority,
    criteria: Vec<String>,
    deliverables: Vec<(String, Option<String>)>,
    related_files: Vec<String>,
    notes: Option<String>,
}

impl TaskBuilder {
    /// Create a new builder with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: Priority::default(),
            criteria: Vec::new(),
            deliverables: Vec::new(),
            related_files: Vec::new(),
            notes: None,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a success criterion.
    pub fn criterion(mut self, text: impl Into<String>) -> Self {
        self.criteria.push(text.into());
        self
    }

    /// Add several success criteria.
    pub fn criteria(mut self, texts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.criteria.extend(texts.into_iter().map(Into::into));
        self
    }

    pub fn deliverable(mut self, text: impl Into<String>, file_path: Option<&str>) -> Self {
        self.deliverables.push((text.into(), file_path.map(String::from)));
        self
    }

    pub fn related_file(mut self, path: impl Into<String>) -> Self {
        self.related_files.push(path.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Validate and build the task.
    pub fn build(self) -> Result<TaskNode> {
        let mut node = TaskNode::blank(generate_id(), self.title, Utc::now());
        node.set_description_raw(self.description);
        node.set_priority_raw(self.priority);
        node.set_notes_raw(self.notes.filter(|n| !n.trim().is_empty()));
        for text in self.criteria {
            node.push_criterion_raw(ChecklistItem::new(text));
        }
        for (text, file_path) in self.deliverables {
            node.push_deliverable_raw(Deliverable::new(text, file_path));
        }
        for path in self.related_files {
            node.push_related_file_raw(path);
        }
        node.validate()?;
        node.refresh_status();
        Ok(node)
    }
}
