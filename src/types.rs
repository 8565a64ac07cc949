//! Core data types for the task graph.

use crate::id::generate_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Document format version written into project metadata.
pub const FORMAT_VERSION: &str = "2.0.0";

/// Lifecycle stage of a task.
///
/// Everything except `Completed` is derived from checklist and blocker state,
/// see [`crate::status::derive_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ready,
    InProgress,
    InReview,
    Completed,
    Blocked,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Ready,
        Status::InProgress,
        Status::InReview,
        Status::Completed,
        Status::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ready => "ready",
            Status::InProgress => "in_progress",
            Status::InReview => "in_review",
            Status::Completed => "completed",
            Status::Blocked => "blocked",
        }
    }

    /// Parse the snake_case name used on disk and on the command line.
    pub fn parse(s: &str) -> Option<Status> {
        Status::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Top,
    #[default]
    Second,
    Later,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Top, Priority::Second, Priority::Later];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Top => "top",
            Priority::Second => "second",
            Priority::Later => "later",
        }
    }

    pub fn parse(s: &str) -> Option<Priority> {
        Priority::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A success criterion: one line of a task's definition of done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ChecklistItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            text: text.into(),
            completed: false,
            completed_at: None,
        }
    }

    pub(crate) fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = completed.then_some(now);
    }

    /// Same text and state, fresh identifier.
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            id: generate_id(),
            ..self.clone()
        }
    }
}

/// A deliverable: a checklist item that may point at a produced file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deliverable {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl Deliverable {
    pub fn new(text: impl Into<String>, file_path: Option<String>) -> Self {
        Self {
            id: generate_id(),
            text: text.into(),
            completed: false,
            completed_at: None,
            file_path,
        }
    }

    pub(crate) fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = completed.then_some(now);
    }

    pub(crate) fn duplicate(&self) -> Self {
        Self {
            id: generate_id(),
            ..self.clone()
        }
    }
}

/// An issue raised during review that must be resolved before re-review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedFix {
    pub id: String,
    pub text: String,
    #[serde(default, alias = "completed")]
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl NeedFix {
    pub fn new(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_id(),
            text: text.into(),
            resolved: false,
            created_at: now,
            resolved_at: None,
        }
    }

    pub(crate) fn duplicate(&self) -> Self {
        Self {
            id: generate_id(),
            ..self.clone()
        }
    }
}

/// A blocking relationship: `from` blocks `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Project-level metadata, refreshed on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub project_name: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProjectMetadata {
    pub fn new(project_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            project_name: project_name.into(),
            version: FORMAT_VERSION.to_string(),
            created_at: now,
            updated_at: now,
            description: None,
        }
    }
}

impl Default for ProjectMetadata {
    fn default() -> Self {
        Self::new("untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names_roundtrip() {
        for status in Status::ALL {
            assert_eq!(Status::parse(status.as_str()), Some(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert_eq!(Status::parse("not_started"), None);
    }

    #[test]
    fn test_priority_default_and_parse() {
        assert_eq!(Priority::default(), Priority::Second);
        assert_eq!(Priority::parse("top"), Some(Priority::Top));
        assert_eq!(Priority::parse("urgent"), None);
        assert!(Priority::Top < Priority::Later);
    }

    #[test]
    fn test_checklist_completion_timestamp() {
        let now = Utc::now();
        let mut item = ChecklistItem::new("Tests pass");
        item.set_completed(true, now);
        assert_eq!(item.completed_at, Some(now));
        item.set_completed(false, now);
        assert!(item.completed_at.is_none());
    }

    #[test]
    fn test_duplicate_gets_fresh_id() {
        let item = Deliverable::new("Report", Some("docs/report.md".into()));
        let copy = item.duplicate();
        assert_ne!(copy.id, item.id);
        assert_eq!(copy.file_path, item.file_path);
    }

    #[test]
    fn test_need_fix_accepts_completed_alias() {
        let json = r#"{"id":"x","text":"fix it","completed":true,"created_at":"2024-01-01T00:00:00Z"}"#;
        let fix: NeedFix = serde_json::from_str(json).unwrap();
        assert!(fix.resolved);
    }
}
