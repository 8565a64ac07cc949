//! The task node: one unit of work in the graph.

use crate::error::{Error, Result, ValidationError};
use crate::id::generate_id;
use crate::status::{StatusInputs, derive_status};
use crate::types::{ChecklistItem, Deliverable, NeedFix, Priority, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum title length in characters.
pub const TITLE_MAX: usize = 200;

/// Maximum description length in characters.
pub const DESCRIPTION_MAX: usize = 5000;

/// Maximum checklist / need-fix text length in characters.
pub const ITEM_TEXT_MAX: usize = 500;

/// A unit of work.
///
/// Fields are private so that `status` can only change through the
/// mutators below, each of which re-derives it. Blockers are only changed
/// by [`crate::GraphStore`] so they always mirror the graph's incoming edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    id: String,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    status: Status,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    approved: bool,
    #[serde(default)]
    priority: Priority,
    #[serde(default, rename = "success_criteria")]
    criteria: Vec<ChecklistItem>,
    #[serde(default)]
    deliverables: Vec<Deliverable>,
    #[serde(default)]
    need_fixes: Vec<NeedFix>,
    #[serde(default)]
    blockers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dependency_rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    #[serde(default)]
    related_files: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

impl TaskNode {
    /// Create a task with a fresh id. Use [`crate::TaskBuilder`] for anything richer.
    pub fn new(title: impl Into<String>) -> Result<Self> {
        let node = Self::blank(generate_id(), title.into(), Utc::now());
        node.validate()?;
        Ok(node)
    }

    pub(crate) fn blank(id: String, title: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title,
            description: None,
            status: Status::Ready,
            approved: false,
            priority: Priority::default(),
            criteria: Vec::new(),
            deliverables: Vec::new(),
            need_fixes: Vec::new(),
            blockers: Vec::new(),
            dependency_rationale: None,
            notes: None,
            related_files: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Validate the task's fields.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if !crate::id::is_valid_id(&self.id) {
            return Err(ValidationError::InvalidId(self.id.clone()));
        }
        validate_title(&self.title)?;
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        for text in self
            .criteria
            .iter()
            .map(|c| &c.text)
            .chain(self.deliverables.iter().map(|d| &d.text))
            .chain(self.need_fixes.iter().map(|f| &f.text))
        {
            validate_item_text(text)?;
        }
        if self.updated_at < self.created_at {
            return Err(ValidationError::InvalidTimestamp);
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_approved(&self) -> bool {
        self.approved
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn criteria(&self) -> &[ChecklistItem] {
        &self.criteria
    }

    pub fn deliverables(&self) -> &[Deliverable] {
        &self.deliverables
    }

    pub fn need_fixes(&self) -> &[NeedFix] {
        &self.need_fixes
    }

    pub fn blockers(&self) -> &[String] {
        &self.blockers
    }

    pub fn dependency_rationale(&self) -> Option<&str> {
        self.dependency_rationale.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn related_files(&self) -> &[String] {
        &self.related_files
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Text fed to the search index.
    pub fn search_text(&self) -> String {
        [Some(self.title.as_str()), self.description(), self.notes()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Related files plus deliverable file paths.
    pub fn file_refs(&self) -> impl Iterator<Item = &str> {
        self.related_files
            .iter()
            .map(String::as_str)
            .chain(self.deliverables.iter().filter_map(|d| d.file_path.as_deref()))
    }

    // ---------------------------------------------------------------------
    // Plain field setters
    // ---------------------------------------------------------------------

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<()> {
        let title = title.into();
        validate_title(&title)?;
        self.title = title;
        self.touch();
        Ok(())
    }

    pub fn set_description(&mut self, description: Option<String>) -> Result<()> {
        if let Some(description) = &description {
            validate_description(description)?;
        }
        self.description = description;
        self.touch();
        Ok(())
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
        self.touch();
    }

    /// Replace the dependency rationale stored on this (blocked) task.
    pub fn set_dependency_rationale(&mut self, rationale: Option<String>) {
        self.dependency_rationale = rationale.filter(|r| !r.trim().is_empty());
        self.touch();
    }

    /// Append a paragraph to the notes.
    pub fn append_note(&mut self, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            return;
        }
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.is_empty() => format!("{existing}\n\n{note}"),
            _ => note.to_string(),
        });
        self.touch();
    }

    /// Add a related file path. Returns false if it was already listed.
    pub fn add_related_file(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.related_files.contains(&path) {
            return false;
        }
        self.related_files.push(path);
        self.touch();
        true
    }

    // ---------------------------------------------------------------------
    // Checklist mutators
    // ---------------------------------------------------------------------

    /// Add a success criterion, returning its id.
    pub fn add_criterion(&mut self, text: impl Into<String>) -> Result<String> {
        let text = text.into();
        validate_item_text(&text)?;
        let item = ChecklistItem::new(text);
        let id = item.id.clone();
        self.criteria.push(item);
        self.touch();
        Ok(id)
    }

    pub fn set_criterion_completed(&mut self, item_id: &str, completed: bool) -> Result<()> {
        let now = Utc::now();
        let item = self
            .criteria
            .iter_mut()
            .find(|c| c.id == item_id)
            .ok_or_else(|| ValidationError::UnknownItem(item_id.to_string()))?;
        item.set_completed(completed, now);
        self.touch_at(now);
        Ok(())
    }

    /// Add a deliverable, returning its id.
    pub fn add_deliverable(&mut self, text: impl Into<String>, file_path: Option<String>) -> Result<String> {
        let text = text.into();
        validate_item_text(&text)?;
        let item = Deliverable::new(text, file_path);
        let id = item.id.clone();
        self.deliverables.push(item);
        self.touch();
        Ok(id)
    }

    pub fn set_deliverable_completed(&mut self, item_id: &str, completed: bool) -> Result<()> {
        let now = Utc::now();
        let item = self
            .deliverables
            .iter_mut()
            .find(|d| d.id == item_id)
            .ok_or_else(|| ValidationError::UnknownItem(item_id.to_string()))?;
        item.set_completed(completed, now);
        self.touch_at(now);
        Ok(())
    }

    /// Raise a review issue, returning its id.
    pub fn add_need_fix(&mut self, text: impl Into<String>) -> Result<String> {
        let text = text.into();
        validate_item_text(&text)?;
        let now = Utc::now();
        let fix = NeedFix::new(text, now);
        let id = fix.id.clone();
        self.need_fixes.push(fix);
        self.touch_at(now);
        Ok(id)
    }

    pub fn resolve_need_fix(&mut self, fix_id: &str) -> Result<()> {
        let now = Utc::now();
        let fix = self
            .need_fixes
            .iter_mut()
            .find(|f| f.id == fix_id)
            .ok_or_else(|| ValidationError::UnknownItem(fix_id.to_string()))?;
        fix.resolved = true;
        fix.resolved_at = Some(now);
        self.touch_at(now);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Approval
    // ---------------------------------------------------------------------

    /// Mark the task completed. Only an `in_review` task can be approved.
    pub fn approve(&mut self) -> Result<()> {
        if self.approved {
            return Ok(());
        }
        if self.status != Status::InReview {
            return Err(Error::Validation(ValidationError::NotReadyForApproval {
                id: self.id.clone(),
                status: self.status.to_string(),
            }));
        }
        let now = Utc::now();
        self.approved = true;
        self.completed_at = Some(now);
        self.touch_at(now);
        Ok(())
    }

    /// Undo an approval; status falls back to the derived value.
    pub fn revoke_approval(&mut self) {
        if !self.approved {
            return;
        }
        self.approved = false;
        self.completed_at = None;
        self.touch();
    }

    // ---------------------------------------------------------------------
    // Crate-private: blockers and merging
    // ---------------------------------------------------------------------

    pub(crate) fn add_blocker(&mut self, blocker_id: &str) -> bool {
        if self.blockers.iter().any(|b| b == blocker_id) {
            return false;
        }
        self.blockers.push(blocker_id.to_string());
        self.touch();
        true
    }

    /// Blocker bookkeeping while loading: `updated_at` is left alone.
    pub(crate) fn restore_blocker(&mut self, blocker_id: &str) {
        if !self.blockers.iter().any(|b| b == blocker_id) {
            self.blockers.push(blocker_id.to_string());
        }
    }

    pub(crate) fn forget_blocker(&mut self, blocker_id: &str) {
        self.blockers.retain(|b| b != blocker_id);
    }

    pub(crate) fn remove_blocker(&mut self, blocker_id: &str) -> bool {
        let before = self.blockers.len();
        self.blockers.retain(|b| b != blocker_id);
        if self.blockers.len() == before {
            return false;
        }
        self.touch();
        true
    }

    /// Take over another task's checklists, files and notes.
    ///
    /// Copied items get fresh ids. Blockers are not touched here; the graph
    /// rewires edges separately.
    pub(crate) fn absorb(&mut self, other: &TaskNode) {
        self.criteria.extend(other.criteria.iter().map(ChecklistItem::duplicate));
        self.deliverables
            .extend(other.deliverables.iter().map(Deliverable::duplicate));
        self.need_fixes.extend(other.need_fixes.iter().map(NeedFix::duplicate));

        for path in &other.related_files {
            if !self.related_files.contains(path) {
                self.related_files.push(path.clone());
            }
        }

        self.notes = match (self.notes.take(), other.notes.as_deref()) {
            (Some(mine), Some(theirs)) => Some(format!("{mine}\n\n{theirs}")),
            (mine, theirs) => mine.or_else(|| theirs.map(String::from)),
        };
        self.dependency_rationale = match (self.dependency_rationale.take(), other.dependency_rationale.as_deref()) {
            (Some(mine), Some(theirs)) if mine != theirs => Some(format!("{mine}\n{theirs}")),
            (mine, theirs) => mine.or_else(|| theirs.map(String::from)),
        };
        self.touch();
    }

    /// Recompute `status` from the current field values.
    pub(crate) fn refresh_status(&mut self) {
        self.status = derive_status(StatusInputs {
            approved: self.approved,
            criteria: &self.criteria,
            deliverables: &self.deliverables,
            need_fixes: &self.need_fixes,
            blockers: &self.blockers,
        });
    }

    fn touch(&mut self) {
        self.touch_at(Utc::now());
    }

    fn touch_at(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
        self.refresh_status();
    }

    pub(crate) fn set_description_raw(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub(crate) fn set_priority_raw(&mut self, priority: Priority) {
        self.priority = priority;
    }

    pub(crate) fn set_notes_raw(&mut self, notes: Option<String>) {
        self.notes = notes;
    }

    pub(crate) fn push_criterion_raw(&mut self, item: ChecklistItem) {
        self.criteria.push(item);
    }

    pub(crate) fn push_deliverable_raw(&mut self, item: Deliverable) {
        self.deliverables.push(item);
    }

    pub(crate) fn push_related_file_raw(&mut self, path: String) {
        if !self.related_files.contains(&path) {
            self.related_files.push(path);
        }
    }
}

fn validate_title(title: &str) -> std::result::Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if title.chars().count() > TITLE_MAX {
        return Err(ValidationError::TitleTooLong { max: TITLE_MAX });
    }
    if title.chars().any(char::is_control) {
        return Err(ValidationError::InvalidCharacters);
    }
    Ok(())
}

fn validate_description(description: &str) -> std::result::Result<(), ValidationError> {
    if description.chars().count() > DESCRIPTION_MAX {
        return Err(ValidationError::DescriptionTooLong { max: DESCRIPTION_MAX });
    }
    Ok(())
}

fn validate_item_text(text: &str) -> std::result::Result<(), ValidationError> {
    if text.trim().is_empty() || text.chars().count() > ITEM_TEXT_MAX {
        return Err(ValidationError::InvalidItemText { max: ITEM_TEXT_MAX });
    }
    Ok(())
}
