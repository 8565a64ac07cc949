//! One-time conversion of documents written with the older five-state model
//! (`not_started`, `pending`, `in_progress`, `completed`, `blocked`).
//!
//! Legacy `completed` tasks become approved. Every other task gets its
//! status recomputed from its checklists and blockers. The conversion works
//! on raw JSON so that documents the current model cannot deserialize can
//! still be read. Running it twice gives the same result as running it once.

use crate::status::{Counts, status_from_counts};
use crate::types::{FORMAT_VERSION, Status};
use serde_json::{Map, Value};

/// Convert a legacy document. Values that are not documents are returned unchanged.
pub fn migrate_document(document: &Value) -> Value {
    let mut migrated = document.clone();
    let Some(root) = migrated.as_object_mut() else {
        return migrated;
    };

    if let Some(Value::Object(metadata)) = root.get_mut("metadata") {
        metadata.insert("version".into(), Value::from(FORMAT_VERSION));
    }

    let mut changed = 0;
    if let Some(Value::Object(tasks)) = root.get_mut("tasks") {
        for task in tasks.values_mut() {
            if let Value::Object(task) = task
                && migrate_task(task)
            {
                changed += 1;
            }
        }
    }
    log::info!("migrated document: {changed} task statuses changed");
    migrated
}

/// True when the document still uses statuses the current model rejects.
pub fn needs_migration(document: &Value) -> bool {
    document
        .get("tasks")
        .and_then(Value::as_object)
        .is_some_and(|tasks| {
            tasks.values().any(|task| {
                task.get("status")
                    .and_then(Value::as_str)
                    .is_some_and(|s| Status::parse(s).is_none())
            })
        })
}

/// Rewrite one task in place. Returns whether its status changed.
fn migrate_task(task: &mut Map<String, Value>) -> bool {
    let previous = task.get("status").and_then(Value::as_str).map(str::to_owned);
    let approved = flag(task, "approved") || previous.as_deref() == Some(Status::Completed.as_str());

    let status = if approved {
        task.insert("approved".into(), Value::Bool(true));
        if task.get("completed_at").is_none_or(Value::is_null)
            && let Some(updated) = task.get("updated_at").cloned()
        {
            task.insert("completed_at".into(), updated);
        }
        Status::Completed
    } else {
        let (criteria_total, criteria_done) = checklist(task, "success_criteria", "completed");
        let (deliverables_total, deliverables_done) = checklist(task, "deliverables", "completed");
        let open_fixes = items(task, "need_fixes")
            .any(|fix| !(item_flag(fix, "resolved") || item_flag(fix, "completed")));
        status_from_counts(Counts {
            approved: false,
            blocked: items(task, "blockers").next().is_some(),
            open_fixes,
            total: criteria_total + deliverables_total,
            done: criteria_done + deliverables_done,
        })
    };

    task.insert("status".into(), Value::from(status.as_str()));
    previous.as_deref() != Some(status.as_str())
}

fn flag(task: &Map<String, Value>, key: &str) -> bool {
    task.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn item_flag(item: &Value, key: &str) -> bool {
    item.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn items<'a>(task: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Value> + use<'a> {
    task.get(key).and_then(Value::as_array).into_iter().flatten()
}

/// (total, completed) for a checklist array.
fn checklist(task: &Map<String, Value>, key: &str, done_key: &str) -> (usize, usize) {
    items(task, key).fold((0, 0), |(total, done), item| {
        (total + 1, done + usize::from(item_flag(item, done_key)))
    })
}
