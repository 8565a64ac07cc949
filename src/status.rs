//! Derived task status.
//!
//! A task's status is never stored as an independent fact. It is recomputed
//! from checklist and blocker state after every mutation:
//!
//! 1. approved → `completed` (explicit override, no rule below can leave it)
//! 2. any blocker → `blocked`
//! 3. any unresolved need-fix → `in_progress`
//! 4. criteria ∪ deliverables non-empty and all completed → `in_review`
//! 5. at least one criterion or deliverable completed → `in_progress`
//! 6. otherwise → `ready`

use crate::types::{ChecklistItem, Deliverable, NeedFix, Status};

/// Inputs of the status derivation, borrowed from a task.
#[derive(Debug, Clone, Copy)]
pub struct StatusInputs<'a> {
    pub approved: bool,
    pub criteria: &'a [ChecklistItem],
    pub deliverables: &'a [Deliverable],
    pub need_fixes: &'a [NeedFix],
    pub blockers: &'a [String],
}

/// Compute a task's status from its checklist and blocker state.
pub fn derive_status(inputs: StatusInputs<'_>) -> Status {
    let total = inputs.criteria.len() + inputs.deliverables.len();
    let done = inputs.criteria.iter().filter(|c| c.completed).count()
        + inputs.deliverables.iter().filter(|d| d.completed).count();

    status_from_counts(Counts {
        approved: inputs.approved,
        blocked: !inputs.blockers.is_empty(),
        open_fixes: inputs.need_fixes.iter().any(|fix| !fix.resolved),
        total,
        done,
    })
}

/// The derivation reduced to flags and checklist counts.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counts {
    pub approved: bool,
    pub blocked: bool,
    pub open_fixes: bool,
    pub total: usize,
    pub done: usize,
}

pub(crate) fn status_from_counts(counts: Counts) -> Status {
    if counts.approved {
        Status::Completed
    } else if counts.blocked {
        Status::Blocked
    } else if counts.open_fixes {
        Status::InProgress
    } else if counts.total > 0 && counts.done == counts.total {
        Status::InReview
    } else if counts.done > 0 {
        Status::InProgress
    } else {
        Status::Ready
    }
}
