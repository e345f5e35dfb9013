//! Domain types and the document codec for the taskdeck synchronized list.

/// Explicit schema for documents crossing the store boundary.
pub mod document;
/// Local text search over the synchronized list.
pub mod filter;
/// Identifier types.
pub mod id;

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use time::Date;

use crate::id::{TaskId, UserId};

/// Category applied when a task was stored without one.
pub const DEFAULT_CATEGORY: &str = "default";

/// Urgency bucket of a task. Wire form is the lowercase name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Can wait.
    Low,
    /// Normal urgency.
    #[default]
    Medium,
    /// Needs attention first.
    High,
}

impl Priority {
    /// String representation used in stored documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored priority label is not recognized.
#[derive(Debug, thiserror::Error)]
#[error("unknown priority '{0}'")]
pub struct UnknownPriority(String);

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(UnknownPriority(other.to_owned())),
        }
    }
}

/// A task as displayed in the synchronized list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Store-assigned identity; immutable after creation.
    pub id: TaskId,
    /// Non-empty display title.
    pub title: String,
    /// Free text, may be empty.
    pub description: String,
    /// Completion flag.
    pub completed: bool,
    /// Urgency bucket.
    pub priority: Priority,
    /// Optional calendar due date; `None` means no due date.
    pub due_date: Option<Date>,
    /// Free-form label, [`DEFAULT_CATEGORY`] when unset.
    pub category: String,
    /// Owning session; set once at creation, never edited.
    pub user_id: UserId,
    /// Position in the user-visible sequence. Not necessarily unique or
    /// contiguous; the displayed list is the ascending sort.
    pub order: i64,
}

/// Sort tasks ascending by their `order` field.
///
/// The sort is stable, so tasks holding equal orders keep their snapshot
/// order until the next reorder or refresh.
pub fn sort_by_order(tasks: &mut [Task]) {
    tasks.sort_by_key(|task| task.order);
}

/// Editable fields of a task being created or edited.
///
/// Identity, ownership, and list position are assigned at submission time
/// and never staged in the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    /// Title as typed; must be non-blank after trimming to submit.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Completion flag; new drafts start incomplete.
    pub completed: bool,
    /// Urgency bucket.
    pub priority: Priority,
    /// Optional calendar due date.
    pub due_date: Option<Date>,
    /// Category label; blank falls back to [`DEFAULT_CATEGORY`].
    pub category: String,
}

impl Default for TaskDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            completed: false,
            priority: Priority::default(),
            due_date: None,
            category: DEFAULT_CATEGORY.to_owned(),
        }
    }
}

impl TaskDraft {
    /// Seed a draft from an existing task for edit-in-place.
    #[must_use]
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            completed: task.completed,
            priority: task.priority,
            due_date: task.due_date,
            category: task.category.clone(),
        }
    }

    /// Title with surrounding whitespace removed, or `None` when blank.
    #[must_use]
    pub fn trimmed_title(&self) -> Option<&str> {
        let trimmed = self.title.trim();
        if trimmed.is_empty() { None } else { Some(trimmed) }
    }

    /// Category label, falling back to [`DEFAULT_CATEGORY`] when blank.
    #[must_use]
    pub fn category_or_default(&self) -> &str {
        let trimmed = self.category.trim();
        if trimmed.is_empty() { DEFAULT_CATEGORY } else { trimmed }
    }
}
