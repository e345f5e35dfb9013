//! Typed codec for task documents.
//!
//! The store keeps schemaless JSON documents; everything read from it goes
//! through [`decode_task`], which validates required fields, fills defaults
//! for absent ones, and rejects malformed documents instead of trusting
//! their shape. Due dates are the one quarantined field: a value that cannot
//! be decoded leaves the task in place with no due date rather than
//! rejecting the whole document.

use serde_json::{Map, Value};
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::warn;

use crate::id::{TaskId, UserId};
use crate::{DEFAULT_CATEGORY, Priority, Task, TaskDraft, sort_by_order};

/// Field map of a stored task document.
pub type DocumentData = Map<String, Value>;

/// Field names used in stored documents.
pub mod fields {
    /// Display title; required, non-blank.
    pub const TITLE: &str = "title";
    /// Free-text description.
    pub const DESCRIPTION: &str = "description";
    /// Completion flag.
    pub const COMPLETED: &str = "completed";
    /// Priority label (`low`, `medium`, `high`).
    pub const PRIORITY: &str = "priority";
    /// Calendar due date or `null`.
    pub const DUE_DATE: &str = "dueDate";
    /// Category label.
    pub const CATEGORY: &str = "category";
    /// Owner identifier; required.
    pub const USER_ID: &str = "userId";
    /// Position in the user-visible sequence.
    pub const ORDER: &str = "order";
}

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Reasons a stored document cannot be decoded into a [`Task`].
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// A required field is absent.
    #[error("document {id} is missing required field '{field}'")]
    MissingField {
        /// Identity of the offending document.
        id: TaskId,
        /// Name of the absent field.
        field: &'static str,
    },
    /// A field is present but has the wrong shape or an invalid value.
    #[error("document {id} has malformed field '{field}': {reason}")]
    MalformedField {
        /// Identity of the offending document.
        id: TaskId,
        /// Name of the malformed field.
        field: &'static str,
        /// Human-readable cause.
        reason: String,
    },
}

/// Decode a stored document into a [`Task`].
///
/// Absent optional fields are filled with their defaults; a malformed value
/// in any field other than the due date rejects the document. An
/// undecodable due date is quarantined to `None` so the task still renders.
///
/// # Errors
/// Returns [`DocumentError`] when a required field is missing or a field
/// holds a value of the wrong shape.
pub fn decode_task(id: TaskId, data: &DocumentData) -> Result<Task, DocumentError> {
    let title = required_string(id, data, fields::TITLE)?;
    let user_id = required_string(id, data, fields::USER_ID)?;

    let description = optional_string(id, data, fields::DESCRIPTION)?.unwrap_or_default();
    let completed = optional_bool(id, data, fields::COMPLETED)?.unwrap_or(false);
    let order = optional_integer(id, data, fields::ORDER)?.unwrap_or(0);

    let priority = match optional_string(id, data, fields::PRIORITY)? {
        None => Priority::default(),
        Some(label) => label.parse().map_err(|err| DocumentError::MalformedField {
            id,
            field: fields::PRIORITY,
            reason: format!("{err}"),
        })?,
    };

    let category = optional_string(id, data, fields::CATEGORY)?
        .filter(|value| !value.trim().is_empty())
        .map_or_else(|| DEFAULT_CATEGORY.to_owned(), str::to_owned);

    let due_date = match data.get(fields::DUE_DATE) {
        None | Some(Value::Null) => None,
        Some(value) => {
            let decoded = due_date_from_value(value);
            if decoded.is_none() {
                warn!(%id, "ignoring undecodable due date on task document");
            }
            decoded
        }
    };

    Ok(Task {
        id,
        title: title.to_owned(),
        description: description.to_owned(),
        completed,
        priority,
        due_date,
        category,
        user_id: UserId::new(user_id),
        order,
    })
}

fn required_string<'a>(
    id: TaskId,
    data: &'a DocumentData,
    field: &'static str,
) -> Result<&'a str, DocumentError> {
    let value = data
        .get(field)
        .ok_or(DocumentError::MissingField { id, field })?;
    let text = value.as_str().ok_or_else(|| DocumentError::MalformedField {
        id,
        field,
        reason: "expected a string".to_owned(),
    })?;
    if text.trim().is_empty() {
        return Err(DocumentError::MalformedField {
            id,
            field,
            reason: "must not be blank".to_owned(),
        });
    }
    Ok(text)
}

fn optional_string<'a>(
    id: TaskId,
    data: &'a DocumentData,
    field: &'static str,
) -> Result<Option<&'a str>, DocumentError> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| DocumentError::MalformedField {
                id,
                field,
                reason: "expected a string".to_owned(),
            }),
    }
}

fn optional_bool(
    id: TaskId,
    data: &DocumentData,
    field: &'static str,
) -> Result<Option<bool>, DocumentError> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| DocumentError::MalformedField {
                id,
                field,
                reason: "expected a boolean".to_owned(),
            }),
    }
}

fn optional_integer(
    id: TaskId,
    data: &DocumentData,
    field: &'static str,
) -> Result<Option<i64>, DocumentError> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| DocumentError::MalformedField {
                id,
                field,
                reason: "expected an integer".to_owned(),
            }),
    }
}

/// Interpret a stored due-date value as a calendar date.
///
/// Accepts ISO `YYYY-MM-DD` strings, RFC 3339 timestamps, timestamp objects
/// carrying Unix `seconds`, and bare Unix-second integers. Anything else
/// yields `None`.
#[must_use]
pub fn due_date_from_value(value: &Value) -> Option<Date> {
    match value {
        Value::String(text) => Date::parse(text, DATE_FORMAT).ok().or_else(|| {
            OffsetDateTime::parse(text, &Rfc3339)
                .ok()
                .map(OffsetDateTime::date)
        }),
        Value::Number(number) => number.as_i64().and_then(date_from_unix_seconds),
        Value::Object(map) => map
            .get("seconds")
            .and_then(Value::as_i64)
            .and_then(date_from_unix_seconds),
        Value::Null | Value::Bool(_) | Value::Array(_) => None,
    }
}

fn date_from_unix_seconds(seconds: i64) -> Option<Date> {
    OffsetDateTime::from_unix_timestamp(seconds)
        .ok()
        .map(OffsetDateTime::date)
}

fn due_date_to_value(due_date: Option<Date>) -> Value {
    due_date
        .and_then(|date| date.format(DATE_FORMAT).ok())
        .map_or(Value::Null, Value::String)
}

/// Encode a draft as a complete document for creation.
///
/// The title is stored trimmed and the category falls back to
/// [`DEFAULT_CATEGORY`]; `order` is the caller-assigned append position.
#[must_use]
pub fn encode_draft(draft: &TaskDraft, owner: &UserId, order: i64) -> DocumentData {
    let mut data = encode_edit(draft);
    data.insert(
        fields::USER_ID.to_owned(),
        Value::String(owner.as_str().to_owned()),
    );
    data.insert(fields::ORDER.to_owned(), Value::Number(order.into()));
    data
}

/// Encode a draft as a partial document for edit-in-place.
///
/// Every draft field is overwritten; `userId` and `order` are never part of
/// the patch, so the edited task keeps its owner and list position.
#[must_use]
pub fn encode_edit(draft: &TaskDraft) -> DocumentData {
    let title = draft.trimmed_title().unwrap_or_default();
    let mut data = DocumentData::new();
    data.insert(fields::TITLE.to_owned(), Value::String(title.to_owned()));
    data.insert(
        fields::DESCRIPTION.to_owned(),
        Value::String(draft.description.clone()),
    );
    data.insert(fields::COMPLETED.to_owned(), Value::Bool(draft.completed));
    data.insert(
        fields::PRIORITY.to_owned(),
        Value::String(draft.priority.as_str().to_owned()),
    );
    data.insert(fields::DUE_DATE.to_owned(), due_date_to_value(draft.due_date));
    data.insert(
        fields::CATEGORY.to_owned(),
        Value::String(draft.category_or_default().to_owned()),
    );
    data
}

/// Single-field patch flipping the completion flag.
#[must_use]
pub fn completed_patch(completed: bool) -> DocumentData {
    let mut data = DocumentData::new();
    data.insert(fields::COMPLETED.to_owned(), Value::Bool(completed));
    data
}

/// Single-field patch assigning a new list position.
#[must_use]
pub fn order_patch(order: i64) -> DocumentData {
    let mut data = DocumentData::new();
    data.insert(fields::ORDER.to_owned(), Value::Number(order.into()));
    data
}

/// Point-in-time set of documents matching a subscription's filter.
#[derive(Debug, Clone, Default)]
pub struct DocumentSnapshot {
    /// Raw documents keyed by their store identity.
    pub documents: Vec<(TaskId, DocumentData)>,
}

impl DocumentSnapshot {
    /// Decode the snapshot into the displayed task list.
    ///
    /// Documents that fail to decode are skipped with a warning; a single
    /// bad document never blanks the list. The result is sorted ascending
    /// by `order`.
    #[must_use]
    pub fn into_tasks(self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .documents
            .iter()
            .filter_map(|(id, data)| match decode_task(*id, data) {
                Ok(task) => Some(task),
                Err(err) => {
                    warn!(id = %id, error = %err, "skipping undecodable task document");
                    None
                }
            })
            .collect();
        sort_by_order(&mut tasks);
        tasks
    }
}

/// Ordered set of partial updates committed as one atomic unit.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    updates: Vec<(TaskId, DocumentData)>,
}

impl WriteBatch {
    /// Create an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self { updates: Vec::new() }
    }

    /// Queue a partial update for the given document.
    pub fn update(&mut self, id: TaskId, patch: DocumentData) {
        self.updates.push((id, patch));
    }

    /// Number of queued updates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Whether the batch holds no updates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Borrow the queued updates in submission order.
    #[must_use]
    pub fn updates(&self) -> &[(TaskId, DocumentData)] {
        &self.updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(entries: &[(&str, Value)]) -> DocumentData {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), value.clone()))
            .collect()
    }

    fn minimal() -> DocumentData {
        document(&[
            ("title", json!("write tests")),
            ("userId", json!("u1")),
        ])
    }

    #[test]
    fn decode_fills_defaults_for_absent_fields() {
        let task = decode_task(TaskId::new(), &minimal())
            .unwrap_or_else(|err| panic!("must decode: {err}"));
        assert_eq!(task.title, "write tests");
        assert_eq!(task.user_id.as_str(), "u1");
        assert_eq!(task.description, "");
        assert!(!task.completed);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.due_date.is_none());
        assert_eq!(task.category, DEFAULT_CATEGORY);
        assert_eq!(task.order, 0);
    }

    #[test]
    fn decode_rejects_missing_or_blank_title() {
        let id = TaskId::new();
        let missing = document(&[("userId", json!("u1"))]);
        assert!(matches!(
            decode_task(id, &missing),
            Err(DocumentError::MissingField { field: "title", .. })
        ));

        let blank = document(&[("title", json!("   ")), ("userId", json!("u1"))]);
        assert!(matches!(
            decode_task(id, &blank),
            Err(DocumentError::MalformedField { field: "title", .. })
        ));
    }

    #[test]
    fn decode_rejects_unknown_priority() {
        let mut data = minimal();
        data.insert("priority".into(), json!("urgent"));
        assert!(matches!(
            decode_task(TaskId::new(), &data),
            Err(DocumentError::MalformedField { field: "priority", .. })
        ));
    }

    #[test]
    fn decode_rejects_non_integer_order() {
        let mut data = minimal();
        data.insert("order".into(), json!("third"));
        assert!(matches!(
            decode_task(TaskId::new(), &data),
            Err(DocumentError::MalformedField { field: "order", .. })
        ));
    }

    #[test]
    fn due_date_accepts_known_shapes() {
        let date = due_date_from_value(&json!("2026-03-14"));
        assert_eq!(
            date,
            Some(time::macros::date!(2026 - 03 - 14)),
        );

        let from_rfc3339 = due_date_from_value(&json!("2026-03-14T09:30:00Z"));
        assert_eq!(from_rfc3339, date);

        // 2026-03-14T00:00:00Z
        let from_object = due_date_from_value(&json!({ "seconds": 1_773_446_400, "nanos": 0 }));
        assert_eq!(from_object, date);

        let from_number = due_date_from_value(&json!(1_773_446_400));
        assert_eq!(from_number, date);
    }

    #[test]
    fn undecodable_due_date_is_quarantined_not_fatal() {
        let mut data = minimal();
        data.insert("dueDate".into(), json!(["not", "a", "date"]));
        let task = decode_task(TaskId::new(), &data)
            .unwrap_or_else(|err| panic!("must decode: {err}"));
        assert!(task.due_date.is_none());
    }

    #[test]
    fn encode_draft_sets_owner_and_order() {
        let draft = TaskDraft {
            title: "  groceries  ".into(),
            description: "milk".into(),
            ..TaskDraft::default()
        };
        let data = encode_draft(&draft, &UserId::new("u9"), 4);
        assert_eq!(data.get("title"), Some(&json!("groceries")));
        assert_eq!(data.get("userId"), Some(&json!("u9")));
        assert_eq!(data.get("order"), Some(&json!(4)));
        assert_eq!(data.get("completed"), Some(&json!(false)));
        assert_eq!(data.get("dueDate"), Some(&Value::Null));
    }

    #[test]
    fn encode_edit_never_touches_owner_or_order() {
        let draft = TaskDraft {
            title: "groceries".into(),
            ..TaskDraft::default()
        };
        let data = encode_edit(&draft);
        assert!(!data.contains_key("userId"));
        assert!(!data.contains_key("order"));
    }

    #[test]
    fn snapshot_skips_bad_documents_and_sorts() {
        let good_late = TaskId::new();
        let bad = TaskId::new();
        let good_early = TaskId::new();

        let mut late = minimal();
        late.insert("order".into(), json!(5));
        let mut early = minimal();
        early.insert("order".into(), json!(1));
        early.insert("title".into(), json!("first"));

        let snapshot = DocumentSnapshot {
            documents: vec![
                (good_late, late),
                (bad, document(&[("userId", json!("u1"))])),
                (good_early, early),
            ],
        };

        let tasks = snapshot.into_tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, good_early);
        assert_eq!(tasks[1].id, good_late);
    }
}
