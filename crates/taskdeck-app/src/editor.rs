//! Draft staging and idempotent create-or-update submission.

use std::sync::Arc;

use tracing::{info, warn};

use taskdeck_core::document;
use taskdeck_core::id::TaskId;
use taskdeck_core::{Task, TaskDraft};

use crate::session::Session;
use crate::store::TaskStore;

/// Errors surfaced by [`TaskEditor`].
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// Backing store returned an error; the draft is preserved for retry.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}

/// Outcome of a submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A new task was created with the given identity.
    Created(TaskId),
    /// The edited task was updated in place.
    Updated(TaskId),
    /// Blank title; no request was issued and the form is untouched.
    Skipped,
}

/// Validates and stages a draft task, then issues a single create-or-update
/// request idempotent per task identity.
///
/// The editor owns the "add/edit in progress" form state: on success the
/// draft resets to its defaults and the form closes; on a backend failure
/// everything is preserved so the user can retry.
pub struct TaskEditor<S> {
    store: Arc<S>,
    draft: TaskDraft,
    editing: Option<TaskId>,
    open: bool,
}

impl<S> TaskEditor<S> {
    /// Wire an editor to the shared store handle.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            draft: TaskDraft::default(),
            editing: None,
            open: false,
        }
    }

    /// Open the form with an empty draft for a new task.
    pub fn begin_add(&mut self) {
        self.draft = TaskDraft::default();
        self.editing = None;
        self.open = true;
    }

    /// Open the form seeded from an existing task for edit-in-place.
    pub fn begin_edit(&mut self, task: &Task) {
        self.draft = TaskDraft::from_task(task);
        self.editing = Some(task.id);
        self.open = true;
    }

    /// Discard the draft and close the form.
    pub fn cancel(&mut self) {
        self.reset();
    }

    /// Whether an add or edit is in progress.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Identity of the task being edited, when the form targets one.
    #[must_use]
    pub const fn editing(&self) -> Option<TaskId> {
        self.editing
    }

    /// Borrow the staged draft.
    #[must_use]
    pub const fn draft(&self) -> &TaskDraft {
        &self.draft
    }

    /// Mutable access to the staged draft.
    pub const fn draft_mut(&mut self) -> &mut TaskDraft {
        &mut self.draft
    }

    fn reset(&mut self) {
        self.draft = TaskDraft::default();
        self.editing = None;
        self.open = false;
    }
}

impl<S> TaskEditor<S>
where
    S: TaskStore,
{
    fn store_error(err: S::Error) -> EditorError {
        EditorError::Store(err.into())
    }

    /// Submit the staged draft.
    ///
    /// A blank title is a no-op ([`Submission::Skipped`]); nothing reaches
    /// the store and the form is untouched. A new task is created with the
    /// session's identity and `order` equal to `visible_len` (append to
    /// end); an edit updates the targeted task in place, preserving its
    /// owner and order.
    ///
    /// # Errors
    /// Returns [`EditorError::Store`] when the backend rejects the request;
    /// the draft and edit target are preserved for retry.
    pub async fn submit(
        &mut self,
        session: &Session,
        visible_len: usize,
    ) -> Result<Submission, EditorError> {
        if self.draft.trimmed_title().is_none() {
            return Ok(Submission::Skipped);
        }

        let outcome = match self.editing {
            None => {
                let order = i64::try_from(visible_len).unwrap_or(i64::MAX);
                let data = document::encode_draft(&self.draft, &session.user_id, order);
                let id = self.store.create_document(data).await.map_err(|err| {
                    let err = Self::store_error(err);
                    warn!(error = %err, "task create failed; draft kept for retry");
                    err
                })?;
                info!(%id, "created task");
                Submission::Created(id)
            }
            Some(id) => {
                let patch = document::encode_edit(&self.draft);
                self.store.update_document(id, patch).await.map_err(|err| {
                    let err = Self::store_error(err);
                    warn!(%id, error = %err, "task update failed; draft kept for retry");
                    err
                })?;
                info!(%id, "updated task");
                Submission::Updated(id)
            }
        };

        self.reset();
        Ok(outcome)
    }

    /// Flip exactly the completion flag of the given task.
    ///
    /// Independent of the form: a single-field patch that leaves every
    /// other field untouched.
    ///
    /// # Errors
    /// Returns [`EditorError::Store`] when the backend rejects the patch.
    pub async fn toggle_completed(&self, task: &Task) -> Result<(), EditorError> {
        let patch = document::completed_patch(!task.completed);
        self.store
            .update_document(task.id, patch)
            .await
            .map_err(|err| {
                let err = Self::store_error(err);
                warn!(id = %task.id, error = %err, "completion toggle failed");
                err
            })
    }

    /// Request deletion of a task; it leaves the list with the next
    /// snapshot.
    ///
    /// # Errors
    /// Returns [`EditorError::Store`] when the backend rejects the delete
    /// (including unknown ids); the local list is untouched either way.
    pub async fn delete(&self, id: TaskId) -> Result<(), EditorError> {
        self.store.delete_document(id).await.map_err(|err| {
            let err = Self::store_error(err);
            warn!(%id, error = %err, "delete failed");
            err
        })
    }
}
