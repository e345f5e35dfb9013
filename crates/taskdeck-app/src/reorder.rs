//! Optimistic reordering committed as one atomic batched write.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use taskdeck_core::Task;
use taskdeck_core::document::{WriteBatch, order_patch};

use crate::store::TaskStore;
use crate::sync::TaskListState;

/// Errors surfaced by [`ReorderCoordinator`].
#[derive(Debug, thiserror::Error)]
pub enum ReorderError {
    /// The batched order update failed; the published list was rolled back
    /// to the last confirmed order.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}

/// Applies a user-supplied ordering locally before the backend confirms it.
///
/// The renumbered list is published immediately; the matching `order`
/// patches go out as a single all-or-nothing batch. On batch failure the
/// published list reverts to the pre-reorder snapshot, so local state never
/// diverges permanently from the backend.
pub struct ReorderCoordinator<S> {
    store: Arc<S>,
    state: Arc<watch::Sender<TaskListState>>,
}

impl<S> ReorderCoordinator<S>
where
    S: TaskStore,
{
    /// Wire a coordinator to the shared store handle and the published
    /// list.
    pub const fn new(store: Arc<S>, state: Arc<watch::Sender<TaskListState>>) -> Self {
        Self { store, state }
    }

    /// Apply the full, newly ordered list of visible tasks.
    ///
    /// Every task is assigned `order` equal to its 0-based position; the
    /// result is visible locally before the backend round-trip completes.
    ///
    /// # Errors
    /// Returns [`ReorderError::Store`] when the batch commit fails; the
    /// optimistic order has been reverted by then.
    pub async fn reorder(&self, mut tasks: Vec<Task>) -> Result<(), ReorderError> {
        for (position, task) in tasks.iter_mut().enumerate() {
            task.order = i64::try_from(position).unwrap_or(i64::MAX);
        }

        let mut batch = WriteBatch::new();
        for task in &tasks {
            batch.update(task.id, order_patch(task.order));
        }

        let previous = self.state.borrow().tasks.clone();
        let optimistic = tasks.clone();
        self.state.send_modify(|state| state.tasks = tasks);
        debug!(count = batch.len(), "applied optimistic reorder");

        match self.store.commit_batch(batch).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let err = err.into();
                warn!(error = %err, "reorder batch failed; reverting to last confirmed order");
                self.state.send_modify(|state| {
                    // A snapshot may have landed in the meantime; only roll
                    // back if the optimistic order is still what is shown.
                    if state.tasks == optimistic {
                        state.tasks = previous;
                    }
                });
                Err(ReorderError::Store(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;
    use taskdeck_core::document::{DocumentData, DocumentSnapshot, fields};
    use taskdeck_core::id::{TaskId, UserId};
    use taskdeck_core::{DEFAULT_CATEGORY, Priority};

    use crate::store::DocumentSubscription;
    use crate::sync::SyncPhase;

    #[derive(Default)]
    struct MockStore {
        batches: Mutex<Vec<WriteBatch>>,
        fail: bool,
    }

    struct NeverSubscription;

    impl DocumentSubscription for NeverSubscription {
        async fn next_snapshot(&mut self) -> Option<DocumentSnapshot> {
            None
        }
    }

    impl TaskStore for MockStore {
        type Error = anyhow::Error;
        type Subscription = NeverSubscription;

        async fn create_document(&self, _data: DocumentData) -> Result<TaskId, Self::Error> {
            Err(anyhow!("creates are not part of reorder tests"))
        }

        async fn update_document(&self, _id: TaskId, _patch: DocumentData) -> Result<(), Self::Error> {
            Err(anyhow!("updates are not part of reorder tests"))
        }

        async fn delete_document(&self, _id: TaskId) -> Result<(), Self::Error> {
            Err(anyhow!("deletes are not part of reorder tests"))
        }

        async fn commit_batch(&self, batch: WriteBatch) -> Result<(), Self::Error> {
            if self.fail {
                return Err(anyhow!("batch rejected"));
            }
            self.batches.lock().expect("lock batches").push(batch);
            Ok(())
        }

        async fn subscribe(&self, _owner: &UserId) -> Result<Self::Subscription, Self::Error> {
            Ok(NeverSubscription)
        }
    }

    fn task(title: &str, order: i64) -> Task {
        Task {
            id: TaskId::new(),
            title: title.into(),
            description: String::new(),
            completed: false,
            priority: Priority::Medium,
            due_date: None,
            category: DEFAULT_CATEGORY.into(),
            user_id: UserId::new("u1"),
            order,
        }
    }

    fn synchronized(tasks: Vec<Task>) -> Arc<watch::Sender<TaskListState>> {
        let (tx, _) = watch::channel(TaskListState {
            phase: SyncPhase::Synchronized,
            tasks,
        });
        Arc::new(tx)
    }

    #[tokio::test]
    async fn reorder_is_visible_before_the_batch_and_committed_exactly() {
        let a = task("a", 0);
        let b = task("b", 1);
        let c = task("c", 2);
        let state = synchronized(vec![a.clone(), b.clone(), c.clone()]);
        let store = Arc::new(MockStore::default());
        let coordinator = ReorderCoordinator::new(Arc::clone(&store), Arc::clone(&state));

        coordinator
            .reorder(vec![c.clone(), a.clone(), b.clone()])
            .await
            .expect("reorder must succeed");

        let shown = state.borrow().tasks.clone();
        let shown_ids: Vec<(TaskId, i64)> = shown.iter().map(|t| (t.id, t.order)).collect();
        assert_eq!(shown_ids, vec![(c.id, 0), (a.id, 1), (b.id, 2)]);

        let batches = store.batches.lock().expect("lock batches");
        assert_eq!(batches.len(), 1);
        let committed: Vec<(TaskId, i64)> = batches[0]
            .updates()
            .iter()
            .filter_map(|(id, patch)| {
                patch
                    .get(fields::ORDER)
                    .and_then(serde_json::Value::as_i64)
                    .map(|order| (*id, order))
            })
            .collect();
        assert_eq!(committed, vec![(c.id, 0), (a.id, 1), (b.id, 2)]);
    }

    #[tokio::test]
    async fn batch_failure_rolls_back_to_the_last_confirmed_order() {
        let a = task("a", 0);
        let b = task("b", 1);
        let state = synchronized(vec![a.clone(), b.clone()]);
        let store = Arc::new(MockStore {
            batches: Mutex::new(Vec::new()),
            fail: true,
        });
        let coordinator = ReorderCoordinator::new(Arc::clone(&store), Arc::clone(&state));

        let outcome = coordinator.reorder(vec![b.clone(), a.clone()]).await;
        assert!(matches!(outcome, Err(ReorderError::Store(_))));

        let shown = state.borrow().tasks.clone();
        let shown_ids: Vec<TaskId> = shown.iter().map(|t| t.id).collect();
        assert_eq!(shown_ids, vec![a.id, b.id]);
    }
}
