//! Live synchronization of the task list from the store subscription.

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use taskdeck_core::Task;

use crate::session::Session;
use crate::store::{DocumentSubscription, TaskStore};

/// Where the synchronized list currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// No session; the list is empty.
    #[default]
    Unauthenticated,
    /// Session present, first snapshot not yet delivered.
    Loading,
    /// The list mirrors the most recent store snapshot.
    Synchronized,
    /// The subscription failed; the list may be stale until the next
    /// sign-in re-subscribes.
    Error,
}

/// Published view of the synchronized task list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskListState {
    /// Current synchronization phase.
    pub phase: SyncPhase,
    /// Tasks in display order (ascending by `order`).
    pub tasks: Vec<Task>,
}

/// Maintains the published task list from session changes and store
/// snapshots.
///
/// Drive it with [`run`](Self::run); dropping the future (or the
/// [`SyncHandle`] owning it) tears the store subscription down on every
/// exit path.
pub struct TaskSynchronizer<S> {
    store: Arc<S>,
    sessions: watch::Receiver<Option<Session>>,
    state: Arc<watch::Sender<TaskListState>>,
}

impl<S> TaskSynchronizer<S>
where
    S: TaskStore,
{
    /// Wire a synchronizer to a store, a session feed, and the published
    /// list.
    pub const fn new(
        store: Arc<S>,
        sessions: watch::Receiver<Option<Session>>,
        state: Arc<watch::Sender<TaskListState>>,
    ) -> Self {
        Self {
            store,
            sessions,
            state,
        }
    }

    /// Run until the session feed closes.
    ///
    /// While signed out this publishes `Unauthenticated` with an empty
    /// list; while signed in it holds one store subscription open and
    /// republishes the decoded, ordered list on every snapshot.
    pub async fn run(mut self) {
        loop {
            let current = self.sessions.borrow_and_update().clone();
            match current {
                None => {
                    self.publish(SyncPhase::Unauthenticated, Vec::new());
                    if self.sessions.changed().await.is_err() {
                        return;
                    }
                }
                Some(session) => {
                    if self.synchronize(&session).await.is_break() {
                        return;
                    }
                }
            }
        }
    }

    /// Synchronize one session; returns `Break` when the session feed
    /// closed and the synchronizer should stop.
    async fn synchronize(&mut self, session: &Session) -> ControlFlow<()> {
        self.publish(SyncPhase::Loading, Vec::new());

        let mut subscription = match self.store.subscribe(&session.user_id).await {
            Ok(subscription) => subscription,
            Err(err) => {
                let err = err.into();
                warn!(user = %session.user_id, error = %err, "failed to open task subscription");
                self.publish(SyncPhase::Error, Vec::new());
                return self.wait_for_session_change().await;
            }
        };
        info!(user = %session.user_id, "task subscription established");

        loop {
            tokio::select! {
                changed = self.sessions.changed() => {
                    match changed {
                        Ok(()) => {
                            let unchanged = self
                                .sessions
                                .borrow_and_update()
                                .as_ref()
                                .is_some_and(|next| next.user_id == session.user_id);
                            if !unchanged {
                                // Subscription drops here; the outer loop
                                // re-dispatches for the new session state.
                                return ControlFlow::Continue(());
                            }
                        }
                        Err(_) => return ControlFlow::Break(()),
                    }
                }
                snapshot = subscription.next_snapshot() => {
                    match snapshot {
                        Some(snapshot) => {
                            let tasks = snapshot.into_tasks();
                            self.publish(SyncPhase::Synchronized, tasks);
                        }
                        None => {
                            warn!(user = %session.user_id, "task subscription ended unexpectedly");
                            // Keep the last good list; stale beats blank.
                            self.state.send_modify(|state| state.phase = SyncPhase::Error);
                            return self.wait_for_session_change().await;
                        }
                    }
                }
            }
        }
    }

    async fn wait_for_session_change(&mut self) -> ControlFlow<()> {
        if self.sessions.changed().await.is_err() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn publish(&self, phase: SyncPhase, tasks: Vec<Task>) {
        self.state.send_modify(|state| {
            state.phase = phase;
            state.tasks = tasks;
        });
    }
}

/// Owner of the spawned synchronizer task.
///
/// Aborting on drop guarantees the subscription is released when the view
/// unmounts, whatever the exit path.
#[must_use = "dropping the handle tears the synchronizer down"]
pub struct SyncHandle {
    join: JoinHandle<()>,
}

impl SyncHandle {
    /// Wrap a spawned synchronizer task.
    pub const fn new(join: JoinHandle<()>) -> Self {
        Self { join }
    }

    /// Tear the synchronizer down now instead of at drop.
    pub fn shutdown(self) {
        self.join.abort();
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.join.abort();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use anyhow::anyhow;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use taskdeck_core::document::{DocumentData, DocumentSnapshot, WriteBatch, fields};
    use taskdeck_core::id::{TaskId, UserId};

    /// Store whose subscription plays back a fixed list of snapshots, then
    /// ends.
    struct ScriptedStore {
        snapshots: Mutex<VecDeque<DocumentSnapshot>>,
        fail_subscribe: bool,
    }

    struct ScriptedSubscription {
        remaining: VecDeque<DocumentSnapshot>,
    }

    impl DocumentSubscription for ScriptedSubscription {
        async fn next_snapshot(&mut self) -> Option<DocumentSnapshot> {
            self.remaining.pop_front()
        }
    }

    impl TaskStore for ScriptedStore {
        type Error = anyhow::Error;
        type Subscription = ScriptedSubscription;

        async fn create_document(&self, _data: DocumentData) -> Result<TaskId, Self::Error> {
            Err(anyhow!("writes are not part of synchronizer tests"))
        }

        async fn update_document(&self, _id: TaskId, _patch: DocumentData) -> Result<(), Self::Error> {
            Err(anyhow!("writes are not part of synchronizer tests"))
        }

        async fn delete_document(&self, _id: TaskId) -> Result<(), Self::Error> {
            Err(anyhow!("writes are not part of synchronizer tests"))
        }

        async fn commit_batch(&self, _batch: WriteBatch) -> Result<(), Self::Error> {
            Err(anyhow!("writes are not part of synchronizer tests"))
        }

        async fn subscribe(&self, _owner: &UserId) -> Result<Self::Subscription, Self::Error> {
            if self.fail_subscribe {
                return Err(anyhow!("subscription rejected"));
            }
            let remaining = std::mem::take(&mut *self.snapshots.lock().expect("lock snapshots"));
            Ok(ScriptedSubscription { remaining })
        }
    }

    fn seed_document(title: &str) -> (TaskId, DocumentData) {
        let mut data = DocumentData::new();
        data.insert(fields::TITLE.to_owned(), json!(title));
        data.insert(fields::USER_ID.to_owned(), json!("u1"));
        (TaskId::new(), data)
    }

    fn spawn_synchronizer(
        store: ScriptedStore,
    ) -> (
        watch::Sender<Option<Session>>,
        watch::Receiver<TaskListState>,
        SyncHandle,
    ) {
        let (sessions_tx, sessions_rx) = watch::channel(None);
        let (state_tx, state_rx) = watch::channel(TaskListState::default());
        let synchronizer =
            TaskSynchronizer::new(Arc::new(store), sessions_rx, Arc::new(state_tx));
        let handle = SyncHandle::new(tokio::spawn(synchronizer.run()));
        (sessions_tx, state_rx, handle)
    }

    async fn wait_for_phase(
        rx: &mut watch::Receiver<TaskListState>,
        phase: SyncPhase,
    ) -> TaskListState {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let state = rx.borrow_and_update();
                    if state.phase == phase {
                        return state.clone();
                    }
                }
                rx.changed().await.expect("state channel closed");
            }
        })
        .await
        .expect("timed out waiting for phase")
    }

    /// One snapshot, then a dead feed: the list must go stale, not blank.
    #[tokio::test(flavor = "multi_thread")]
    async fn a_terminated_subscription_keeps_the_last_good_list() {
        let store = ScriptedStore {
            snapshots: Mutex::new(VecDeque::from([DocumentSnapshot {
                documents: vec![seed_document("survivor")],
            }])),
            fail_subscribe: false,
        };
        let (sessions, mut state, _handle) = spawn_synchronizer(store);

        sessions.send_replace(Some(Session::new(UserId::new("u1"))));
        let errored = wait_for_phase(&mut state, SyncPhase::Error).await;
        assert_eq!(errored.tasks.len(), 1);
        assert_eq!(errored.tasks[0].title, "survivor");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn a_rejected_subscription_publishes_the_error_phase() {
        let store = ScriptedStore {
            snapshots: Mutex::new(VecDeque::new()),
            fail_subscribe: true,
        };
        let (sessions, mut state, _handle) = spawn_synchronizer(store);

        sessions.send_replace(Some(Session::new(UserId::new("u1"))));
        let errored = wait_for_phase(&mut state, SyncPhase::Error).await;
        assert!(errored.tasks.is_empty());

        // Signing out recovers to the unauthenticated phase.
        sessions.send_replace(None);
        let signed_out = wait_for_phase(&mut state, SyncPhase::Unauthenticated).await;
        assert!(signed_out.tasks.is_empty());
    }
}
