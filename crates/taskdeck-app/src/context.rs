//! Explicit dependency wiring for the application layer.

use std::sync::Arc;

use tokio::sync::watch;

use crate::editor::TaskEditor;
use crate::reorder::ReorderCoordinator;
use crate::session::SessionHub;
use crate::store::TaskStore;
use crate::sync::{TaskListState, TaskSynchronizer};

/// Everything the components need, constructed once at process start.
///
/// The store handle, the session hub, and the published task list are all
/// injected from here instead of living in module-level singletons; each
/// component gets exactly the dependencies it uses.
pub struct AppContext<S> {
    store: Arc<S>,
    sessions: SessionHub,
    state: Arc<watch::Sender<TaskListState>>,
}

impl<S> AppContext<S>
where
    S: TaskStore,
{
    /// Bundle a store with a fresh session hub and an empty task list.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        let (state, _) = watch::channel(TaskListState::default());
        Self {
            store,
            sessions: SessionHub::new(),
            state: Arc::new(state),
        }
    }

    /// Shared store handle.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Session boundary.
    #[must_use]
    pub const fn sessions(&self) -> &SessionHub {
        &self.sessions
    }

    /// Observe the published task list.
    #[must_use]
    pub fn task_list(&self) -> watch::Receiver<TaskListState> {
        self.state.subscribe()
    }

    /// Build the synchronizer wired to this context.
    #[must_use]
    pub fn synchronizer(&self) -> TaskSynchronizer<S> {
        TaskSynchronizer::new(
            Arc::clone(&self.store),
            self.sessions.subscribe(),
            Arc::clone(&self.state),
        )
    }

    /// Build an editor wired to this context.
    #[must_use]
    pub fn editor(&self) -> TaskEditor<S> {
        TaskEditor::new(Arc::clone(&self.store))
    }

    /// Build a reorder coordinator wired to this context.
    #[must_use]
    pub fn reorder(&self) -> ReorderCoordinator<S> {
        ReorderCoordinator::new(Arc::clone(&self.store), Arc::clone(&self.state))
    }
}
