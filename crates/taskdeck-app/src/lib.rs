//! Application layer for the taskdeck synchronized task list.
//!
//! This crate wires the domain types from `taskdeck-core` to a document
//! store behind the [`store::TaskStore`] seam: a synchronizer that mirrors
//! the owner's documents into an ordered in-memory list, an editor that
//! stages and submits drafts, and a reorder coordinator that applies new
//! orderings optimistically and commits them as one atomic batch.

pub mod context;
pub mod editor;
pub mod prefs;
pub mod reorder;
pub mod session;
pub mod store;
pub mod sync;

// Re-exports for convenience
pub use context::AppContext;
pub use editor::{EditorError, Submission, TaskEditor};
pub use prefs::Preferences;
pub use reorder::{ReorderCoordinator, ReorderError};
pub use session::{IdentityProvider, Session, SessionError, SessionHub};
pub use store::{DocumentSubscription, TaskStore};
pub use sync::{SyncHandle, SyncPhase, TaskListState, TaskSynchronizer};
