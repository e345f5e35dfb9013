//! Storage boundary for task documents.
//!
//! The synchronizer, editor, and reorder coordinator only ever talk to this
//! seam; the real backend and the in-memory reference store both live
//! behind it.

use anyhow::Error;
use std::sync::Arc;

use taskdeck_core::document::{DocumentData, DocumentSnapshot, WriteBatch};
use taskdeck_core::id::{TaskId, UserId};
use taskdeck_store_mem::{MemoryStore, MemoryStoreError, MemorySubscription};

/// Minimal storage abstraction required by the application layer.
///
/// All operations are asynchronous requests that suspend the calling flow
/// until the backend responds. `commit_batch` is the only cross-document
/// atomic primitive.
#[allow(async_fn_in_trait)]
pub trait TaskStore: Send + Sync {
    /// Error type bubbled up from the backing store.
    type Error: Into<Error> + Send;
    /// Handle to a standing owner-filtered subscription.
    type Subscription: DocumentSubscription;

    /// Insert a new document and return its store-assigned identity.
    ///
    /// # Errors
    /// Returns a store-specific error when persisting the document fails.
    async fn create_document(&self, data: DocumentData) -> Result<TaskId, Self::Error>;

    /// Merge a partial document into the addressed one.
    ///
    /// # Errors
    /// Returns a store-specific error when the document is unknown or the
    /// write fails.
    async fn update_document(&self, id: TaskId, patch: DocumentData) -> Result<(), Self::Error>;

    /// Remove the addressed document.
    ///
    /// # Errors
    /// Returns a store-specific error when the document is unknown or the
    /// delete fails.
    async fn delete_document(&self, id: TaskId) -> Result<(), Self::Error>;

    /// Apply a batch of partial updates as one atomic unit.
    ///
    /// # Errors
    /// Returns a store-specific error when the batch cannot be committed;
    /// on failure nothing in the batch is applied.
    async fn commit_batch(&self, batch: WriteBatch) -> Result<(), Self::Error>;

    /// Open a standing subscription for the owner's documents.
    ///
    /// The subscription yields the full current matching set immediately
    /// and again after every backend change.
    ///
    /// # Errors
    /// Returns a store-specific error when the subscription cannot be
    /// established.
    async fn subscribe(&self, owner: &UserId) -> Result<Self::Subscription, Self::Error>;
}

/// Stream of point-in-time snapshots from a standing subscription.
#[allow(async_fn_in_trait)]
pub trait DocumentSubscription {
    /// Wait for the next snapshot; `None` once the subscription is
    /// finished (store shut down or connection lost).
    async fn next_snapshot(&mut self) -> Option<DocumentSnapshot>;
}

impl TaskStore for MemoryStore {
    type Error = MemoryStoreError;
    type Subscription = MemorySubscription;

    async fn create_document(&self, data: DocumentData) -> Result<TaskId, Self::Error> {
        self.create(data)
    }

    async fn update_document(&self, id: TaskId, patch: DocumentData) -> Result<(), Self::Error> {
        self.update(id, patch)
    }

    async fn delete_document(&self, id: TaskId) -> Result<(), Self::Error> {
        self.delete(id)
    }

    async fn commit_batch(&self, batch: WriteBatch) -> Result<(), Self::Error> {
        self.commit(&batch)
    }

    async fn subscribe(&self, owner: &UserId) -> Result<Self::Subscription, Self::Error> {
        Ok(Self::subscribe(self, owner))
    }
}

impl DocumentSubscription for MemorySubscription {
    async fn next_snapshot(&mut self) -> Option<DocumentSnapshot> {
        Self::next_snapshot(self).await
    }
}

impl<S> TaskStore for &S
where
    S: TaskStore + ?Sized,
{
    type Error = S::Error;
    type Subscription = S::Subscription;

    async fn create_document(&self, data: DocumentData) -> Result<TaskId, Self::Error> {
        (*self).create_document(data).await
    }

    async fn update_document(&self, id: TaskId, patch: DocumentData) -> Result<(), Self::Error> {
        (*self).update_document(id, patch).await
    }

    async fn delete_document(&self, id: TaskId) -> Result<(), Self::Error> {
        (*self).delete_document(id).await
    }

    async fn commit_batch(&self, batch: WriteBatch) -> Result<(), Self::Error> {
        (*self).commit_batch(batch).await
    }

    async fn subscribe(&self, owner: &UserId) -> Result<Self::Subscription, Self::Error> {
        (*self).subscribe(owner).await
    }
}

impl<S> TaskStore for Arc<S>
where
    S: TaskStore,
{
    type Error = S::Error;
    type Subscription = S::Subscription;

    async fn create_document(&self, data: DocumentData) -> Result<TaskId, Self::Error> {
        (**self).create_document(data).await
    }

    async fn update_document(&self, id: TaskId, patch: DocumentData) -> Result<(), Self::Error> {
        (**self).update_document(id, patch).await
    }

    async fn delete_document(&self, id: TaskId) -> Result<(), Self::Error> {
        (**self).delete_document(id).await
    }

    async fn commit_batch(&self, batch: WriteBatch) -> Result<(), Self::Error> {
        (**self).commit_batch(batch).await
    }

    async fn subscribe(&self, owner: &UserId) -> Result<Self::Subscription, Self::Error> {
        (**self).subscribe(owner).await
    }
}
