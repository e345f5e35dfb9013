//! In-memory document store with live snapshot subscriptions.
//!
//! Reference implementation of the task-store boundary: schemaless
//! documents keyed by task id, owner-filtered subscriptions that deliver a
//! full snapshot on every committed change, and all-or-nothing batched
//! updates. Integration tests and embedders run against this backend; a
//! production backend lives behind the same seam.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use taskdeck_core::document::{DocumentData, DocumentSnapshot, WriteBatch, fields};
use taskdeck_core::id::{TaskId, UserId};
use tokio::sync::watch;
use tracing::{debug, info};

/// Errors surfaced by [`MemoryStore`].
#[derive(Debug, thiserror::Error)]
pub enum MemoryStoreError {
    /// The addressed document does not exist.
    #[error("document {0} not found")]
    MissingDocument(TaskId),
    /// The internal lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,
}

struct StoreInner {
    documents: Mutex<BTreeMap<TaskId, DocumentData>>,
    revision: watch::Sender<u64>,
}

impl StoreInner {
    fn documents(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<TaskId, DocumentData>>, MemoryStoreError> {
        self.documents.lock().map_err(|_| MemoryStoreError::LockPoisoned)
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn matching(&self, owner: &UserId) -> Result<Vec<(TaskId, DocumentData)>, MemoryStoreError> {
        let documents = self.documents()?;
        Ok(documents
            .iter()
            .filter(|(_, data)| {
                data.get(fields::USER_ID)
                    .and_then(Value::as_str)
                    .is_some_and(|user| user == owner.as_str())
            })
            .map(|(id, data)| (*id, data.clone()))
            .collect())
    }
}

/// Shared handle to an in-memory document store.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                documents: Mutex::new(BTreeMap::new()),
                revision,
            }),
        }
    }

    /// Insert a new document, assigning and returning its identity.
    ///
    /// # Errors
    /// Returns [`MemoryStoreError::LockPoisoned`] when the store lock is
    /// unusable.
    pub fn create(&self, data: DocumentData) -> Result<TaskId, MemoryStoreError> {
        let id = TaskId::new();
        self.inner.documents()?.insert(id, data);
        self.inner.bump();
        info!(%id, "created task document");
        Ok(id)
    }

    /// Merge a partial document into an existing one.
    ///
    /// Fields present in the patch overwrite stored values; all other
    /// stored fields are untouched.
    ///
    /// # Errors
    /// Returns [`MemoryStoreError::MissingDocument`] when the id is unknown.
    pub fn update(&self, id: TaskId, patch: DocumentData) -> Result<(), MemoryStoreError> {
        {
            let mut documents = self.inner.documents()?;
            let document = documents
                .get_mut(&id)
                .ok_or(MemoryStoreError::MissingDocument(id))?;
            for (field, value) in patch {
                document.insert(field, value);
            }
        }
        self.inner.bump();
        debug!(%id, "updated task document");
        Ok(())
    }

    /// Remove a document.
    ///
    /// # Errors
    /// Returns [`MemoryStoreError::MissingDocument`] when the id is unknown.
    pub fn delete(&self, id: TaskId) -> Result<(), MemoryStoreError> {
        {
            let mut documents = self.inner.documents()?;
            documents
                .remove(&id)
                .ok_or(MemoryStoreError::MissingDocument(id))?;
        }
        self.inner.bump();
        info!(%id, "deleted task document");
        Ok(())
    }

    /// Apply every update in the batch as one atomic unit.
    ///
    /// All target ids are validated before anything is written; a missing
    /// id fails the whole batch with the store unchanged. Subscribers see a
    /// single snapshot for the entire batch.
    ///
    /// # Errors
    /// Returns [`MemoryStoreError::MissingDocument`] naming the first
    /// unknown id.
    pub fn commit(&self, batch: &WriteBatch) -> Result<(), MemoryStoreError> {
        {
            let mut documents = self.inner.documents()?;
            if let Some((id, _)) = batch
                .updates()
                .iter()
                .find(|(id, _)| !documents.contains_key(id))
            {
                return Err(MemoryStoreError::MissingDocument(*id));
            }
            for (id, patch) in batch.updates() {
                if let Some(document) = documents.get_mut(id) {
                    for (field, value) in patch {
                        document.insert(field.clone(), value.clone());
                    }
                }
            }
        }
        self.inner.bump();
        info!(writes = batch.len(), "committed batched update");
        Ok(())
    }

    /// Open a standing subscription filtered to the given owner.
    ///
    /// The first [`MemorySubscription::next_snapshot`] call resolves
    /// immediately with the current matching set; every committed change
    /// afterwards yields a fresh snapshot.
    #[must_use]
    pub fn subscribe(&self, owner: &UserId) -> MemorySubscription {
        let mut revision = self.inner.revision.subscribe();
        revision.mark_changed();
        MemorySubscription {
            owner: owner.clone(),
            revision,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Current snapshot of the owner's documents, outside any subscription.
    ///
    /// # Errors
    /// Returns [`MemoryStoreError::LockPoisoned`] when the store lock is
    /// unusable.
    pub fn snapshot(&self, owner: &UserId) -> Result<DocumentSnapshot, MemoryStoreError> {
        Ok(DocumentSnapshot {
            documents: self.inner.matching(owner)?,
        })
    }
}

/// Standing owner-filtered subscription onto a [`MemoryStore`].
pub struct MemorySubscription {
    owner: UserId,
    revision: watch::Receiver<u64>,
    store: Weak<StoreInner>,
}

impl MemorySubscription {
    /// Wait for the next snapshot of the owner's documents.
    ///
    /// Returns `None` once the store has been dropped; the subscription is
    /// finished at that point.
    pub async fn next_snapshot(&mut self) -> Option<DocumentSnapshot> {
        self.revision.changed().await.ok()?;
        let store = self.store.upgrade()?;
        let documents = store.matching(&self.owner).ok()?;
        Some(DocumentSnapshot { documents })
    }
}
