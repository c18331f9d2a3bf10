//! Compensation for writes that span the object store and the document store.
//!
//! Order is always "side effect first, record second". Each side effect registers its undo
//! step; `abort` runs them in reverse and `complete` forgets them. A failed undo is logged
//! under the `partial_failure` target and never replaces the error that caused the abort.

use std::fmt::Display;

use bytes::Bytes;
use tracing::{error, info, warn};

use crate::store::objects::{ObjectStore, ObjectStoreError, StoredObject};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Compensation {
    DeleteObject { path: String },
}

pub struct Saga<'a> {
    objects: &'a dyn ObjectStore,
    operation: &'static str,
    compensations: Vec<Compensation>,
}

impl<'a> Saga<'a> {
    pub fn begin(objects: &'a dyn ObjectStore, operation: &'static str) -> Self {
        Self {
            objects,
            operation,
            compensations: Vec::new(),
        }
    }

    pub async fn upload(
        &mut self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, ObjectStoreError> {
        let stored = self.objects.put(path, bytes, content_type).await?;
        self.compensations.push(Compensation::DeleteObject {
            path: stored.path.clone(),
        });
        Ok(stored)
    }

    /// Undoes every registered side effect. Returns `true` when all of them were undone.
    pub async fn abort(self, cause: &(dyn Display + Sync)) -> bool {
        let mut clean = true;
        for step in self.compensations.into_iter().rev() {
            match step {
                Compensation::DeleteObject { path } => match self.objects.delete(&path).await {
                    Ok(()) => {
                        warn!(
                            target: "partial_failure",
                            operation = self.operation,
                            path = %path,
                            "Compensated upload after failure: {cause}"
                        );
                    }
                    Err(e) => {
                        clean = false;
                        error!(
                            target: "partial_failure",
                            operation = self.operation,
                            path = %path,
                            "Compensation failed, object orphaned: {e} (original failure: {cause})"
                        );
                    }
                },
            }
        }
        clean
    }

    pub fn complete(self) {
        if !self.compensations.is_empty() {
            info!(
                operation = self.operation,
                steps = self.compensations.len(),
                "Cross-store write committed"
            );
        }
    }
}

/// Removes a stored object after its record is already gone. Failure leaves an orphaned
/// object, which is logged but never blocks the record deletion.
pub async fn release_object(
    objects: &dyn ObjectStore,
    path: &str,
    operation: &'static str,
) -> bool {
    match objects.delete(path).await {
        Ok(()) => true,
        Err(ObjectStoreError::NotFound(_)) => true,
        Err(e) => {
            error!(
                target: "partial_failure",
                operation,
                path = %path,
                "Record deleted but stored object could not be removed: {e}"
            );
            false
        }
    }
}
