#![forbid(unsafe_code)]

use crate::{DocumentStore, StoreError};
use sq_core::ids::SequenceName;
use sq_core::model::{Mutation, Sequence};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Process-local document store.
///
/// The mutex is the store's single serialization point, the in-process
/// counterpart of a primary node.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<SequenceName, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deletes the document for `name`. Returns whether one existed.
    pub fn remove(&self, name: &SequenceName) -> Result<bool, StoreError> {
        Ok(self.documents()?.remove(name).is_some())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.documents()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.documents()?.is_empty())
    }

    fn documents(&self) -> Result<MutexGuard<'_, BTreeMap<SequenceName, i64>>, StoreError> {
        self.documents.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl DocumentStore for MemoryStore {
    fn find_one_and_update(
        &self,
        name: &SequenceName,
        mutation: Mutation,
    ) -> Result<Sequence, StoreError> {
        let mut documents = self.documents()?;
        let current = documents.get(name).copied();
        let value = mutation
            .apply(current)
            .ok_or_else(|| StoreError::Overflow {
                name: name.to_string(),
            })?;
        documents.insert(name.clone(), value);
        Ok(Sequence {
            name: name.clone(),
            value,
        })
    }

    fn find_one(&self, name: &SequenceName) -> Result<Option<Sequence>, StoreError> {
        Ok(self.documents()?.get(name).map(|value| Sequence {
            name: name.clone(),
            value: *value,
        }))
    }
}
