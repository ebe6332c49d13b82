#![forbid(unsafe_code)]

use crate::{DocumentStore, StoreError};
use sq_core::ids::SequenceName;
use sq_core::model::Mutation;
use tracing::debug;

/// Auto-increment style counter over a [`DocumentStore`].
///
/// Each operation is exactly one `find_one_and_update` round trip; nothing is
/// cached between calls and no lock is taken here. Uniqueness and the absence
/// of gaps come from the store applying the mutation atomically.
///
/// Failed calls are not retried. See [`StoreError::outcome`] for whether a
/// failed `next_value` may still have advanced the sequence.
#[derive(Debug, Clone)]
pub struct SequenceCounter<S> {
    store: S,
}

impl<S: DocumentStore> SequenceCounter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Increments `name` by one and returns the new value.
    ///
    /// An unseen name is created and yields `1`.
    pub fn next_value(&self, name: &str) -> Result<i64, StoreError> {
        let name = sequence_name(name)?;
        let seq = self.store.find_one_and_update(&name, Mutation::Increment(1))?;
        debug!(name = %seq.name, value = seq.value, "next sequence value");
        Ok(seq.value)
    }

    /// Sets `name` to exactly `value`, creating it if needed, and returns the stored value.
    pub fn reset(&self, name: &str, value: i64) -> Result<i64, StoreError> {
        let name = sequence_name(name)?;
        let seq = self.store.find_one_and_update(&name, Mutation::Set(value))?;
        debug!(name = %seq.name, value = seq.value, "sequence reset");
        Ok(seq.value)
    }
}

fn sequence_name(value: &str) -> Result<SequenceName, StoreError> {
    SequenceName::try_new(value)
        .map_err(|_| StoreError::InvalidInput("sequence name must not be empty"))
}
