#![forbid(unsafe_code)]

use crate::StoreError;
use sq_core::ids::SequenceName;
use sq_core::model::{Mutation, Sequence};
use std::sync::Arc;

/// Document store capability the sequence counter is built on.
///
/// `find_one_and_update` must be a single atomic step at the store: locate the
/// document for `name`, apply `mutation` (inserting it over an implicit 0 when
/// absent) and return the document as it is after the mutation. Implementations
/// must never split this into a read followed by a write.
pub trait DocumentStore {
    fn find_one_and_update(
        &self,
        name: &SequenceName,
        mutation: Mutation,
    ) -> Result<Sequence, StoreError>;

    fn find_one(&self, name: &SequenceName) -> Result<Option<Sequence>, StoreError>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn find_one_and_update(
        &self,
        name: &SequenceName,
        mutation: Mutation,
    ) -> Result<Sequence, StoreError> {
        (**self).find_one_and_update(name, mutation)
    }

    fn find_one(&self, name: &SequenceName) -> Result<Option<Sequence>, StoreError> {
        (**self).find_one(name)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn find_one_and_update(
        &self,
        name: &SequenceName,
        mutation: Mutation,
    ) -> Result<Sequence, StoreError> {
        (**self).find_one_and_update(name, mutation)
    }

    fn find_one(&self, name: &SequenceName) -> Result<Option<Sequence>, StoreError> {
        (**self).find_one(name)
    }
}
