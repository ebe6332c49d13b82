#![forbid(unsafe_code)]

mod config;
mod counter;
mod document;
mod memory;
mod store;

pub use config::*;
pub use counter::SequenceCounter;
pub use document::DocumentStore;
pub use memory::MemoryStore;
pub use store::{Outcome, SqliteStore, StoreError};
