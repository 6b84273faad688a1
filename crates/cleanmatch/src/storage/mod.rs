//! Process-local storage backing the matching engines.

mod memory;

pub use memory::{InMemoryMatchingStore, InMemoryUserDirectory};
