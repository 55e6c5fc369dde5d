//! In-memory adapters for task storage.

mod backend;

pub use backend::InMemoryTaskBackend;
