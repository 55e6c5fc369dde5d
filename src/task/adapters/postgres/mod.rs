//! `PostgreSQL` adapters for task storage.

mod backend;
mod models;
mod schema;

pub use backend::{PostgresTaskBackend, TaskPgPool};
