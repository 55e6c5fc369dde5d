//! Task lifecycle and durable task storage.
//!
//! Tasks are the schedulable unit of work. The module follows hexagonal
//! architecture:
//!
//! - Domain types and pure state transitions in [`domain`]
//! - The storage backend contract in [`ports`]
//! - In-memory and `PostgreSQL` backends in [`adapters`]
//! - The conditional-update task store in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
