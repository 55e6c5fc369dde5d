//! Application services for durable task orchestration.

mod mapping;
mod store;

pub use store::{
    CreateTaskRequest, RetryDecision, SubtaskRequest, TaskStore, TaskStoreError, TaskStoreResult,
};
