//! Port contracts for task persistence.
//!
//! Ports define infrastructure-agnostic interfaces used by task services.

pub mod backend;

pub use backend::{
    BackendResult, NewTaskRecord, RecordTimestamps, TaskBackend, TaskBackendError, TaskData,
    TaskQuery, TaskRecord, TaskStatement,
};
