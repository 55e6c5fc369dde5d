//! Cross-subsystem snapshots and recovery.
//!
//! Sessions, conversations and focus chains are exported by their managers
//! as JSON documents and written one file per entity under
//! `<base>/<subsystem>/`. Each write goes to a temporary file first and is
//! renamed into place, so a crash never leaves a truncated snapshot behind.
//! Loading detects the encoding of each file and skips anything it cannot
//! read, so one damaged file costs only that entity.

pub mod catalog;
pub mod entities;
mod fs;
pub mod serializer;
pub mod source;
pub mod store;

pub use catalog::{ConversationCatalog, FocusCatalog, SessionCatalog, SnapshotCatalog};
pub use entities::{
    Conversation, ConversationMessage, EntityMetadata, FocusChain, MessageRole, Session,
    SnapshotEntity,
};
pub use serializer::{
    CompactJsonSerializer, GzipJsonSerializer, JsonSerializer, Serializer, SerializerError,
    SerializerResult, SnapshotFormat, detect_format, serializer_for,
};
pub use source::{SnapshotSource, SnapshotSourceError, SnapshotSourceResult, Subsystem};
pub use store::{
    ErrorCallback, PersistenceError, PersistenceResult, PersistenceStore, SnapshotCallback,
    SnapshotMetadata,
};

#[cfg(test)]
mod tests;
