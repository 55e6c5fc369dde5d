//! Session, conversation and focus chain records captured in snapshots.

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Free-form string metadata attached to snapshot entities.
pub type EntityMetadata = BTreeMap<String, String>;

/// An entity the snapshot catalogs can hold.
pub trait SnapshotEntity: Clone + Serialize + for<'de> Deserialize<'de> + Send + Sync {
    /// Stable identifier, also used as the snapshot file stem.
    fn snapshot_id(&self) -> &str;
}

fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// A development session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project_id: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    metadata: EntityMetadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session with a generated identifier.
    pub fn new(name: impl Into<String>, clock: &impl Clock) -> Self {
        let now = clock.utc();
        Self {
            id: generate_id("session"),
            name: name.into(),
            project_id: None,
            tags: Vec::new(),
            metadata: EntityMetadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the generated identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Associates the session with a project.
    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Sets a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the session name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the associated project, if any.
    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Returns the tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the metadata.
    #[must_use]
    pub const fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    /// Returns when the session was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the session last changed.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl SnapshotEntity for Session {
    fn snapshot_id(&self) -> &str {
        &self.id
    }
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// The human participant.
    User,
    /// The model.
    Assistant,
    /// Injected instructions.
    System,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    role: MessageRole,
    content: String,
    timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    /// Creates a message stamped with the current time.
    pub fn new(role: MessageRole, content: impl Into<String>, clock: &impl Clock) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: clock.utc(),
        }
    }

    /// Returns the author role.
    #[must_use]
    pub const fn role(&self) -> MessageRole {
        self.role
    }

    /// Returns the message text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns when the message was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// A conversation held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    id: String,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(default)]
    messages: Vec<ConversationMessage>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    metadata: EntityMetadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Creates an empty conversation with a generated identifier.
    pub fn new(title: impl Into<String>, clock: &impl Clock) -> Self {
        let now = clock.utc();
        Self {
            id: generate_id("conv"),
            title: title.into(),
            session_id: None,
            messages: Vec::new(),
            tags: Vec::new(),
            metadata: EntityMetadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the generated identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Associates the conversation with a session.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Sets a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Appends a message and bumps the update time.
    pub fn push_message(&mut self, message: ConversationMessage) {
        self.updated_at = self.updated_at.max(message.timestamp());
        self.messages.push(message);
    }

    /// Returns the conversation identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the owning session, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Returns the messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Returns the tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the metadata.
    #[must_use]
    pub const fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    /// Returns when the conversation was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the conversation last changed.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl SnapshotEntity for Conversation {
    fn snapshot_id(&self) -> &str {
        &self.id
    }
}

/// An ordered list of focus targets with a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusChain {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    focuses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current: Option<usize>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    metadata: EntityMetadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FocusChain {
    /// Creates an empty chain with a generated identifier.
    pub fn new(name: impl Into<String>, clock: &impl Clock) -> Self {
        let now = clock.utc();
        Self {
            id: generate_id("chain"),
            name: name.into(),
            description: String::new(),
            focuses: Vec::new(),
            current: None,
            tags: Vec::new(),
            metadata: EntityMetadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the generated identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Sets a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Appends a focus target and moves the cursor to it.
    pub fn push_focus(&mut self, target: impl Into<String>, clock: &impl Clock) {
        self.focuses.push(target.into());
        self.current = self.focuses.len().checked_sub(1);
        self.updated_at = clock.utc();
    }

    /// Returns the chain identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the chain name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the focus targets, oldest first.
    #[must_use]
    pub fn focuses(&self) -> &[String] {
        &self.focuses
    }

    /// Returns the focus under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.current
            .and_then(|index| self.focuses.get(index))
            .map(String::as_str)
    }

    /// Returns the tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the metadata.
    #[must_use]
    pub const fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    /// Returns when the chain was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the chain last changed.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl SnapshotEntity for FocusChain {
    fn snapshot_id(&self) -> &str {
        &self.id
    }
}
