//! Session Management
//!
//! A session is one ordered conversation. `SessionStore` is the persistence
//! seam: the conversation store writes every change through to it and loads
//! from it on first reference, so a durable backend can replace
//! `MemorySessionStore` without touching the orchestrator.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::message::{Message, Role};

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A conversation session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: SessionId,

    /// Ordered message history
    messages: Vec<Message>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty session
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    /// Create with a leading system prompt
    pub fn with_system_prompt(id: SessionId, system_prompt: impl Into<String>) -> Self {
        let mut session = Self::new(id);
        session.messages.push(Message::system(system_prompt));
        session
    }

    /// Append a message at the end of the history
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    /// Full, untrimmed history
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent `max_messages` messages, plus the leading system
    /// message when there is one. Order is preserved; whole messages are
    /// dropped from the oldest end only.
    pub fn context(&self, max_messages: usize) -> Vec<Message> {
        let (leading, rest) = match self.messages.split_first() {
            Some((first, rest)) if first.is_system() => (Some(first), rest),
            _ => (None, self.messages.as_slice()),
        };

        let skip = rest.len().saturating_sub(max_messages);
        leading.into_iter().chain(&rest[skip..]).cloned().collect()
    }

    /// Drop everything except system messages
    pub fn clear_history(&mut self) {
        self.messages.retain(Message::is_system);
        self.touch();
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    /// Message count
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Title generated from the first user message
    pub fn title(&self) -> String {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map_or_else(
                || format!("Session {}", self.id.as_str().chars().take(8).collect::<String>()),
                |m| {
                    let preview: String = m.content.chars().take(50).collect();
                    if m.content.chars().count() > 50 {
                        format!("{preview}...")
                    } else {
                        preview
                    }
                },
            )
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            title: self.title(),
            message_count: self.message_count(),
            created_at: self.created_at,
            last_active_at: self.last_active_at,
        }
    }
}

/// Lightweight session listing entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

/// Session store trait for persistence
///
/// Implementations must be read-your-writes consistent.
pub trait SessionStore: Send + Sync {
    /// Save a session
    fn save(&self, session: &Session) -> Result<()>;

    /// Load a session by ID
    fn load(&self, id: &SessionId) -> Result<Option<Session>>;

    /// Delete a session
    fn delete(&self, id: &SessionId) -> Result<()>;

    /// IDs of all stored sessions
    fn list(&self) -> Result<Vec<SessionId>>;
}

/// In-memory session store (for development/testing)
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<Option<Session>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.get(id).cloned())
    }

    fn delete(&self, id: &SessionId) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionId>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<_> = sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
