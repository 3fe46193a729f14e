//! Conversation Store
//!
//! Owns every session and hands out per-session async locks. Different
//! sessions never contend with each other; turns on the same session are
//! serialized by holding its `SessionGuard` for the whole turn.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::Result;
use crate::message::Message;
use crate::session::{MemorySessionStore, Session, SessionId, SessionStore, SessionSummary};

/// Default number of non-system messages sent to the model
pub const DEFAULT_MAX_CONTEXT_MESSAGES: usize = 40;

type SessionHandle = Arc<Mutex<Session>>;

/// Per-session ordered history with bounded-context trimming
pub struct ConversationStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    backend: Arc<dyn SessionStore>,
    max_context_messages: usize,
    system_prompt: Option<String>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTEXT_MESSAGES)
    }
}

impl ConversationStore {
    /// In-memory store keeping `max_context_messages` in the model context
    pub fn new(max_context_messages: usize) -> Self {
        Self::with_backend(Arc::new(MemorySessionStore::new()), max_context_messages)
    }

    /// Store writing through to `backend`
    pub fn with_backend(backend: Arc<dyn SessionStore>, max_context_messages: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            backend,
            max_context_messages: max_context_messages.max(1),
            system_prompt: None,
        }
    }

    /// Seed new sessions with a leading system message
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub const fn max_context_messages(&self) -> usize {
        self.max_context_messages
    }

    /// Lock a session for the duration of a turn, creating it if absent
    pub async fn lock(&self, id: &SessionId) -> Result<SessionGuard> {
        loop {
            let handle = self.handle(id)?;
            let session = handle.clone().lock_owned().await;

            // Deleted while we waited: start over on a fresh session.
            if self.is_current(id, &handle) {
                return Ok(SessionGuard {
                    session,
                    backend: self.backend.clone(),
                    max_context_messages: self.max_context_messages,
                });
            }
            tracing::debug!(session = %id, "session deleted while waiting for its lock");
        }
    }

    /// Append a message, creating the session if absent
    pub async fn append(&self, id: &SessionId, message: Message) -> Result<()> {
        self.lock(id).await?.append(message)
    }

    /// Trimmed context for the model; empty for unknown sessions
    pub async fn context_for(&self, id: &SessionId) -> Result<Vec<Message>> {
        match self.existing(id)? {
            Some(handle) => Ok(handle.lock().await.context(self.max_context_messages)),
            None => Ok(Vec::new()),
        }
    }

    /// Full untrimmed history; empty for unknown sessions
    pub async fn history(&self, id: &SessionId) -> Result<Vec<Message>> {
        match self.existing(id)? {
            Some(handle) => Ok(handle.lock().await.messages().to_vec()),
            None => Ok(Vec::new()),
        }
    }

    /// Remove all non-system messages; returns whether the session existed
    pub async fn clear(&self, id: &SessionId) -> Result<bool> {
        let Some(handle) = self.existing(id)? else {
            return Ok(false);
        };

        let mut session = handle.lock().await;
        session.clear_history();
        self.backend.save(&session)?;
        Ok(true)
    }

    /// Delete a session entirely; returns whether it existed.
    ///
    /// Waits for a running turn on the session to finish first.
    pub async fn delete(&self, id: &SessionId) -> Result<bool> {
        let Some(handle) = self.existing(id)? else {
            return Ok(false);
        };

        let _turn = handle.lock().await;
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        self.backend.delete(id)?;
        tracing::debug!(session = %id, "deleted session");
        Ok(true)
    }

    /// Summaries of all known sessions, most recently active first
    pub async fn summaries(&self) -> Result<Vec<SessionSummary>> {
        let mut summaries = Vec::new();
        for id in self.backend.list()? {
            if let Some(handle) = self.existing(&id)? {
                summaries.push(handle.lock().await.summary());
            }
        }
        summaries.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        Ok(summaries)
    }

    /// Loaded or persisted session, without creating one
    fn existing(&self, id: &SessionId) -> Result<Option<SessionHandle>> {
        if let Some(handle) = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            return Ok(Some(handle.clone()));
        }

        let Some(session) = self.backend.load(id)? else {
            return Ok(None);
        };

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Some(
            sessions
                .entry(id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(session)))
                .clone(),
        ))
    }

    fn is_current(&self, id: &SessionId, handle: &SessionHandle) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
    }

    fn handle(&self, id: &SessionId) -> Result<SessionHandle> {
        if let Some(handle) = self.existing(id)? {
            return Ok(handle);
        }

        let session = self.system_prompt.as_ref().map_or_else(
            || Session::new(id.clone()),
            |prompt| Session::with_system_prompt(id.clone(), prompt.clone()),
        );

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let handle = sessions
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::debug!(session = %id, "created session");
                Arc::new(Mutex::new(session))
            })
            .clone();
        Ok(handle)
    }
}

/// Exclusive access to one session for the duration of a turn
pub struct SessionGuard {
    session: OwnedMutexGuard<Session>,
    backend: Arc<dyn SessionStore>,
    max_context_messages: usize,
}

impl SessionGuard {
    pub fn id(&self) -> &SessionId {
        &self.session.id
    }

    /// Append and persist a message
    pub fn append(&mut self, message: Message) -> Result<()> {
        self.session.push(message);
        self.backend.save(&self.session)
    }

    /// Trimmed context for the model
    pub fn context(&self) -> Vec<Message> {
        self.session.context(self.max_context_messages)
    }

    /// Full untrimmed history
    pub fn history(&self) -> &[Message] {
        self.session.messages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use std::time::Duration;

    #[tokio::test]
    async fn test_append_creates_session_and_preserves_order() {
        let store = ConversationStore::new(10);
        let id = SessionId::from("s1");

        store.append(&id, Message::user("question")).await.unwrap();
        store.append(&id, Message::assistant("answer")).await.unwrap();

        let history = store.history(&id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!((history[0].role, history[0].content.as_str()), (Role::User, "question"));
        assert_eq!((history[1].role, history[1].content.as_str()), (Role::Assistant, "answer"));
    }

    #[tokio::test]
    async fn test_context_trims_but_history_is_untouched() {
        let store = ConversationStore::new(2).with_system_prompt("sys");
        let id = SessionId::from("s1");

        for i in 0..5 {
            store.append(&id, Message::user(format!("m{i}"))).await.unwrap();
        }

        let context: Vec<_> = store
            .context_for(&id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(context, vec!["sys", "m3", "m4"]);
        assert_eq!(store.history(&id).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = ConversationStore::default();
        store.append(&"a".into(), Message::user("secret")).await.unwrap();
        store.append(&"b".into(), Message::user("hello")).await.unwrap();

        let b = store.context_for(&"b".into()).await.unwrap();
        assert!(b.iter().all(|m| m.content != "secret"));
    }

    #[tokio::test]
    async fn test_unknown_session_reads_are_empty_and_not_created() {
        let store = ConversationStore::default();
        assert!(store.history(&"ghost".into()).await.unwrap().is_empty());
        assert!(store.summaries().await.unwrap().is_empty());
        assert!(!store.delete(&"ghost".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_session_turns_are_serialized() {
        let store = Arc::new(ConversationStore::default());
        let id = SessionId::from("s1");

        let guard = store.lock(&id).await.unwrap();

        let store2 = store.clone();
        let id2 = id.clone();
        let waiter = tokio::spawn(async move { store2.append(&id2, Message::user("second")).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let mut guard = guard;
        guard.append(Message::user("first")).unwrap();
        drop(guard);

        waiter.await.unwrap().unwrap();
        let history: Vec<_> = store
            .history(&id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(history, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_delete_waits_for_running_turn() {
        let store = Arc::new(ConversationStore::default());
        let id = SessionId::from("s1");

        let mut turn = store.lock(&id).await.unwrap();
        turn.append(Message::user("turn A user")).unwrap();

        let deleter = tokio::spawn({
            let store = store.clone();
            let id = id.clone();
            async move { store.delete(&id).await }
        });
        let next_turn = tokio::spawn({
            let store = store.clone();
            let id = id.clone();
            async move {
                let mut guard = store.lock(&id).await?;
                guard.append(Message::user("turn B user"))
            }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!deleter.is_finished());
        assert!(!next_turn.is_finished());

        turn.append(Message::assistant("turn A answer")).unwrap();
        drop(turn);

        assert!(deleter.await.unwrap().unwrap());
        next_turn.await.unwrap().unwrap();

        let history: Vec<_> = store
            .history(&id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert!(!history.iter().any(|m| m.starts_with("turn A")));
    }

    #[tokio::test]
    async fn test_other_sessions_do_not_block() {
        let store = ConversationStore::default();
        let _held = store.lock(&"busy".into()).await.unwrap();

        let appended = tokio::time::timeout(
            Duration::from_millis(100),
            store.append(&"free".into(), Message::user("hi")),
        )
        .await;
        assert!(appended.is_ok());
    }

    #[tokio::test]
    async fn test_backend_reload_and_clear() {
        let backend = Arc::new(MemorySessionStore::new());
        let id = SessionId::from("s1");
        {
            let store = ConversationStore::with_backend(backend.clone(), 10).with_system_prompt("sys");
            store.append(&id, Message::user("persisted")).await.unwrap();
        }

        let store = ConversationStore::with_backend(backend, 10);
        assert_eq!(store.history(&id).await.unwrap().len(), 2);
        assert_eq!(store.summaries().await.unwrap()[0].title, "persisted");

        assert!(store.clear(&id).await.unwrap());
        let remaining = store.history(&id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].role, Role::System);
    }
}
