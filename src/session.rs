//! Per-chat session state and the keyed session store
//!
//! Each chat owns one `ChatSession` behind its own mutex. The store's map
//! lock is held only for lookup and insertion, so chats never block each
//! other.

use crate::quiz::QuizState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Registration status of a chat, cached from the user directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegistrationState {
    /// No directory record
    #[default]
    Unregistered,
    /// Prompted for a phone number, or a record without a phone exists
    PendingPhone,
    /// Directory record with a phone number
    Registered,
}

/// Interaction mode deciding who consumes the next message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Idle,
    /// Browsing the menu and filling the cart
    Ordering,
    /// Answering quiz questions
    Quiz,
    /// Talking to the answering service
    AiChat,
}

/// One cart line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub name: String,
    /// Price in so'm
    pub unit_price: u64,
}

/// Mutable per-chat record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    chat_id: i64,
    /// Cached registration state
    pub registration: RegistrationState,
    /// Whether `registration` has been loaded from the directory
    pub registration_synced: bool,
    mode: Mode,
    /// `None` until the first `/start` or purchase; `Some(vec![])` is an open, empty cart
    pub cart: Option<Vec<CartLine>>,
    quiz: Option<QuizState>,
}

impl ChatSession {
    /// Creates a fresh session for `chat_id`.
    #[must_use]
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            registration: RegistrationState::Unregistered,
            registration_synced: false,
            mode: Mode::Idle,
            cart: None,
            quiz: None,
        }
    }

    #[must_use]
    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.registration == RegistrationState::Registered
    }

    #[must_use]
    pub fn quiz(&self) -> Option<&QuizState> {
        self.quiz.as_ref()
    }

    /// Mutable access to the running quiz.
    pub fn quiz_mut(&mut self) -> Option<&mut QuizState> {
        self.quiz.as_mut()
    }

    /// Replaces any running quiz and switches to `Mode::Quiz`.
    pub fn start_quiz(&mut self, quiz: QuizState) {
        self.quiz = Some(quiz);
        self.mode = Mode::Quiz;
    }

    /// Removes the quiz and returns to `Mode::Idle`.
    pub fn end_quiz(&mut self) -> Option<QuizState> {
        self.mode = Mode::Idle;
        self.quiz.take()
    }

    /// Switches to a non-quiz mode. Leaving `Quiz` drops the quiz.
    pub fn enter(&mut self, mode: Mode) {
        if mode == Mode::Quiz {
            // Quiz mode is only reachable through start_quiz
            return;
        }
        if self.mode != mode {
            debug!(chat_id = self.chat_id, from = ?self.mode, to = ?mode, "Mode change");
        }
        self.quiz = None;
        self.mode = mode;
    }

    /// Marks the chat registered and resets the mode.
    pub fn mark_registered(&mut self) {
        self.registration = RegistrationState::Registered;
        self.registration_synced = true;
        self.enter(Mode::Idle);
    }

    /// Forgets the cached registration so the directory is consulted again.
    pub fn reset_registration(&mut self) {
        self.registration = RegistrationState::Unregistered;
        self.registration_synced = false;
    }
}

/// Keyed store of chat sessions
///
/// Sessions are created on first access and live until process exit.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<i64, Arc<Mutex<ChatSession>>>>,
}

impl SessionStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session for `chat_id`, creating it if absent
    pub async fn get_or_create(&self, chat_id: i64) -> Arc<Mutex<ChatSession>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(&chat_id) {
                return session.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(chat_id)
            .or_insert_with(|| Arc::new(Mutex::new(ChatSession::new(chat_id))))
            .clone()
    }

    /// Get session if exists
    pub async fn get(&self, chat_id: i64) -> Option<Arc<Mutex<ChatSession>>> {
        let sessions = self.sessions.read().await;
        sessions.get(&chat_id).cloned()
    }

    /// Runs `f` on the chat's session while holding its lock.
    pub async fn with_session<F, R>(&self, chat_id: i64, f: F) -> R
    where
        F: FnOnce(&mut ChatSession) -> R,
    {
        let session = self.get_or_create(chat_id).await;
        let mut guard = session.lock().await;
        f(&mut guard)
    }

    /// Copy of the session, if it exists.
    pub async fn snapshot(&self, chat_id: i64) -> Option<ChatSession> {
        let session = self.get(chat_id).await?;
        let guard = session.lock().await;
        Some(guard.clone())
    }

    /// Number of known chats
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if no chat has been seen yet
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::generate;

    #[test]
    fn test_new_session_defaults() {
        let session = ChatSession::new(5);
        assert_eq!(session.chat_id(), 5);
        assert_eq!(session.mode(), Mode::Idle);
        assert_eq!(session.registration, RegistrationState::Unregistered);
        assert!(session.cart.is_none());
        assert!(session.quiz().is_none());
    }

    #[test]
    fn test_quiz_mode_tracks_quiz_presence() {
        let mut session = ChatSession::new(1);
        session.start_quiz(generate(3));
        assert_eq!(session.mode(), Mode::Quiz);
        assert!(session.quiz().is_some());

        session.enter(Mode::AiChat);
        assert_eq!(session.mode(), Mode::AiChat);
        assert!(session.quiz().is_none());

        session.start_quiz(generate(3));
        assert!(session.end_quiz().is_some());
        assert_eq!(session.mode(), Mode::Idle);
        assert!(session.quiz().is_none());
    }

    #[test]
    fn test_enter_quiz_without_state_is_ignored() {
        let mut session = ChatSession::new(1);
        session.enter(Mode::Ordering);
        session.enter(Mode::Quiz);
        assert_eq!(session.mode(), Mode::Ordering);
    }

    #[test]
    fn test_registration_transitions() {
        let mut session = ChatSession::new(1);
        session.start_quiz(generate(2));
        session.mark_registered();
        assert!(session.is_registered());
        assert_eq!(session.mode(), Mode::Idle);
        assert!(session.quiz().is_none());

        session.reset_registration();
        assert!(!session.is_registered());
        assert!(!session.registration_synced);
    }

    #[tokio::test]
    async fn test_store_returns_same_session() {
        let store = SessionStore::new();
        let first = store.get_or_create(10).await;
        let second = store.get_or_create(10).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len().await, 1);
        assert!(store.get(11).await.is_none());
    }

    #[tokio::test]
    async fn test_with_session_mutates_under_lock() {
        let store = Arc::new(SessionStore::new());

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .with_session(7, |session| {
                            session.cart.get_or_insert_with(Vec::new).push(CartLine {
                                name: format!("item-{i}"),
                                unit_price: 1,
                            });
                        })
                        .await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.expect("task panicked");
        }

        let snapshot = store.snapshot(7).await.expect("session exists");
        assert_eq!(snapshot.cart.map(|cart| cart.len()), Some(20));
    }
}
