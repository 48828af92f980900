//! Conversation lifecycle: one transcript bound to one remote chat session.
//!
//! The pair is created together, replaced together on reset, and never shared
//! between users. [`SessionStore`] holds one conversation per connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::LlmError;
use crate::llm::{ChatBackend, ChatSession};
use crate::prompt;
use crate::routing::{self, RoutingResult};
use crate::transcript::Transcript;

/// Outcome of a successful turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub routing: RoutingResult,
    pub answer: String,
}

/// A failed turn. The user's question stays in the transcript.
#[derive(Debug, Clone)]
pub struct TurnError {
    pub routing: RoutingResult,
    pub error: LlmError,
}

impl TurnError {
    /// Text shown inline in the assistant's slot.
    pub fn user_message(&self) -> String {
        format!("Error generating response: {}", self.error)
    }
}

pub struct Conversation {
    transcript: Transcript,
    session: Box<dyn ChatSession>,
    backend: Arc<dyn ChatBackend>,
    model_id: String,
}

impl Conversation {
    pub fn new(backend: Arc<dyn ChatBackend>, model_id: &str) -> Self {
        Self {
            transcript: Transcript::new(),
            session: backend.create_session(model_id),
            backend,
            model_id: model_id.to_string(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn session_id(&self) -> Uuid {
        self.session.id()
    }

    /// Run one turn: record the question, route it, send the composed prompt
    /// and record the full answer. On failure only the question is recorded.
    pub async fn ask(&mut self, question: &str) -> Result<Exchange, TurnError> {
        self.transcript.push_user(question);

        let routing = routing::route(question);
        info!(
            session = %self.session.id(),
            device = %routing.device_label,
            "Directing query to {} technical base",
            routing.device_label
        );

        let prompt = prompt::compose(question, &routing);
        debug!(?prompt, "Composed prompt");

        match self.session.send(&prompt).await {
            Ok(answer) => {
                self.transcript.push_assistant(answer.clone());
                Ok(Exchange { routing, answer })
            }
            Err(error) => {
                error!(session = %self.session.id(), %error, "Error generating response");
                Err(TurnError { routing, error })
            }
        }
    }

    /// Start a new consultation. The replacement session is created before
    /// anything is discarded, and transcript and session are swapped together.
    pub fn reset(&mut self) {
        let session = self.backend.create_session(&self.model_id);
        let previous = std::mem::replace(&mut self.session, session);
        self.transcript.clear();
        info!(old = %previous.id(), new = %self.session.id(), "Conversation reset");
    }
}

/// Conversation handle shared between the tasks of one connection.
pub type SharedConversation = Arc<tokio::sync::Mutex<Conversation>>;

/// Conversations keyed by connection identity.
///
/// Entries are created on first use and removed when the connection closes.
pub struct SessionStore {
    backend: Arc<dyn ChatBackend>,
    model_id: String,
    conversations: Mutex<HashMap<Uuid, SharedConversation>>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn ChatBackend>, model_id: impl Into<String>) -> Self {
        Self {
            backend,
            model_id: model_id.into(),
            conversations: Mutex::new(HashMap::new()),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn get_or_create(&self, key: Uuid) -> SharedConversation {
        let mut conversations = self
            .conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conversations
            .entry(key)
            .or_insert_with(|| {
                debug!(connection = %key, "Creating conversation");
                Arc::new(tokio::sync::Mutex::new(Conversation::new(
                    Arc::clone(&self.backend),
                    &self.model_id,
                )))
            })
            .clone()
    }

    pub fn remove(&self, key: &Uuid) -> bool {
        self.conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
