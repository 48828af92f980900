//! Remote chat service abstraction.
//!
//! A [`ChatBackend`] is built once at startup and shared. Each conversation owns
//! one [`ChatSession`] created from it; the session keeps the remote
//! conversational context between calls.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::error::LlmError;

#[async_trait]
pub trait ChatSession: Send {
    /// Identity of this session. A reset always yields a new id.
    fn id(&self) -> Uuid;

    fn model_id(&self) -> &str;

    /// Send one prompt and wait for the complete reply.
    async fn send(&mut self, text: &str) -> Result<String, LlmError>;
}

pub trait ChatBackend: Send + Sync {
    fn create_session(&self, model_id: &str) -> Box<dyn ChatSession>;
}

/// Logging wrapper around a backend's sessions.
pub struct LoggingBackend {
    inner: Arc<dyn ChatBackend>,
}

impl LoggingBackend {
    pub fn new(inner: Arc<dyn ChatBackend>) -> Self {
        Self { inner }
    }
}

impl ChatBackend for LoggingBackend {
    fn create_session(&self, model_id: &str) -> Box<dyn ChatSession> {
        let inner = self.inner.create_session(model_id);
        tracing::debug!(session = %inner.id(), model = %model_id, "Chat session created");
        Box::new(LoggingSession { inner })
    }
}

struct LoggingSession {
    inner: Box<dyn ChatSession>,
}

#[async_trait]
impl ChatSession for LoggingSession {
    fn id(&self) -> Uuid {
        self.inner.id()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn send(&mut self, text: &str) -> Result<String, LlmError> {
        let start = Instant::now();
        let result = self.inner.send(text).await;
        let duration = start.elapsed();

        match &result {
            Ok(answer) => {
                tracing::info!(
                    session = %self.inner.id(),
                    model = %self.inner.model_id(),
                    duration_ms = %duration.as_millis(),
                    answer_chars = answer.chars().count(),
                    "Chat request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    session = %self.inner.id(),
                    model = %self.inner.model_id(),
                    duration_ms = %duration.as_millis(),
                    kind = ?e.kind,
                    error = %e.message,
                    "Chat request failed"
                );
            }
        }

        result
    }
}
