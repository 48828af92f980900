//! Geotab support assistant: routes device questions to the right reference
//! documentation and asks a Gemini model on Vertex AI for the answer.

pub mod chat;
pub mod config;
pub mod constants;
pub mod conversation;
pub mod error;
pub mod gemini;
pub mod llm;
pub mod prompt;
pub mod reveal;
pub mod routing;
pub mod transcript;
pub mod web_server;
