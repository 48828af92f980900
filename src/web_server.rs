use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    serve, Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::constants::{
    APP_CAPTION, APP_TITLE, INPUT_PLACEHOLDER, SOURCE_ATTRIBUTION, STATIC_DIR, TEMPLATES_DIR,
};
use crate::conversation::{SessionStore, SharedConversation};
use crate::reveal;

/// Messages sent by the browser.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ask { question: String },
    Reset,
}

/// Messages pushed to the browser.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Info {
        project_id: String,
        model: String,
        source: String,
    },
    Routing {
        device_label: String,
        reference_url: String,
    },
    Reveal {
        chunk: String,
    },
    Answer {
        content: String,
    },
    Error {
        message: String,
    },
    Cleared,
}

// Reveal chunks are small; the writer keeps up unless the client stalls.
const OUTBOX_CAPACITY: usize = 256;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    sessions: Arc<SessionStore>,
    project_id: String,
    reveal_delay: Duration,
}

impl AppState {
    pub fn new(sessions: Arc<SessionStore>, project_id: impl Into<String>, reveal_delay: Duration) -> Self {
        Self {
            templates: Arc::new(create_minijinja_env(TEMPLATES_DIR.as_str())),
            sessions,
            project_id: project_id.into(),
            reveal_delay,
        }
    }
}

// Minijinja Environment setup
fn create_minijinja_env(dir: &str) -> AutoReloader {
    let dir = dir.to_string();
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(&dir));
        notifier.watch_path(&dir, true);
        Ok(env)
    })
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, (StatusCode, Html<String>)> {
    state
        .templates
        .acquire_env()
        .and_then(|env| {
            env.get_template("index.html").and_then(|tmpl| {
                tmpl.render(minijinja::context! {
                    title => APP_TITLE,
                    caption => APP_CAPTION,
                    project_id => &state.project_id,
                    source => SOURCE_ATTRIBUTION,
                    placeholder => INPUT_PLACEHOLDER,
                })
            })
        })
        .map(Html)
        .map_err(|e| {
            error!("Failed to get or render template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
        })
}

// WebSocket upgrade handler. Each socket is its own user session.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket connection upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

type Outbox = mpsc::Sender<ServerMessage>;

async fn push(outbox: &Outbox, msg: ServerMessage) -> Result<()> {
    outbox
        .send(msg)
        .await
        .map_err(|_| anyhow::anyhow!("WebSocket writer closed"))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection = Uuid::new_v4();
    info!(%connection, "New WebSocket connection established");
    let conversation = state.sessions.get_or_create(connection);

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbox, mut outbox_rx) = mpsc::channel::<ServerMessage>(OUTBOX_CAPACITY);

    // Writer task: serialize outgoing messages onto the socket
    let writer = tokio::spawn(async move {
        while let Some(msg) = outbox_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_tx.send(Message::Text(json)).await.is_err() {
                        warn!("WebSocket client disconnected or send error. Closing connection.");
                        break;
                    }
                }
                Err(e) => error!("Failed to serialize server message: {}", e),
            }
        }
    });

    let greeting = ServerMessage::Info {
        project_id: state.project_id.clone(),
        model: state.sessions.model_id().to_string(),
        source: SOURCE_ATTRIBUTION.to_string(),
    };
    let mut connected = true;
    if push(&outbox, greeting).await.is_err() {
        warn!(%connection, "Failed to send greeting to new WebSocket client");
        connected = false;
    }

    while connected {
        let Some(received) = ws_rx.next().await else {
            info!(%connection, "WebSocket client disconnected");
            break;
        };
        match received {
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        handle_client_message(&outbox, &state, &conversation, client_msg).await
                    }
                    Err(e) => {
                        warn!(%connection, "Ignoring malformed client message: {}", e);
                        push(
                            &outbox,
                            ServerMessage::Error {
                                message: format!("Malformed message: {}", e),
                            },
                        )
                        .await
                    }
                };
                if let Err(e) = reply {
                    warn!(%connection, "Client went away mid-turn: {:?}", e);
                    connected = false;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(%connection, "Received unexpected binary message from client");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Axum answers pings automatically
            }
            Ok(Message::Close(_)) => {
                info!(%connection, "Client requested WebSocket close");
                break;
            }
            Err(e) => {
                warn!(%connection, "WebSocket receive error: {}", e);
                break;
            }
        }
    }

    drop(outbox);
    if let Err(e) = writer.await {
        error!(%connection, "WebSocket writer task failed: {:?}", e);
    }
    state.sessions.remove(&connection);
    info!(%connection, "WebSocket connection closed");
}

/// Handle one client message. The conversation lock is held for the whole
/// turn, so a connection's questions are answered strictly in order.
async fn handle_client_message(
    outbox: &Outbox,
    state: &AppState,
    conversation: &SharedConversation,
    msg: ClientMessage,
) -> Result<()> {
    let mut conversation = conversation.lock().await;
    match msg {
        ClientMessage::Ask { question } => {
            if question.trim().is_empty() {
                return Ok(());
            }
            // Status goes out before the remote call so it shows while waiting.
            let routing = crate::routing::route(&question);
            push(
                outbox,
                ServerMessage::Routing {
                    device_label: routing.device_label,
                    reference_url: routing.reference_url,
                },
            )
            .await?;

            match conversation.ask(&question).await {
                Ok(exchange) => {
                    for (chunk, _) in reveal::steps(&exchange.answer) {
                        push(outbox, ServerMessage::Reveal { chunk: chunk.to_string() }).await?;
                        if !state.reveal_delay.is_zero() {
                            tokio::time::sleep(state.reveal_delay).await;
                        }
                    }
                    push(outbox, ServerMessage::Answer { content: exchange.answer }).await?;
                }
                Err(e) => {
                    push(outbox, ServerMessage::Error { message: e.user_message() }).await?;
                }
            }
        }
        ClientMessage::Reset => {
            conversation.reset();
            push(outbox, ServerMessage::Cleared).await?;
        }
    }
    Ok(())
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    // Serve static files from the static directory
    let static_files_service = ServeDir::new(STATIC_DIR.as_str()).not_found_service(
        tower::service_fn(|_req: axum::extract::Request| async {
            Ok::<_, Infallible>(
                (hyper::StatusCode::NOT_FOUND, "Not Found").into_response(),
            )
        }),
    );

    Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(ws_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_web_server(port: u16, state: AppState) -> Result<()> {
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::testing::ScriptedBackend;

    fn state_with(backend: &ScriptedBackend) -> AppState {
        let sessions = Arc::new(SessionStore::new(Arc::new(backend.clone()), "gemini-2.0-flash"));
        AppState::new(sessions, "test-project", Duration::ZERO)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_ask_streams_routing_reveal_answer() {
        let backend = ScriptedBackend::new();
        backend.reply("Hi!");
        let state = state_with(&backend);
        let conversation = state.sessions.get_or_create(Uuid::new_v4());
        let (tx, mut rx) = mpsc::channel(64);

        let ask = ClientMessage::Ask {
            question: "My GO Focus camera won't connect".to_string(),
        };
        handle_client_message(&tx, &state, &conversation, ask).await.unwrap();

        let messages = drain(&mut rx);
        assert_eq!(
            messages,
            vec![
                ServerMessage::Routing {
                    device_label: "GO Focus / Focus Plus".to_string(),
                    reference_url: crate::constants::URL_FOCUS.to_string(),
                },
                ServerMessage::Reveal { chunk: "H".to_string() },
                ServerMessage::Reveal { chunk: "i".to_string() },
                ServerMessage::Reveal { chunk: "!".to_string() },
                ServerMessage::Answer { content: "Hi!".to_string() },
            ]
        );
        assert_eq!(conversation.lock().await.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_ask_sends_inline_error() {
        let backend = ScriptedBackend::new();
        backend.fail(LlmError::network("Connection failed"));
        let state = state_with(&backend);
        let conversation = state.sessions.get_or_create(Uuid::new_v4());
        let (tx, mut rx) = mpsc::channel(64);

        let ask = ClientMessage::Ask {
            question: "What do the LEDs mean?".to_string(),
        };
        handle_client_message(&tx, &state, &conversation, ask).await.unwrap();

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[1],
            ServerMessage::Error {
                message: "Error generating response: Connection failed".to_string()
            }
        );
        let guard = conversation.lock().await;
        assert_eq!(guard.transcript().len(), 1);
        assert!(guard.transcript().ends_unanswered());
    }

    #[tokio::test]
    async fn test_blank_question_is_ignored() {
        let backend = ScriptedBackend::new();
        let state = state_with(&backend);
        let conversation = state.sessions.get_or_create(Uuid::new_v4());
        let (tx, mut rx) = mpsc::channel(8);

        let ask = ClientMessage::Ask { question: "   ".to_string() };
        handle_client_message(&tx, &state, &conversation, ask).await.unwrap();

        assert!(drain(&mut rx).is_empty());
        assert!(conversation.lock().await.transcript().is_empty());
        assert!(backend.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reset_clears_conversation() {
        let backend = ScriptedBackend::new();
        backend.reply("answer");
        let state = state_with(&backend);
        let conversation = state.sessions.get_or_create(Uuid::new_v4());
        let (tx, mut rx) = mpsc::channel(64);

        let ask = ClientMessage::Ask { question: "GO9 LEDs".to_string() };
        handle_client_message(&tx, &state, &conversation, ask).await.unwrap();
        let old_session = conversation.lock().await.session_id();
        drain(&mut rx);

        handle_client_message(&tx, &state, &conversation, ClientMessage::Reset)
            .await
            .unwrap();
        assert_eq!(drain(&mut rx), vec![ServerMessage::Cleared]);
        let guard = conversation.lock().await;
        assert!(guard.transcript().is_empty());
        assert_ne!(guard.session_id(), old_session);
    }

    #[tokio::test]
    async fn test_closed_outbox_reports_error() {
        let backend = ScriptedBackend::new();
        let state = state_with(&backend);
        let conversation = state.sessions.get_or_create(Uuid::new_v4());
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        let result = handle_client_message(&tx, &state, &conversation, ClientMessage::Reset).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_client_messages_parse() {
        let ask: ClientMessage =
            serde_json::from_str(r#"{"type":"ask","question":"What do the LEDs mean?"}"#).unwrap();
        assert_eq!(
            ask,
            ClientMessage::Ask {
                question: "What do the LEDs mean?".to_string()
            }
        );
        let reset: ClientMessage = serde_json::from_str(r#"{"type":"reset"}"#).unwrap();
        assert_eq!(reset, ClientMessage::Reset);
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"delete_turn"}"#).is_err());
    }

    #[test]
    fn test_server_messages_are_tagged() {
        let value = serde_json::to_value(ServerMessage::Routing {
            device_label: "Geotab GO9".to_string(),
            reference_url: crate::constants::URL_GO9.to_string(),
        })
        .unwrap();
        assert_eq!(value["type"], "routing");
        assert_eq!(value["device_label"], "Geotab GO9");

        let cleared = serde_json::to_value(ServerMessage::Cleared).unwrap();
        assert_eq!(cleared, serde_json::json!({ "type": "cleared" }));
    }
}
