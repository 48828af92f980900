// Terminal chat. Same conversation semantics as the web UI, one process = one
// session.

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::info;

use crate::constants::{APP_CAPTION, APP_TITLE, SOURCE_ATTRIBUTION};
use crate::conversation::Conversation;
use crate::llm::ChatBackend;
use crate::reveal;

const NEW_COMMAND: &str = "/new";
const QUIT_COMMAND: &str = "/quit";

pub async fn run_chat<R, W>(
    backend: Arc<dyn ChatBackend>,
    model_id: &str,
    project_id: &str,
    input: R,
    out: &mut W,
    reveal_delay: Duration,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut conversation = Conversation::new(backend, model_id);

    writeln!(out, "{} - {}", APP_TITLE, APP_CAPTION)?;
    writeln!(out, "Active Project: {}", project_id)?;
    writeln!(out, "{}", SOURCE_ATTRIBUTION)?;
    writeln!(
        out,
        "Type a question, {} for a new consultation, {} to exit.",
        NEW_COMMAND, QUIT_COMMAND
    )?;

    let mut lines = input.lines();
    loop {
        write!(out, "\n> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let question = line.as_str();

        match question.trim() {
            "" => continue,
            QUIT_COMMAND => break,
            NEW_COMMAND => {
                conversation.reset();
                writeln!(out, "New consultation started.")?;
                continue;
            }
            _ => {}
        }

        let routing = crate::routing::route(question);
        writeln!(out, "Analyzing {} documentation...", routing.device_label)?;
        writeln!(out, "Reference URL: {}", routing.reference_url)?;

        match conversation.ask(question).await {
            Ok(exchange) => {
                reveal::play_to(out, &exchange.answer, reveal_delay)
                    .await
                    .context("Failed to write answer")?;
            }
            Err(e) => {
                writeln!(out, "{}", e.user_message())?;
            }
        }
    }

    info!(
        turns = conversation.transcript().len(),
        "Chat session finished"
    );
    Ok(())
}
