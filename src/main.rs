use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use geotab_support::config::{ConnectionArgs, Settings};
use geotab_support::constants::{DEFAULT_PORT, DEFAULT_REVEAL_DELAY_MS};
use geotab_support::conversation::SessionStore;
use geotab_support::gemini::GeminiBackend;
use geotab_support::llm::{ChatBackend, LoggingBackend};
use geotab_support::{chat, routing, web_server};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    connection: ConnectionArgs,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the support assistant web UI.
    Serve {
        #[arg(long, default_value_t = DEFAULT_PORT, help = "Port for the web server.")]
        port: u16,
        #[arg(long, default_value_t = DEFAULT_REVEAL_DELAY_MS, help = "Delay between revealed characters, in milliseconds.")]
        reveal_delay_ms: u64,
    },
    /// Chat with the assistant in the terminal.
    Chat {
        #[arg(long, default_value_t = DEFAULT_REVEAL_DELAY_MS, help = "Delay between revealed characters, in milliseconds.")]
        reveal_delay_ms: u64,
    },
    /// Show which device documentation a question would be routed to.
    Route {
        #[arg(help = "The support question to classify.")]
        question: String,
    },
}

/// Validate settings and build the shared remote client. Any failure here is fatal.
fn connect(args: &ConnectionArgs) -> Result<(Settings, Arc<dyn ChatBackend>)> {
    let settings = Settings::from_args(args).context("Invalid configuration")?;
    let gemini = GeminiBackend::new(settings.clone()).context("Failed to create Vertex AI client")?;
    let backend: Arc<dyn ChatBackend> = Arc::new(LoggingBackend::new(Arc::new(gemini)));
    Ok((settings, backend))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (PROJECT_ID, access token, ...)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g., RUST_LOG=info,geotab_support=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("geotab-support starting with command: {:?}", cli.command);

    match cli.command {
        Commands::Serve {
            port,
            reveal_delay_ms,
        } => {
            let (settings, backend) = connect(&cli.connection)?;
            info!("Starting support assistant on port {}...", port);

            let sessions = Arc::new(SessionStore::new(backend, settings.model.clone()));
            let state = web_server::AppState::new(
                sessions,
                settings.project_id.clone(),
                Duration::from_millis(reveal_delay_ms),
            );

            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(port, state).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, initiating shutdown...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                info!("Aborting web server task...");
                web_server_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Chat { reveal_delay_ms } => {
            let (settings, backend) = connect(&cli.connection)?;
            info!("Starting interactive chat session...");
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            chat::run_chat(
                backend,
                &settings.model,
                &settings.project_id,
                stdin,
                &mut stdout,
                Duration::from_millis(reveal_delay_ms),
            )
            .await
            .context("Chat session failed")?;
        }
        Commands::Route { question } => {
            let result = routing::route(&question);
            println!("Device: {}", result.device_label);
            println!("Reference URL: {}", result.reference_url);
        }
    }

    Ok(())
}
