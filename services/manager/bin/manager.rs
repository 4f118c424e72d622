//! Main Entrypoint for the TUG Manager Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and the command line.
//! 2. Loading the phrase book.
//! 3. Connecting the analysis, perception and speech-status clients.
//! 4. Starting the listener and the tick loop.
//! 5. Serving the control API and the speech sockets until shutdown.

use anyhow::Context;
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::sync::{mpsc, watch};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tug_core::{PhraseBook, SessionManager, SpeechChannel, SpokenAnswerListener};
use tug_manager::{
    config::Config,
    router::create_router,
    rpc::{AnalysisClient, PerceptionClient, SpeechStatusClient},
    runtime::run_ticks,
    state::AppState,
    ws::SpeechHub,
};

/// Sentences buffered per speech stream for slow sockets.
const HUB_CAPACITY: usize = 64;
/// Utterances buffered between the speech-interp socket and the listener.
const UTTERANCE_QUEUE: usize = 32;

#[derive(Parser)]
#[command(name = "manager")]
#[command(about = "Timed-Up-and-Go session supervisor")]
struct Args {
    /// Manager name, used as the route prefix (overrides MANAGER_NAME)
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Phrase book JSON file (overrides PHRASES_PATH)
    #[arg(short = 'p', long)]
    phrases: Option<PathBuf>,

    /// Address to serve on (overrides BIND_ADDRESS)
    #[arg(short = 'b', long)]
    bind: Option<SocketAddr>,
}

/// Listens for the `Ctrl+C` signal and raises the interrupt so blocking
/// waits and open sockets finish.
async fn shutdown_signal(interrupt: watch::Sender<bool>) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
    interrupt.send_replace(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(name) = args.name {
        anyhow::ensure!(
            !name.is_empty() && !name.contains('/'),
            "'{}' is not a valid manager name",
            name
        );
        config.name = name;
    }
    if let Some(phrases) = args.phrases {
        config.phrases_path = phrases;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing session manager...");

    // --- 3. Load Phrases ---
    let phrases = Arc::new(
        PhraseBook::load(&config.phrases_path).with_context(|| {
            format!("Failed to load phrases from {}", config.phrases_path.display())
        })?,
    );
    let missing = phrases.missing_keys();
    if !missing.is_empty() {
        warn!(?missing, "Phrase book is incomplete, fallback phrase will be used");
    }

    // --- 4. Initialize Service Clients ---
    let analysis = Arc::new(
        AnalysisClient::new(&config.analyzer_url, config.rpc_timeout)
            .context("Failed to build analysis client")?,
    );
    let perception = Arc::new(
        PerceptionClient::new(&config.attention_url, config.rpc_timeout)
            .context("Failed to build perception client")?,
    );
    let speech_status = Arc::new(
        SpeechStatusClient::new(&config.speech_status_url, config.rpc_timeout)
            .context("Failed to build speech status client")?,
    );

    // --- 5. Assemble the Session ---
    let (interrupt_tx, interrupt) = watch::channel(false);
    let speech_hub = SpeechHub::new("speech", HUB_CAPACITY);
    let interp_hub = SpeechHub::new("speech-interp", HUB_CAPACITY);

    let speech = SpeechChannel::new(
        phrases.clone(),
        Arc::new(speech_hub.clone()),
        speech_status,
        config.period,
        interrupt.clone(),
    );
    let listener = Arc::new(SpokenAnswerListener::new(
        phrases,
        Arc::new(interp_hub.clone()),
    ));
    let manager = Arc::new(SessionManager::new(
        config.session_settings(),
        analysis,
        perception,
        speech,
        listener.clone(),
        interrupt.clone(),
    ));

    let (utterances, utterance_rx) = mpsc::channel(UTTERANCE_QUEUE);
    let listener_task = {
        let interrupt = interrupt.clone();
        tokio::spawn(async move { listener.run(utterance_rx, interrupt).await })
    };
    let tick_task = tokio::spawn(run_ticks(manager.clone(), config.period, interrupt.clone()));

    let app_state = Arc::new(AppState {
        manager: manager.clone(),
        speech_hub,
        interp_hub,
        utterances,
        interrupt,
        config: Arc::new(config.clone()),
    });

    // --- 6. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 7. Start Server ---
    info!(
        name = %config.name,
        bind_address = %config.bind_address,
        period_ms = config.period.as_millis() as u64,
        "Service configured. Starting server..."
    );
    let tcp_listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        tcp_listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(interrupt_tx))
    .await?;

    // --- 8. Wind Down ---
    if let Err(e) = tick_task.await {
        warn!(error = %e, "Tick loop ended abnormally");
    }
    if let Err(e) = listener_task.await {
        warn!(error = %e, "Listener ended abnormally");
    }
    manager.stop().await;

    info!("Server has shut down.");
    Ok(())
}
