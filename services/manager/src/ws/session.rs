//! Connection lifecycle of the speech sockets.

use super::SpeechHub;
use crate::{protocol::parse_utterance, state::AppState};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, instrument, warn};
use tug_core::Utterance;
use tug_core::speech::{Interrupt, interrupted};
use uuid::Uuid;

/// Upgrades to the outbound speech stream: every phrase the session speaks.
pub async fn speech_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    upgrade(ws, &state.speech_hub, None, state.interrupt.clone())
}

/// Upgrades to the speech-interp stream: recognised utterances in, canned
/// replies out.
pub async fn speech_interp_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    upgrade(
        ws,
        &state.interp_hub,
        Some(state.utterances.clone()),
        state.interrupt.clone(),
    )
}

fn upgrade(
    ws: WebSocketUpgrade,
    hub: &SpeechHub,
    inbound: Option<mpsc::Sender<Utterance>>,
    interrupt: Interrupt,
) -> Response {
    // Subscribe before the upgrade completes so the peer counts right away.
    let outbound = hub.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, outbound, inbound, interrupt))
}

/// Forwards broadcast sentences to the socket and, when `inbound` is set,
/// hands received utterances to the listener.
#[instrument(name = "speech_socket", skip_all, fields(connection_id))]
async fn handle_socket(
    socket: WebSocket,
    mut outbound: broadcast::Receiver<String>,
    inbound: Option<mpsc::Sender<Utterance>>,
    mut interrupt: Interrupt,
) {
    let connection_id = Uuid::new_v4();
    tracing::Span::current().record("connection_id", connection_id.to_string());
    info!(inbound = inbound.is_some(), "Speech socket connected");

    let (mut socket_tx, mut socket_rx) = socket.split();
    loop {
        tokio::select! {
            sentence = outbound.recv() => match sentence {
                Ok(text) => {
                    if socket_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Speech socket is lagging, sentences dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket_rx.next() => match incoming {
                Some(Ok(Message::Text(text))) => match &inbound {
                    Some(tx) => {
                        if tx.send(parse_utterance(text.as_str())).await.is_err() {
                            warn!("Listener is gone, dropping utterance");
                        }
                    }
                    None => warn!("Ignoring text received on output-only socket"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Error receiving from speech socket: {:?}", e);
                    break;
                }
            },
            _ = interrupted(&mut interrupt) => break,
        }
    }
    info!("Speech socket closed");
}
