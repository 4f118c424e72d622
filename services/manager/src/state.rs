//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the session
//! manager and the channels shared by the control and speech endpoints.

use crate::{config::Config, ws::SpeechHub};
use std::sync::Arc;
use tokio::sync::mpsc;
use tug_core::{Interrupt, SessionManager, Utterance};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    /// Outbound stream of phrases for the speech synthesiser.
    pub speech_hub: SpeechHub,
    /// Outbound stream of canned replies from the listener.
    pub interp_hub: SpeechHub,
    /// Inbound utterances for the listener.
    pub utterances: mpsc::Sender<Utterance>,
    pub interrupt: Interrupt,
    pub config: Arc<Config>,
}
