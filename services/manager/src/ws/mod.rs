//! WebSocket endpoints for the speech streams.
//!
//! - `hub`: broadcast fan-out used as the outbound speech stream.
//! - `session`: connection handlers for the speech and speech-interp sockets.

pub mod hub;
pub mod session;

pub use hub::SpeechHub;
pub use session::{speech_interp_ws_handler, speech_ws_handler};
