//! Core of the Timed-Up-and-Go session supervisor.
//!
//! Everything here is independent of the transport used to reach the
//! perception, analysis and speech services; those are reached through the
//! traits in [`services`].

pub mod context;
pub mod listener;
pub mod phrase;
pub mod services;
pub mod session;
pub mod speech;
pub mod state;

pub use context::{AssessmentResult, SessionContext};
pub use listener::{AnswerSlot, Intent, SpokenAnswerListener, Utterance};
pub use phrase::{PhraseBook, PhraseError, SpeechParam};
pub use services::{LinePose, ServiceError, SpeakingStatus};
pub use session::{CommandOutcome, SessionManager, SessionSettings, SessionSnapshot};
pub use speech::{Interrupt, SpeechChannel};
pub use state::SessionState;
