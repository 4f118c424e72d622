//! Delivers resolved phrases to the speech stream and, on request, waits for
//! the synthesiser to fall quiet.

use crate::phrase::{PhraseBook, SpeechParam};
use crate::services::{SpeakingStatus, SpeechOutput, SpeechStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Shared shutdown flag. Blocking waits end as soon as it turns `true`.
pub type Interrupt = watch::Receiver<bool>;

/// Resolves once `interrupt` is raised or its sender is gone.
pub async fn interrupted(interrupt: &mut Interrupt) {
    let _ = interrupt.wait_for(|raised| *raised).await;
}

pub struct SpeechChannel {
    phrases: Arc<PhraseBook>,
    output: Arc<dyn SpeechOutput>,
    status: Arc<dyn SpeechStatus>,
    period: Duration,
    interrupt: Interrupt,
}

impl SpeechChannel {
    pub fn new(
        phrases: Arc<PhraseBook>,
        output: Arc<dyn SpeechOutput>,
        status: Arc<dyn SpeechStatus>,
        period: Duration,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            phrases,
            output,
            status,
            period,
            interrupt,
        }
    }

    pub fn phrases(&self) -> &Arc<PhraseBook> {
        &self.phrases
    }

    pub fn output_connected(&self) -> bool {
        self.output.peer_count() > 0
    }

    pub async fn status_connected(&self) -> bool {
        self.status.is_connected().await
    }

    /// Speaks the phrase stored under `key`.
    ///
    /// Returns whether `key` exists in the phrase book; a missing key still
    /// speaks the fallback phrase. With `wait` the call returns only once the
    /// synthesiser reports it is quiet, the status service goes away, or the
    /// interrupt is raised.
    pub async fn speak(&self, key: &str, wait: bool, params: &[SpeechParam]) -> bool {
        let (text, found) = self.phrases.render(key, params);
        if !found {
            warn!(key, "No phrase for key, speaking fallback");
        }
        info!(key, %text, wait, "Speaking");
        self.output.push(&text);

        if wait {
            self.wait_until_quiet().await;
        }
        found
    }

    async fn wait_until_quiet(&self) {
        let mut interrupt = self.interrupt.clone();
        while !*interrupt.borrow() && self.status.is_connected().await {
            tokio::select! {
                _ = tokio::time::sleep(self.period) => {}
                _ = interrupted(&mut interrupt) => break,
            }
            match self.status.stat().await {
                Ok(SpeakingStatus::Quiet) => break,
                Ok(SpeakingStatus::Speaking) => {}
                Err(e) => debug!(error = %e, "Speech status poll failed"),
            }
        }
    }
}
