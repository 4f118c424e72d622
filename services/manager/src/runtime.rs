//! Periodic driver of the session state machine.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::info;
use tug_core::SessionManager;
use tug_core::speech::{Interrupt, interrupted};

/// Ticks `manager` every `period` until `interrupt` is raised.
///
/// A tick that overruns its period delays the next one instead of bursting
/// to catch up.
pub async fn run_ticks(manager: Arc<SessionManager>, period: Duration, mut interrupt: Interrupt) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_ms = period.as_millis() as u64, "Tick loop started");

    loop {
        tokio::select! {
            _ = ticker.tick() => manager.tick().await,
            _ = interrupted(&mut interrupt) => break,
        }
    }
    info!("Tick loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAnalysis, FakePerception, FakeSpeechStatus};
    use crate::ws::SpeechHub;
    use tokio::sync::watch;
    use tug_core::{PhraseBook, SessionSettings, SpeechChannel, SpokenAnswerListener};

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_interrupted() {
        let (interrupt_tx, interrupt) = watch::channel(false);
        let phrases = Arc::new(PhraseBook::default());
        let hub = SpeechHub::new("speech", 8);
        // One subscriber so the speech stream counts as connected.
        let _peer = hub.subscribe();
        let perception = Arc::new(FakePerception::new(true));
        let speech = SpeechChannel::new(
            phrases.clone(),
            Arc::new(hub.clone()),
            Arc::new(FakeSpeechStatus),
            Duration::from_millis(100),
            interrupt.clone(),
        );
        let listener = Arc::new(SpokenAnswerListener::new(phrases, Arc::new(hub)));
        let manager = Arc::new(SessionManager::new(
            SessionSettings::default(),
            Arc::new(FakeAnalysis),
            perception.clone(),
            speech,
            listener,
            interrupt.clone(),
        ));

        let task = tokio::spawn(run_ticks(manager, Duration::from_millis(100), interrupt));
        tokio::time::sleep(Duration::from_millis(550)).await;
        interrupt_tx.send(true).unwrap();
        task.await.unwrap();

        let ticks = perception.following_calls();
        assert!(ticks >= 5, "expected at least 5 ticks, saw {ticks}");

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(perception.following_calls(), ticks);
    }
}
