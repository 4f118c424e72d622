//! Spoken-Answer Listener
//!
//! Turns recognised utterances into canned replies. The last reply is kept in
//! an [`AnswerSlot`] so the session can wait for the person to say something,
//! and every reply is forwarded to an outbound speech stream.

use crate::phrase::PhraseBook;
use crate::services::SpeechOutput;
use crate::speech::{Interrupt, interrupted};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// An utterance as delivered by the speech recogniser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub keyword: String,
    /// Whatever the recogniser attached to the keyword; not interpreted.
    #[serde(default)]
    pub payload: Option<Value>,
}

impl Utterance {
    /// Splits a plain-text utterance into its leading keyword and the rest.
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        match text.split_once(char::is_whitespace) {
            Some((keyword, rest)) => Self {
                keyword: keyword.to_string(),
                payload: Some(rest.trim()).filter(|p| !p.is_empty()).map(Value::from),
            },
            None => Self {
                keyword: text.to_string(),
                payload: None,
            },
        }
    }
}

/// What the person asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Speed,
    Aid,
    Repetition,
    Unclear,
    NotKnown,
    Feedback,
}

impl Intent {
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "speed" => Some(Intent::Speed),
            "aid" => Some(Intent::Aid),
            "repetition" => Some(Intent::Repetition),
            "unclear" => Some(Intent::Unclear),
            "not-known" => Some(Intent::NotKnown),
            "feedback" => Some(Intent::Feedback),
            _ => None,
        }
    }

    /// Phrase key answering this intent, given the seconds elapsed in the test.
    pub fn phrase_key(self, elapsed_secs: f64) -> Option<&'static str> {
        match self {
            Intent::Speed => Some("speed"),
            Intent::Aid => Some("aid"),
            Intent::Repetition => Some("repetition"),
            Intent::Unclear => Some("unclear"),
            Intent::NotKnown => Some("not-known"),
            Intent::Feedback if elapsed_secs <= 10.0 => Some("feedback-high"),
            Intent::Feedback if elapsed_secs <= 20.0 => Some("feedback-medium"),
            Intent::Feedback if elapsed_secs <= 30.0 => Some("feedback-low"),
            Intent::Feedback => None,
        }
    }
}

/// Single-slot handoff of the latest answer from the listener to the session.
#[derive(Debug)]
pub struct AnswerSlot {
    tx: watch::Sender<Option<String>>,
}

impl Default for AnswerSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerSlot {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn publish(&self, answer: String) {
        self.tx.send_replace(Some(answer));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Waits up to `timeout` for a non-empty answer and consumes it.
    pub async fn wait_for_answer(
        &self,
        timeout: Duration,
        interrupt: &mut Interrupt,
    ) -> Option<String> {
        let mut rx = self.tx.subscribe();
        let answer = tokio::select! {
            waited = tokio::time::timeout(
                timeout,
                rx.wait_for(|a| a.as_deref().is_some_and(|s| !s.is_empty())),
            ) => match waited {
                Ok(Ok(answer)) => answer.clone(),
                _ => None,
            },
            _ = interrupted(interrupt) => None,
        };
        if answer.is_some() {
            self.clear();
        }
        answer
    }
}

pub struct SpokenAnswerListener {
    phrases: Arc<PhraseBook>,
    output: Arc<dyn SpeechOutput>,
    answers: AnswerSlot,
    elapsed_bits: AtomicU64,
}

impl SpokenAnswerListener {
    pub fn new(phrases: Arc<PhraseBook>, output: Arc<dyn SpeechOutput>) -> Self {
        Self {
            phrases,
            output,
            answers: AnswerSlot::new(),
            elapsed_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn answers(&self) -> &AnswerSlot {
        &self.answers
    }

    /// Seconds elapsed in the test, used to pick the feedback band.
    pub fn set_time(&self, elapsed_secs: f64) {
        self.elapsed_bits
            .store(elapsed_secs.to_bits(), Ordering::Relaxed);
    }

    pub fn time(&self) -> f64 {
        f64::from_bits(self.elapsed_bits.load(Ordering::Relaxed))
    }

    /// Classifies one utterance, stores and forwards the reply.
    ///
    /// Unknown keywords and feedback requests past the last band produce an
    /// empty reply, which is still forwarded.
    pub fn handle(&self, utterance: &Utterance) -> String {
        let answer = Intent::parse(&utterance.keyword)
            .and_then(|intent| intent.phrase_key(self.time()))
            .and_then(|key| self.phrases.get(key))
            .unwrap_or_default()
            .to_string();
        info!(keyword = %utterance.keyword, %answer, "Interpreted spoken answer");
        self.answers.publish(answer.clone());
        self.output.push(&answer);
        answer
    }

    /// Handles utterances until the channel closes or the interrupt is raised.
    pub async fn run(&self, mut utterances: mpsc::Receiver<Utterance>, mut interrupt: Interrupt) {
        loop {
            tokio::select! {
                received = utterances.recv() => match received {
                    Some(utterance) => {
                        self.handle(&utterance);
                    }
                    None => break,
                },
                _ = interrupted(&mut interrupt) => break,
            }
        }
        debug!("Spoken-answer listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::tests::{RecordingOutput, phrase_book};
    use tokio::time::Instant;

    fn listener() -> (SpokenAnswerListener, Arc<RecordingOutput>) {
        let output = Arc::new(RecordingOutput::default());
        (SpokenAnswerListener::new(phrase_book(), output.clone()), output)
    }

    #[test]
    fn test_from_text_splits_keyword() {
        assert_eq!(
            Utterance::from_text("  feedback how did I do "),
            Utterance {
                keyword: "feedback".into(),
                payload: Some("how did I do".into())
            }
        );
        assert_eq!(
            Utterance::from_text("speed"),
            Utterance {
                keyword: "speed".into(),
                payload: None
            }
        );
    }

    #[test]
    fn test_feedback_bands() {
        let cases = [
            (0.0, Some("feedback-high")),
            (10.0, Some("feedback-high")),
            (10.5, Some("feedback-medium")),
            (20.0, Some("feedback-medium")),
            (29.9, Some("feedback-low")),
            (30.1, None),
        ];
        for (secs, key) in cases {
            assert_eq!(Intent::Feedback.phrase_key(secs), key, "at {secs}s");
        }
        assert_eq!(Intent::parse("not-known"), Some(Intent::NotKnown));
        assert_eq!(Intent::parse("hello"), None);
    }

    #[test]
    fn test_handle_stores_and_forwards() {
        let (listener, output) = listener();
        listener.set_time(14.2);

        let answer = listener.handle(&Utterance::from_text("feedback"));
        assert_eq!(answer, "Good");
        assert_eq!(listener.answers().current(), Some("Good".to_string()));

        // Known intent whose phrase is missing, then an unknown keyword.
        assert_eq!(listener.handle(&Utterance::from_text("aid")), "");
        assert_eq!(listener.handle(&Utterance::from_text("weather")), "");
        assert_eq!(listener.answers().current(), Some(String::new()));
        assert_eq!(output.spoken(), vec!["Good", "", ""]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_answer_consumes() {
        let (listener, _output) = listener();
        let (_tx, mut interrupt) = watch::channel(false);
        listener.handle(&Utterance::from_text("speed"));

        let answer = listener
            .answers()
            .wait_for_answer(Duration::from_secs(10), &mut interrupt)
            .await;
        assert_eq!(answer.as_deref(), Some("Walk at your usual pace"));
        assert_eq!(listener.answers().current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_answer_times_out_on_empty_replies() {
        let (listener, _output) = listener();
        let (_tx, mut interrupt) = watch::channel(false);
        listener.handle(&Utterance::from_text("mumble"));

        let started = Instant::now();
        let answer = listener
            .answers()
            .wait_for_answer(Duration::from_secs(10), &mut interrupt)
            .await;
        assert_eq!(answer, None);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_feeds_slot_until_channel_closes() {
        let (listener, output) = listener();
        let listener = Arc::new(listener);
        let (tx, rx) = mpsc::channel(4);
        let (_stop, interrupt) = watch::channel(false);

        let task = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.run(rx, interrupt).await })
        };
        tx.send(Utterance::from_text("speed")).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(output.spoken(), vec!["Walk at your usual pace"]);
        assert_eq!(
            listener.answers().current().as_deref(),
            Some("Walk at your usual pace")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_interrupt() {
        let (listener, _output) = listener();
        let (_tx, rx) = mpsc::channel(1);
        let (stop, interrupt) = watch::channel(false);
        stop.send(true).unwrap();
        listener.run(rx, interrupt).await;
    }
}
