//! Session State Machine
//!
//! The [`SessionManager`] supervises one assessment at a time. A periodic
//! [`SessionManager::tick`] polls the perception and analysis services,
//! evaluates the handler of the current state and applies the transition it
//! returns. `start` and `stop` arrive from the control surface and share the
//! same lock as the tick, so none of them ever interleave.

use crate::context::{AssessmentResult, SessionContext};
use crate::listener::SpokenAnswerListener;
use crate::phrase::SpeechParam;
use crate::services::{AnalysisService, HIP_CENTER, PerceptionService, SHOULDER_CENTER, ServiceError};
use crate::speech::{Interrupt, SpeechChannel};
use crate::state::SessionState;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Escalation prompts allowed per phase before the attempt fails.
const MAX_ENCOURAGEMENTS: u32 = 1;

/// Tunables of the assessment.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub period: Duration,
    pub finish_line_thresh: f64,
    pub standing_thresh: f64,
    pub exercise: String,
    pub preferred_metric: String,
    pub preferred_prop: String,
    pub idle_timeout: Duration,
    pub standing_timeout: Duration,
    pub walking_timeout: Duration,
    pub answer_timeout: Duration,
    /// Keep evaluating within the same tick while the state moves forward.
    pub fallthrough: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(100),
            finish_line_thresh: 0.2,
            standing_thresh: 0.3,
            exercise: "tug".to_string(),
            preferred_metric: "step_0".to_string(),
            preferred_prop: "step_length".to_string(),
            idle_timeout: Duration::from_secs(10),
            standing_timeout: Duration::from_secs(10),
            walking_timeout: Duration::from_secs(30),
            answer_timeout: Duration::from_secs(10),
            fallthrough: true,
        }
    }
}

/// Read-only view of the session, as reported on the control surface.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub attempt_id: Uuid,
    pub followed_tag: Option<String>,
    pub phase_elapsed_secs: f64,
    pub encourage_count: u32,
    pub last_result: Option<AssessmentResult>,
}

/// Result of a control command: whether perception acknowledged it and the
/// state the command left the session in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub ok: bool,
    pub state: SessionState,
}

struct Session {
    state: SessionState,
    ctx: SessionContext,
}

pub struct SessionManager {
    settings: SessionSettings,
    analysis: Arc<dyn AnalysisService>,
    perception: Arc<dyn PerceptionService>,
    speech: SpeechChannel,
    listener: Arc<SpokenAnswerListener>,
    interrupt: Interrupt,
    session: Mutex<Session>,
}

/// Logs the outcome of a call expecting an acknowledgement.
fn acked(step: &str, reply: Result<bool, ServiceError>) -> bool {
    match reply {
        Ok(true) => true,
        Ok(false) => {
            warn!(step, "Service refused request");
            false
        }
        Err(e) => {
            warn!(step, error = %e, "Service call failed");
            false
        }
    }
}

/// Picks `preferred` when listed, otherwise the first entry.
fn pick(step: &str, listed: Result<Vec<String>, ServiceError>, preferred: &str) -> Option<String> {
    let items = match listed {
        Ok(items) => items,
        Err(e) => {
            warn!(step, error = %e, "Service call failed");
            return None;
        }
    };
    if items.iter().any(|item| item == preferred) {
        return Some(preferred.to_string());
    }
    let first = items.into_iter().next();
    if first.is_none() {
        warn!(step, "Service returned an empty list");
    }
    first
}

/// Name used in the invitation; anonymous tracks start with `#`.
fn invitation_name(tag: &str) -> &str {
    if tag.starts_with('#') { "" } else { tag }
}

impl SessionManager {
    pub fn new(
        settings: SessionSettings,
        analysis: Arc<dyn AnalysisService>,
        perception: Arc<dyn PerceptionService>,
        speech: SpeechChannel,
        listener: Arc<SpokenAnswerListener>,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            settings,
            analysis,
            perception,
            speech,
            listener,
            interrupt,
            session: Mutex::new(Session {
                state: SessionState::Idle,
                ctx: SessionContext::new(Instant::now()),
            }),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.lock().await;
        SessionSnapshot {
            state: session.state,
            attempt_id: session.ctx.attempt_id,
            followed_tag: session.ctx.followed_tag.clone(),
            phase_elapsed_secs: session.ctx.phase_elapsed(Instant::now()).as_secs_f64(),
            encourage_count: session.ctx.encourage_count,
            last_result: session.ctx.last_result.clone(),
        }
    }

    /// Re-arms the session in `Idle`.
    ///
    /// When perception refuses to drop its target and resume auto-detection
    /// the state is left as it was and `ok` is `false`.
    pub async fn start(&self) -> CommandOutcome {
        let mut session = self.session.lock().await;
        if !self.release_perception().await {
            warn!(state = %session.state, "Unable to re-arm session");
            return CommandOutcome {
                ok: false,
                state: session.state,
            };
        }
        self.reset(&mut session);
        session.state = SessionState::Idle;
        info!(attempt_id = %session.ctx.attempt_id, "Session re-armed");
        CommandOutcome {
            ok: true,
            state: session.state,
        }
    }

    /// Stops the session. The state becomes `Stopped` even if perception
    /// does not acknowledge.
    pub async fn stop(&self) -> CommandOutcome {
        let mut session = self.session.lock().await;
        let ok = acked("stop", self.perception.stop().await);
        self.reset(&mut session);
        session.state = SessionState::Stopped;
        info!(acknowledged = ok, "Session stopped");
        CommandOutcome {
            ok,
            state: session.state,
        }
    }

    async fn all_connected(&self) -> bool {
        self.analysis.is_connected().await
            && self.speech.output_connected()
            && self.speech.status_connected().await
            && self.perception.is_connected().await
    }

    /// Runs one evaluation of the state machine. Never fails: service
    /// trouble only shows up in the state and in the logs.
    pub async fn tick(&self) {
        let mut guard = self.session.lock().await;
        if !self.all_connected().await {
            debug!("Not connected");
            return;
        }
        let session = &mut *guard;
        let span = info_span!("tick", attempt_id = %session.ctx.attempt_id, state = %session.state);
        self.step(session).instrument(span).await;
    }

    async fn step(&self, session: &mut Session) {
        let follow_tag = match self.perception.is_following().await {
            Ok(tag) => tag,
            Err(e) => {
                debug!(error = %e, "Unable to query followed person");
                String::new()
            }
        };

        if session.state.is_tracking() && follow_tag != session.ctx.followed_tag() {
            info!(
                expected = session.ctx.followed_tag(),
                reported = %follow_tag,
                "Followed person changed, disengaging"
            );
            acked("stop", self.analysis.stop().await);
            self.speech.speak("disengaged", true, &[]).await;
            self.disengage(session).await;
            session.state = SessionState::Idle;
            return;
        }

        self.listener
            .set_time(session.ctx.session_elapsed(Instant::now()).as_secs_f64());

        let mut current = session.state;
        while let Some(next) = self.dispatch(current, session, &follow_tag).await {
            info!(from = %current, to = %next, "Session transition");
            session.state = next;
            if !self.settings.fallthrough || next <= current {
                break;
            }
            current = next;
        }
    }

    async fn dispatch(
        &self,
        state: SessionState,
        session: &mut Session,
        follow_tag: &str,
    ) -> Option<SessionState> {
        match state {
            SessionState::Stopped => None,
            SessionState::Idle => self.on_idle(session),
            SessionState::SeekLine => self.on_seek_line().await,
            SessionState::SeekSkeleton => self.on_seek_skeleton(session, follow_tag).await,
            SessionState::Follow => self.on_follow(session).await,
            SessionState::Engaged => self.on_engaged(session).await,
            SessionState::AssessStanding => self.on_assess_standing(session).await,
            SessionState::AssessCrossing => self.on_assess_crossing(session).await,
            SessionState::LineCrossed => self.on_line_crossed(session).await,
            SessionState::Finished => self.on_finished(session).await,
            SessionState::NotPassed => self.on_not_passed(session).await,
        }
    }

    fn on_idle(&self, session: &mut Session) -> Option<SessionState> {
        (session.ctx.phase_elapsed(Instant::now()) > self.settings.idle_timeout)
            .then_some(SessionState::SeekLine)
    }

    async fn on_seek_line(&self) -> Option<SessionState> {
        let pose = match self.perception.get_line_pose().await {
            Ok(Some(pose)) => pose,
            Ok(None) => {
                debug!("Finish line not found yet");
                return None;
            }
            Err(e) => {
                debug!(error = %e, "Unable to query finish line");
                return None;
            }
        };
        info!(pose = ?pose.values(), "Found finish line");
        acked("setLinePose", self.analysis.set_line_pose(pose).await)
            .then_some(SessionState::SeekSkeleton)
    }

    async fn on_seek_skeleton(
        &self,
        session: &mut Session,
        follow_tag: &str,
    ) -> Option<SessionState> {
        if follow_tag.is_empty() {
            return None;
        }
        session.ctx.followed_tag = Some(follow_tag.to_string());
        if !acked("look", self.perception.look(follow_tag, SHOULDER_CENTER).await) {
            return None;
        }
        info!(tag = follow_tag, "Following");
        let name = SpeechParam::from(invitation_name(follow_tag));
        self.speech.speak("invite-start", true, &[name]).await;
        self.speech.speak("engage", true, &[]).await;
        session.ctx.encourage_count = 0;
        Some(SessionState::Follow)
    }

    async fn on_follow(&self, session: &mut Session) -> Option<SessionState> {
        let tag = session.ctx.followed_tag();
        match self.perception.is_with_raised_hand(tag).await {
            Ok(true) => {
                self.speech.speak("accepted", true, &[]).await;
                Some(SessionState::Engaged)
            }
            Ok(false) => None,
            Err(e) => {
                debug!(error = %e, "Unable to query raised hand");
                None
            }
        }
    }

    /// Negotiates the exercise with the analysis service and starts it.
    /// Any refusal leaves the state untouched so the next tick starts over.
    async fn on_engaged(&self, session: &mut Session) -> Option<SessionState> {
        let settings = &self.settings;
        let tag = session.ctx.followed_tag().to_string();

        if !acked("loadExercise", self.analysis.load_exercise(&settings.exercise).await) {
            return None;
        }
        let metric = pick(
            "listMetrics",
            self.analysis.list_metrics().await,
            &settings.preferred_metric,
        )?;
        info!(%metric, "Selected metric");
        if !acked("selectMetric", self.analysis.select_metric(&metric).await) {
            return None;
        }
        let prop = pick(
            "listMetricProps",
            self.analysis.list_metric_props().await,
            &settings.preferred_prop,
        )?;
        info!(%prop, "Selected metric property");
        if !acked("selectMetricProp", self.analysis.select_metric_prop(&prop).await) {
            return None;
        }
        info!(%tag, "Selecting skeleton");
        if !acked("selectSkel", self.analysis.select_skel(&tag).await) {
            return None;
        }

        self.speech.speak("sit", true, &[]).await;
        if !acked("look", self.perception.look(&tag, HIP_CENTER).await) {
            return None;
        }
        self.speech.speak("explain", true, &[]).await;
        self.speech.speak("questions", true, &[]).await;
        let mut interrupt = self.interrupt.clone();
        match self
            .listener
            .answers()
            .wait_for_answer(settings.answer_timeout, &mut interrupt)
            .await
        {
            Some(answer) => info!(%answer, "Answered question"),
            None => info!("No spoken answer, going on"),
        }
        self.speech.speak("start", true, &[]).await;

        if !acked("start", self.analysis.start(true).await) {
            return None;
        }
        let now = Instant::now();
        session.ctx.session_start = now;
        session.ctx.enter_phase(now);
        Some(SessionState::AssessStanding)
    }

    async fn on_assess_standing(&self, session: &mut Session) -> Option<SessionState> {
        match self
            .analysis
            .is_standing(self.settings.standing_thresh)
            .await
        {
            Ok(true) => {
                info!("Person standing");
                session.ctx.enter_phase(Instant::now());
                Some(SessionState::AssessCrossing)
            }
            Ok(false) => self.escalate(session, self.settings.standing_timeout).await,
            Err(e) => {
                debug!(error = %e, "Unable to query standing");
                None
            }
        }
    }

    async fn on_assess_crossing(&self, session: &mut Session) -> Option<SessionState> {
        let crossed = self
            .analysis
            .has_crossed_finish_line(self.settings.finish_line_thresh)
            .await;
        match crossed {
            Ok(true) => {
                info!("Line crossed");
                session.ctx.enter_phase(Instant::now());
                return Some(SessionState::LineCrossed);
            }
            Ok(false) => {}
            Err(e) => {
                debug!(error = %e, "Unable to query finish line crossing");
                return None;
            }
        }
        match self.analysis.is_sitting(self.settings.standing_thresh).await {
            Ok(true) => {
                info!("Test finished but line not crossed");
                self.speech.speak("not-crossed", true, &[]).await;
                Some(SessionState::NotPassed)
            }
            Ok(false) => self.escalate(session, self.settings.walking_timeout).await,
            Err(e) => {
                debug!(error = %e, "Unable to query sitting");
                None
            }
        }
    }

    async fn on_line_crossed(&self, session: &mut Session) -> Option<SessionState> {
        match self.analysis.is_sitting(self.settings.standing_thresh).await {
            Ok(true) => {
                let elapsed = session.ctx.session_elapsed(Instant::now());
                info!(elapsed_secs = elapsed.as_secs_f64(), "Test finished");
                session.ctx.elapsed_total = Some(elapsed);
                Some(SessionState::Finished)
            }
            Ok(false) => self.escalate(session, self.settings.walking_timeout).await,
            Err(e) => {
                debug!(error = %e, "Unable to query sitting");
                None
            }
        }
    }

    async fn on_finished(&self, session: &mut Session) -> Option<SessionState> {
        let secs = session
            .ctx
            .elapsed_total
            .map(|d| (d.as_secs_f64() * 10.0).round() / 10.0)
            .unwrap_or_default();
        acked("stop", self.analysis.stop().await);
        self.speech
            .speak("assess-high", true, &[SpeechParam::from(secs)])
            .await;
        self.speech.speak("greetings", true, &[]).await;
        session.ctx.record_result(true);
        self.disengage(session).await;
        Some(SessionState::Idle)
    }

    async fn on_not_passed(&self, session: &mut Session) -> Option<SessionState> {
        acked("stop", self.analysis.stop().await);
        self.speech.speak("end", true, &[]).await;
        self.speech.speak("assess-low", true, &[]).await;
        self.speech.speak("greetings", true, &[]).await;
        session.ctx.record_result(false);
        self.disengage(session).await;
        Some(SessionState::Idle)
    }

    /// Encourages once when the phase times out, fails the attempt the
    /// second time.
    async fn escalate(&self, session: &mut Session, timeout: Duration) -> Option<SessionState> {
        if session.ctx.phase_elapsed(Instant::now()) <= timeout {
            return None;
        }
        if session.ctx.encourage_count >= MAX_ENCOURAGEMENTS {
            info!(encouraged = session.ctx.encourage_count, "Phase timed out, attempt failed");
            return Some(SessionState::NotPassed);
        }
        session.ctx.encourage_count += 1;
        info!("Phase timed out, encouraging");
        self.speech.speak("encourage", false, &[]).await;
        session.ctx.restart_phase(Instant::now());
        None
    }

    /// Asks perception to drop its target and go back to auto-detection.
    async fn release_perception(&self) -> bool {
        acked("stop", self.perception.stop().await)
            && acked("set_auto", self.perception.set_auto(true).await)
    }

    fn reset(&self, session: &mut Session) {
        session.ctx.reset(Instant::now());
        self.listener.answers().clear();
    }

    /// Common way back to `Idle` for re-arming and for abandonment. The
    /// caller sets the state.
    async fn disengage(&self, session: &mut Session) {
        if !self.release_perception().await {
            warn!("Perception did not resume auto-detection");
        }
        self.reset(session);
    }
}
