//! Per-attempt mutable data owned by the session manager.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Outcome of the most recently completed attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentResult {
    pub attempt_id: Uuid,
    /// Seconds from the start signal until the person sat down again.
    /// `None` when the attempt was not passed.
    pub elapsed_secs: Option<f64>,
    pub passed: bool,
    pub finished_at: DateTime<Utc>,
}

/// Timers, counters and identity for the attempt in progress.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub attempt_id: Uuid,
    pub followed_tag: Option<String>,
    pub session_start: Instant,
    pub phase_start: Instant,
    pub encourage_count: u32,
    /// Total time of the attempt, recorded when the person sits back down.
    pub elapsed_total: Option<Duration>,
    /// Survives resets so the latest outcome stays observable.
    pub last_result: Option<AssessmentResult>,
}

impl SessionContext {
    pub fn new(now: Instant) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            followed_tag: None,
            session_start: now,
            phase_start: now,
            encourage_count: 0,
            elapsed_total: None,
            last_result: None,
        }
    }

    /// Prepares the context for a fresh attempt, keeping only the last result.
    pub fn reset(&mut self, now: Instant) {
        let last_result = self.last_result.take();
        *self = Self::new(now);
        self.last_result = last_result;
    }

    pub fn phase_elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.phase_start)
    }

    pub fn session_elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.session_start)
    }

    /// Starts a new timeout window for the current phase.
    pub fn restart_phase(&mut self, now: Instant) {
        self.phase_start = now;
    }

    /// Enters a new phase: fresh timer and no escalation issued yet.
    pub fn enter_phase(&mut self, now: Instant) {
        self.phase_start = now;
        self.encourage_count = 0;
    }

    pub fn followed_tag(&self) -> &str {
        self.followed_tag.as_deref().unwrap_or("")
    }

    pub fn record_result(&mut self, passed: bool) {
        self.last_result = Some(AssessmentResult {
            attempt_id: self.attempt_id,
            elapsed_secs: if passed {
                self.elapsed_total.map(|d| d.as_secs_f64())
            } else {
                None
            },
            passed,
            finished_at: Utc::now(),
        });
    }
}
