//! Control API Models
//!
//! Response bodies of the control endpoints, described for OpenAPI with
//! `utoipa`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tug_core::{AssessmentResult, CommandOutcome, SessionSnapshot};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct CommandResponse {
    pub ok: bool,
    #[schema(example = "idle")]
    pub state: String,
}

impl From<CommandOutcome> for CommandResponse {
    fn from(outcome: CommandOutcome) -> Self {
        Self {
            ok: outcome.ok,
            state: outcome.state.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct LastResult {
    #[schema(value_type = String, format = Uuid)]
    pub attempt_id: Uuid,
    #[schema(example = 12.3)]
    pub elapsed_secs: Option<f64>,
    pub passed: bool,
    pub finished_at: DateTime<Utc>,
}

impl From<AssessmentResult> for LastResult {
    fn from(result: AssessmentResult) -> Self {
        Self {
            attempt_id: result.attempt_id,
            elapsed_secs: result.elapsed_secs,
            passed: result.passed,
            finished_at: result.finished_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct StatusResponse {
    #[schema(example = "assess-crossing")]
    pub state: String,
    #[schema(value_type = String, format = Uuid)]
    pub attempt_id: Uuid,
    pub followed_tag: Option<String>,
    pub phase_elapsed_secs: f64,
    pub encourage_count: u32,
    pub last_result: Option<LastResult>,
}

impl From<SessionSnapshot> for StatusResponse {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            state: snapshot.state.to_string(),
            attempt_id: snapshot.attempt_id,
            followed_tag: snapshot.followed_tag,
            phase_elapsed_secs: snapshot.phase_elapsed_secs,
            encourage_count: snapshot.encourage_count,
            last_result: snapshot.last_result.map(LastResult::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tug_core::SessionState;

    #[test]
    fn test_status_from_snapshot() {
        let attempt_id = Uuid::new_v4();
        let now = Utc::now();
        let snapshot = SessionSnapshot {
            state: SessionState::LineCrossed,
            attempt_id,
            followed_tag: Some("maria".to_string()),
            phase_elapsed_secs: 2.5,
            encourage_count: 1,
            last_result: Some(AssessmentResult {
                attempt_id,
                elapsed_secs: Some(11.2),
                passed: true,
                finished_at: now,
            }),
        };

        let status = StatusResponse::from(snapshot);
        assert_eq!(status.state, "line-crossed");
        assert_eq!(status.followed_tag.as_deref(), Some("maria"));

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"state\":\"line-crossed\""));
        assert!(json.contains("\"elapsed_secs\":11.2"));
        let back: StatusResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn test_command_response_carries_outcome() {
        let response = CommandResponse::from(CommandOutcome {
            ok: false,
            state: SessionState::Stopped,
        });
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"ok": false, "state": "stopped"})
        );
    }

    #[test]
    fn test_failed_result_has_null_time() {
        let result = LastResult::from(AssessmentResult {
            attempt_id: Uuid::nil(),
            elapsed_secs: None,
            passed: false,
            finished_at: Utc::now(),
        });
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["elapsed_secs"].is_null());
        assert_eq!(json["passed"], false);
    }
}
