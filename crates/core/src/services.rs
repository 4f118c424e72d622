//! Contracts of the services the session manager talks to.
//!
//! Each trait mirrors one request/reply endpoint. A call that reaches the
//! service and gets a negative answer is `Ok(false)`; `Err` is reserved for
//! calls that never produced a usable reply.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

/// Keypoint the perception service centres its gaze on while inviting.
pub const SHOULDER_CENTER: &str = "shoulderCenter";
/// Keypoint the perception service centres its gaze on during the walk.
pub const HIP_CENTER: &str = "hipCenter";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("No reply from service: {0}")]
    Transport(String),
    #[error("Malformed reply from service: {0}")]
    Protocol(String),
}

/// Position and axis-angle orientation of the finish line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinePose(pub [f64; 7]);

impl LinePose {
    /// Builds a pose from a reply, which must carry at least seven values.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let head: [f64; 7] = values.get(..7)?.try_into().ok()?;
        Some(Self(head))
    }

    pub fn values(&self) -> &[f64; 7] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakingStatus {
    Speaking,
    Quiet,
}

/// The motion-analysis service scoring the exercise.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn is_connected(&self) -> bool;
    async fn load_exercise(&self, tag: &str) -> Result<bool, ServiceError>;
    async fn list_metrics(&self) -> Result<Vec<String>, ServiceError>;
    async fn select_metric(&self, tag: &str) -> Result<bool, ServiceError>;
    async fn list_metric_props(&self) -> Result<Vec<String>, ServiceError>;
    async fn select_metric_prop(&self, tag: &str) -> Result<bool, ServiceError>;
    async fn select_skel(&self, tag: &str) -> Result<bool, ServiceError>;
    async fn set_line_pose(&self, pose: LinePose) -> Result<bool, ServiceError>;
    async fn start(&self, use_robot_template: bool) -> Result<bool, ServiceError>;
    async fn stop(&self) -> Result<bool, ServiceError>;
    async fn is_standing(&self, thresh: f64) -> Result<bool, ServiceError>;
    async fn is_sitting(&self, thresh: f64) -> Result<bool, ServiceError>;
    async fn has_crossed_finish_line(&self, thresh: f64) -> Result<bool, ServiceError>;
}

/// The perception service detecting and following people.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PerceptionService: Send + Sync {
    async fn is_connected(&self) -> bool;
    /// Tag of the person being followed, empty when nobody is.
    async fn is_following(&self) -> Result<String, ServiceError>;
    async fn get_line_pose(&self) -> Result<Option<LinePose>, ServiceError>;
    async fn look(&self, tag: &str, keypoint: &str) -> Result<bool, ServiceError>;
    async fn is_with_raised_hand(&self, tag: &str) -> Result<bool, ServiceError>;
    async fn stop(&self) -> Result<bool, ServiceError>;
    async fn set_auto(&self, enabled: bool) -> Result<bool, ServiceError>;
}

/// Fire-and-forget stream of sentences to be synthesised.
#[cfg_attr(test, automock)]
pub trait SpeechOutput: Send + Sync {
    fn peer_count(&self) -> usize;
    fn push(&self, text: &str);
}

/// Request/reply endpoint reporting whether the synthesiser is still talking.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechStatus: Send + Sync {
    async fn is_connected(&self) -> bool;
    async fn stat(&self) -> Result<SpeakingStatus, ServiceError>;
}
