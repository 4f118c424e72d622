//! In-process stand-ins for the remote services, used by the router and
//! runtime tests.

use crate::config::Config;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::Level;
use tug_core::services::{AnalysisService, PerceptionService, SpeechStatus};
use tug_core::{LinePose, ServiceError, SpeakingStatus};

pub fn test_config() -> Config {
    Config {
        name: "managerTUG".to_string(),
        bind_address: "127.0.0.1:0".parse().unwrap(),
        period: Duration::from_millis(100),
        phrases_path: PathBuf::from("./phrases/speak-en.json"),
        finish_line_thresh: 0.2,
        standing_thresh: 0.3,
        analyzer_url: "http://127.0.0.1:1".to_string(),
        attention_url: "http://127.0.0.1:1".to_string(),
        speech_status_url: "http://127.0.0.1:1".to_string(),
        rpc_timeout: Duration::from_millis(100),
        log_level: Level::INFO,
    }
}

/// Connected analysis service that accepts everything and never sees anybody.
pub struct FakeAnalysis;

#[async_trait]
impl AnalysisService for FakeAnalysis {
    async fn is_connected(&self) -> bool {
        true
    }
    async fn load_exercise(&self, _tag: &str) -> Result<bool, ServiceError> {
        Ok(true)
    }
    async fn list_metrics(&self) -> Result<Vec<String>, ServiceError> {
        Ok(vec!["step_0".to_string()])
    }
    async fn select_metric(&self, _tag: &str) -> Result<bool, ServiceError> {
        Ok(true)
    }
    async fn list_metric_props(&self) -> Result<Vec<String>, ServiceError> {
        Ok(vec!["step_length".to_string()])
    }
    async fn select_metric_prop(&self, _tag: &str) -> Result<bool, ServiceError> {
        Ok(true)
    }
    async fn select_skel(&self, _tag: &str) -> Result<bool, ServiceError> {
        Ok(true)
    }
    async fn set_line_pose(&self, _pose: LinePose) -> Result<bool, ServiceError> {
        Ok(true)
    }
    async fn start(&self, _use_robot_template: bool) -> Result<bool, ServiceError> {
        Ok(true)
    }
    async fn stop(&self) -> Result<bool, ServiceError> {
        Ok(true)
    }
    async fn is_standing(&self, _thresh: f64) -> Result<bool, ServiceError> {
        Ok(false)
    }
    async fn is_sitting(&self, _thresh: f64) -> Result<bool, ServiceError> {
        Ok(false)
    }
    async fn has_crossed_finish_line(&self, _thresh: f64) -> Result<bool, ServiceError> {
        Ok(false)
    }
}

/// Perception service following nobody. `acks` decides the reply to
/// `stop` and `set_auto`; `is_following` calls are counted.
pub struct FakePerception {
    acks: bool,
    following_calls: AtomicUsize,
}

impl FakePerception {
    pub fn new(acks: bool) -> Self {
        Self {
            acks,
            following_calls: AtomicUsize::new(0),
        }
    }

    pub fn following_calls(&self) -> usize {
        self.following_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PerceptionService for FakePerception {
    async fn is_connected(&self) -> bool {
        true
    }
    async fn is_following(&self) -> Result<String, ServiceError> {
        self.following_calls.fetch_add(1, Ordering::SeqCst);
        Ok(String::new())
    }
    async fn get_line_pose(&self) -> Result<Option<LinePose>, ServiceError> {
        Ok(None)
    }
    async fn look(&self, _tag: &str, _keypoint: &str) -> Result<bool, ServiceError> {
        Ok(true)
    }
    async fn is_with_raised_hand(&self, _tag: &str) -> Result<bool, ServiceError> {
        Ok(false)
    }
    async fn stop(&self) -> Result<bool, ServiceError> {
        Ok(self.acks)
    }
    async fn set_auto(&self, _enabled: bool) -> Result<bool, ServiceError> {
        Ok(self.acks)
    }
}

pub struct FakeSpeechStatus;

#[async_trait]
impl SpeechStatus for FakeSpeechStatus {
    async fn is_connected(&self) -> bool {
        true
    }
    async fn stat(&self) -> Result<SpeakingStatus, ServiceError> {
        Ok(SpeakingStatus::Quiet)
    }
}
