//! HTTP clients for the analysis, perception and speech-status services.

use crate::protocol::{RpcReply, RpcRequest};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use tug_core::services::{AnalysisService, PerceptionService, SpeechStatus};
use tug_core::{LinePose, ServiceError, SpeakingStatus};

/// One request/reply peer reached over `POST {base}/rpc`.
///
/// Peer presence follows the last exchange: a reply marks the peer as
/// connected, a transport failure as gone. While gone, `GET {base}/health`
/// is probed before reporting it absent.
pub struct RpcClient {
    name: &'static str,
    base_url: String,
    http: reqwest::Client,
    connected: AtomicBool,
}

impl RpcClient {
    pub fn new(name: &'static str, base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            connected: AtomicBool::new(false),
        })
    }

    fn mark(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::Relaxed);
        if was != connected {
            info!(service = self.name, connected, "Peer presence changed");
        }
    }

    pub async fn is_connected(&self) -> bool {
        if self.connected.load(Ordering::Relaxed) {
            return true;
        }
        let url = format!("{}/health", self.base_url);
        let up = matches!(
            self.http.get(&url).send().await,
            Ok(response) if response.status().is_success()
        );
        if up {
            self.mark(true);
        }
        up
    }

    pub async fn call(&self, cmd: &str, args: Vec<Value>) -> Result<RpcReply, ServiceError> {
        let url = format!("{}/rpc", self.base_url);
        let request = RpcRequest::new(cmd, args);
        debug!(service = self.name, cmd, "RPC request");

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                self.mark(false);
                ServiceError::Transport(format!("{} {}: {}", self.name, cmd, e))
            })?;
        self.mark(true);

        response
            .json::<RpcReply>()
            .await
            .map_err(|e| ServiceError::Protocol(format!("{} {}: {}", self.name, cmd, e)))
    }

    async fn ack(&self, cmd: &str, args: Vec<Value>) -> Result<bool, ServiceError> {
        self.call(cmd, args).await?.ack()
    }

    async fn list(&self, cmd: &str) -> Result<Vec<String>, ServiceError> {
        self.call(cmd, vec![]).await?.list()
    }
}

pub struct AnalysisClient(RpcClient);

impl AnalysisClient {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        RpcClient::new("analyzer", base_url, timeout).map(Self)
    }
}

#[async_trait]
impl AnalysisService for AnalysisClient {
    async fn is_connected(&self) -> bool {
        self.0.is_connected().await
    }

    async fn load_exercise(&self, tag: &str) -> Result<bool, ServiceError> {
        self.0.ack("loadExercise", vec![json!(tag)]).await
    }

    async fn list_metrics(&self) -> Result<Vec<String>, ServiceError> {
        self.0.list("listMetrics").await
    }

    async fn select_metric(&self, tag: &str) -> Result<bool, ServiceError> {
        self.0.ack("selectMetric", vec![json!(tag)]).await
    }

    async fn list_metric_props(&self) -> Result<Vec<String>, ServiceError> {
        self.0.list("listMetricProps").await
    }

    async fn select_metric_prop(&self, tag: &str) -> Result<bool, ServiceError> {
        self.0.ack("selectMetricProp", vec![json!(tag)]).await
    }

    async fn select_skel(&self, tag: &str) -> Result<bool, ServiceError> {
        self.0.ack("selectSkel", vec![json!(tag)]).await
    }

    async fn set_line_pose(&self, pose: LinePose) -> Result<bool, ServiceError> {
        self.0.ack("setLinePose", vec![json!(pose.values())]).await
    }

    async fn start(&self, use_robot_template: bool) -> Result<bool, ServiceError> {
        self.0.ack("start", vec![json!(use_robot_template)]).await
    }

    async fn stop(&self) -> Result<bool, ServiceError> {
        self.0.ack("stop", vec![]).await
    }

    async fn is_standing(&self, thresh: f64) -> Result<bool, ServiceError> {
        self.0.ack("isStanding", vec![json!(thresh)]).await
    }

    async fn is_sitting(&self, thresh: f64) -> Result<bool, ServiceError> {
        self.0.ack("isSitting", vec![json!(thresh)]).await
    }

    async fn has_crossed_finish_line(&self, thresh: f64) -> Result<bool, ServiceError> {
        self.0.ack("hasCrossedFinishLine", vec![json!(thresh)]).await
    }
}

pub struct PerceptionClient(RpcClient);

impl PerceptionClient {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        RpcClient::new("attention", base_url, timeout).map(Self)
    }
}

#[async_trait]
impl PerceptionService for PerceptionClient {
    async fn is_connected(&self) -> bool {
        self.0.is_connected().await
    }

    async fn is_following(&self) -> Result<String, ServiceError> {
        self.0.call("is_following", vec![]).await?.text()
    }

    async fn get_line_pose(&self) -> Result<Option<LinePose>, ServiceError> {
        Ok(self.0.call("get_line_pose", vec![]).await?.pose())
    }

    async fn look(&self, tag: &str, keypoint: &str) -> Result<bool, ServiceError> {
        self.0.ack("look", vec![json!(tag), json!(keypoint)]).await
    }

    async fn is_with_raised_hand(&self, tag: &str) -> Result<bool, ServiceError> {
        self.0.ack("is_with_raised_hand", vec![json!(tag)]).await
    }

    async fn stop(&self) -> Result<bool, ServiceError> {
        self.0.ack("stop", vec![]).await
    }

    async fn set_auto(&self, enabled: bool) -> Result<bool, ServiceError> {
        self.0.ack("set_auto", vec![json!(i32::from(enabled))]).await
    }
}

pub struct SpeechStatusClient(RpcClient);

impl SpeechStatusClient {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        RpcClient::new("speech", base_url, timeout).map(Self)
    }
}

#[async_trait]
impl SpeechStatus for SpeechStatusClient {
    async fn is_connected(&self) -> bool {
        self.0.is_connected().await
    }

    async fn stat(&self) -> Result<SpeakingStatus, ServiceError> {
        self.0.call("stat", vec![]).await?.speaking_status()
    }
}
