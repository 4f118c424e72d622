//! Wire format of the request/reply services and the speech WebSockets.
//!
//! Requests name a command and carry positional arguments; replies carry a
//! positional list whose first element is the answer. Acknowledgements are
//! either the `"ok"`/`"fail"` vocabs or plain booleans.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use tug_core::{LinePose, ServiceError, SpeakingStatus, Utterance};

pub const OK: &str = "ok";
pub const FAIL: &str = "fail";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl RpcRequest {
    pub fn new(cmd: &str, args: Vec<Value>) -> Self {
        Self {
            cmd: cmd.to_string(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RpcReply {
    #[serde(default)]
    pub reply: Vec<Value>,
}

impl RpcReply {
    fn head(&self) -> Option<&Value> {
        self.reply.first()
    }

    pub fn ack(&self) -> Result<bool, ServiceError> {
        match self.head() {
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) if s == OK => Ok(true),
            Some(Value::String(s)) if s == FAIL => Ok(false),
            other => Err(ServiceError::Protocol(format!(
                "expected an acknowledgement, got {:?}",
                other
            ))),
        }
    }

    /// First element as text; an empty reply reads as the empty string.
    pub fn text(&self) -> Result<String, ServiceError> {
        match self.head() {
            None => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(ServiceError::Protocol(format!(
                "expected a string, got {}",
                other
            ))),
        }
    }

    pub fn list(&self) -> Result<Vec<String>, ServiceError> {
        match self.head() {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        ServiceError::Protocol(format!("expected a string item, got {}", item))
                    })
                })
                .collect(),
            other => Err(ServiceError::Protocol(format!(
                "expected a list, got {:?}",
                other
            ))),
        }
    }

    /// First element as a pose. Anything that is not a list of at least
    /// seven numbers means no line has been found.
    pub fn pose(&self) -> Option<LinePose> {
        let values: Vec<f64> = self
            .head()?
            .as_array()?
            .iter()
            .map(Value::as_f64)
            .collect::<Option<_>>()?;
        LinePose::from_values(&values)
    }

    pub fn speaking_status(&self) -> Result<SpeakingStatus, ServiceError> {
        match self.text()?.as_str() {
            "quiet" => Ok(SpeakingStatus::Quiet),
            "speaking" => Ok(SpeakingStatus::Speaking),
            other => Err(ServiceError::Protocol(format!(
                "unknown speech status '{}'",
                other
            ))),
        }
    }
}

/// Reads an utterance sent over the speech-interp socket, either as JSON or
/// as plain recognised text. JSON that is not an utterance yields an empty
/// keyword, which no intent matches.
pub fn parse_utterance(text: &str) -> Utterance {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::String(plain)) => Utterance::from_text(&plain),
        Ok(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(error = %e, "Malformed utterance");
            Utterance {
                keyword: String::new(),
                payload: None,
            }
        }),
        Err(_) => Utterance::from_text(text),
    }
}
