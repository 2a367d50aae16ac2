use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::DialogClient;
use crate::config::DialogConfig;
use crate::error::DialogError;

pub const DEFAULT_BASE_URL: &str = "https://general-runtime.voiceflow.com";

#[derive(Serialize)]
struct InteractRequest<'a> {
    action: Action<'a>,
    config: InteractConfig,
}

#[derive(Serialize)]
struct Action<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    payload: &'a str,
}

#[derive(Serialize)]
struct InteractConfig {
    tts: bool,
    #[serde(rename = "stripSSML")]
    strip_ssml: bool,
}

/// One entry of the trace array Voiceflow answers with
///
/// Payload shape depends on the trace type, so it stays untyped.
#[derive(Debug, Deserialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

/// Join the spoken parts (`text` and `speak` traces) of a reply
pub fn extract_reply(traces: &[Trace]) -> String {
    traces
        .iter()
        .filter(|trace| trace.kind == "text" || trace.kind == "speak")
        .filter_map(|trace| trace.payload.get("message").and_then(Value::as_str))
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Voiceflow general runtime client
pub struct VoiceflowClient {
    base_url: String,
    api_key: String,
    version_id: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl VoiceflowClient {
    pub fn new(config: &DialogConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            version_id: config.version_id.clone(),
            timeout,
            client,
        }
    }

    fn interact_url(&self, session_id: &str) -> String {
        format!("{}/state/user/{}/interact", self.base_url, session_id)
    }
}

#[async_trait::async_trait]
impl DialogClient for VoiceflowClient {
    async fn interact(&self, session_id: &str, utterance: &str) -> Result<String, DialogError> {
        info!("[{}] Sending utterance to Voiceflow", session_id);

        let body = InteractRequest {
            action: Action {
                kind: "text",
                payload: utterance,
            },
            config: InteractConfig {
                tts: false,
                strip_ssml: true,
            },
        };

        let response = self
            .client
            .post(self.interact_url(session_id))
            .header("Authorization", self.api_key.as_str())
            .header("versionID", self.version_id.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DialogError::Timeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    DialogError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DialogError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let traces: Vec<Trace> = response
            .json()
            .await
            .map_err(|e| DialogError::Malformed(e.to_string()))?;

        debug!("[{}] Voiceflow returned {} traces", session_id, traces.len());

        Ok(extract_reply(&traces))
    }
}
