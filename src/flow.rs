//! Chat-flow API client
//!
//! Sends a transcript to the remote conversational flow and extracts the
//! reply text from its nested output structure.

use serde::{Deserialize, Serialize};

use crate::config::FlowConfig;
use crate::{Error, Result};

/// Request body for the flow run endpoint
#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    input_value: &'a str,
    output_type: &'a str,
    input_type: &'a str,
}

/// Response from the flow run endpoint
///
/// Only the reply-text path is modeled; everything else in the payload is
/// ignored. All levels are optional so a malformed reply deserializes cleanly
/// and is reported as a format error instead of a parse failure.
#[derive(Debug, Default, Deserialize)]
struct RunResponse {
    #[serde(default)]
    outputs: Vec<OuterOutput>,
}

#[derive(Debug, Default, Deserialize)]
struct OuterOutput {
    #[serde(default)]
    outputs: Vec<InnerOutput>,
}

#[derive(Debug, Default, Deserialize)]
struct InnerOutput {
    results: Option<InnerResults>,
}

#[derive(Debug, Deserialize)]
struct InnerResults {
    message: Option<FlowMessage>,
}

#[derive(Debug, Deserialize)]
struct FlowMessage {
    data: Option<MessageData>,
}

#[derive(Debug, Deserialize)]
struct MessageData {
    text: Option<String>,
}

impl RunResponse {
    /// Walk `outputs[0].outputs[0].results.message.data.text`
    fn reply_text(self) -> Option<String> {
        self.outputs
            .into_iter()
            .next()?
            .outputs
            .into_iter()
            .next()?
            .results?
            .message?
            .data?
            .text
    }
}

/// Client for the remote chat-flow API
#[derive(Debug, Clone)]
pub struct FlowClient {
    client: reqwest::Client,
    base_url: String,
    namespace: String,
    flow_id: String,
    token: Option<String>,
}

impl FlowClient {
    /// Create a new flow client from configuration
    #[must_use]
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            flow_id: config.flow_id.clone(),
            token: config.application_token.clone(),
        }
    }

    /// The run endpoint URL
    fn run_url(&self) -> String {
        format!(
            "{}/lf/{}/api/v1/run/{}",
            self.base_url, self.namespace, self.flow_id
        )
    }

    /// Run the flow with a user message and return the reply text
    ///
    /// Issues a single POST; the bearer token header is attached only when a
    /// token is configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResponseFormat`] when the reply is missing the
    /// expected text path, [`Error::Flow`] on a non-success status, and
    /// [`Error::Http`] on transport failures
    pub async fn run(&self, message: &str) -> Result<String> {
        let request = RunRequest {
            input_value: message,
            output_type: "chat",
            input_type: "chat",
        };

        let mut builder = self.client.post(self.run_url()).json(&request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(error = %e, "flow request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "flow API error");
            return Err(Error::Flow(format!("flow API error {status}: {body}")));
        }

        let parsed: RunResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse flow response");
            e
        })?;

        let text = parsed.reply_text().ok_or(Error::ResponseFormat)?;
        tracing::info!(reply_len = text.len(), "flow reply received");
        Ok(text)
    }
}
