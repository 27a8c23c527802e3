//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Strategic planning and adaptive campaign execution."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::time::Duration;

use async_trait::async_trait;
use gaco_common::PlannerConfig;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::OracleError;

const LOCAL_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "host.docker.internal"];

/// External service that turns a prompt pair into free text.
#[async_trait]
pub trait PlanningOracle: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, OracleError>;

    /// Label used in logs.
    fn name(&self) -> &str {
        "oracle"
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

impl ChatResponse {
    /// `content`, or `reasoning_content` for models that only fill that field.
    fn into_text(self) -> Result<String, OracleError> {
        let reply = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OracleError::Malformed("response carried no choices".to_owned()))?
            .message;
        reply
            .content
            .filter(|c| !c.trim().is_empty())
            .or(reply.reasoning_content)
            .ok_or_else(|| OracleError::Malformed("response carried no content".to_owned()))
    }
}

/// Client for OpenAI-compatible `chat/completions` endpoints.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
    bearer: Option<String>,
}

impl HttpOracle {
    pub fn from_config(config: &PlannerConfig) -> Result<Self, OracleError> {
        let base = config.api_base.trim_end_matches('/');
        let url = Url::parse(base)
            .map_err(|err| OracleError::Unavailable(format!("invalid api_base {base}: {err}")))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| OracleError::Unavailable(err.to_string()))?;

        let bearer = if is_local(&url) {
            None
        } else {
            let key = load_api_key(config);
            if key.is_none() {
                warn!(endpoint = %base, "remote oracle configured without an API key");
            }
            key
        };

        Ok(Self {
            client,
            endpoint: format!("{base}/chat/completions"),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout,
            bearer,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn sends_credentials(&self) -> bool {
        self.bearer.is_some()
    }
}

fn is_local(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|host| LOCAL_HOSTS.contains(&host))
}

fn load_api_key(config: &PlannerConfig) -> Option<String> {
    if let Ok(key) = std::env::var(&config.api_key_env) {
        if !key.trim().is_empty() {
            return Some(key.trim().to_owned());
        }
    }
    let path = config.api_key_file.as_ref()?;
    match fs::read_to_string(path) {
        Ok(contents) if !contents.trim().is_empty() => Some(contents.trim().to_owned()),
        Ok(_) => None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read oracle API key file");
            None
        }
    }
}

#[async_trait]
impl PlanningOracle for HttpOracle {
    async fn complete(&self, system: &str, user: &str) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.bearer {
            request = request.bearer_auth(key);
        }
        debug!(endpoint = %self.endpoint, model = %self.model, "querying planning oracle");

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                OracleError::Timeout(self.timeout)
            } else {
                OracleError::Unavailable(err.to_string())
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(OracleError::Unavailable(format!("HTTP {status}: {detail}")));
        }
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| OracleError::Malformed(err.to_string()))?;
        parsed.into_text()
    }

    fn name(&self) -> &str {
        &self.model
    }
}
