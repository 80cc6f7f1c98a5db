use crate::config::OracleSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Request body of the text-generation backend (`POST /api/generate`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerateOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub temperature: f32,
}

/// Successful generation. Extra backend fields are kept for passthrough.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GenerateResponse {
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OracleReply {
    Failed { error: String },
    Generated(GenerateResponse),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Oracle timed out")]
    Timeout,
    #[error("Cannot reach oracle: {0}")]
    Connection(String),
    #[error("Oracle returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("Oracle error: {0}")]
    Backend(String),
    #[error("Unexpected oracle response: {0}")]
    BadResponse(String),
}

impl OracleError {
    /// Only timeouts are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, OracleError::Timeout)
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            OracleError::Timeout
        } else if e.is_connect() {
            OracleError::Connection(e.to_string())
        } else if e.is_decode() {
            OracleError::BadResponse(e.to_string())
        } else {
            OracleError::Connection(e.to_string())
        }
    }
}

/// External text-generation backend, treated as a request/response oracle.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, OracleError>;

    /// Cheap reachability check, used once at startup.
    async fn check(&self) -> Result<(), OracleError> {
        Ok(())
    }
}

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Ollama-compatible HTTP client.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    endpoint: String,
}

impl OllamaClient {
    pub fn new(settings: &OracleSettings) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| OracleError::Connection(e.to_string()))?;
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            endpoint: format!("{base_url}/api/generate"),
            base_url,
        })
    }
}

#[async_trait]
impl Oracle for OllamaClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, OracleError> {
        debug!(model = %request.model, "Sending generate request");
        let response = self.client.post(&self.endpoint).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Ollama reports failures as {"error": "..."} alongside a non-2xx code.
            if let Ok(OracleReply::Failed { error }) = serde_json::from_str(&body) {
                return Err(OracleError::Backend(error));
            }
            return Err(OracleError::Status {
                code: status.as_u16(),
                body,
            });
        }

        match serde_json::from_str::<OracleReply>(&body) {
            Ok(OracleReply::Generated(reply)) => Ok(reply),
            Ok(OracleReply::Failed { error }) => Err(OracleError::Backend(error)),
            Err(e) => Err(OracleError::BadResponse(e.to_string())),
        }
    }

    /// `GET /api/tags` lists local models and answers quickly when Ollama is up.
    async fn check(&self) -> Result<(), OracleError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(CHECK_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status {
                code: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Calls the oracle, retrying timeouts up to `max_attempts` calls in total.
/// Any other failure is returned immediately.
pub async fn generate_with_retry(
    oracle: &dyn Oracle,
    request: &GenerateRequest,
    max_attempts: u32,
) -> Result<GenerateResponse, OracleError> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match oracle.generate(request).await {
            Err(e) if e.is_transient() && attempt < max_attempts => {
                warn!(
                    "Oracle timeout (attempt {}/{}), retrying",
                    attempt, max_attempts
                );
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted replies and records every request it receives.
    #[derive(Default)]
    pub(crate) struct ScriptedOracle {
        replies: Mutex<VecDeque<Result<GenerateResponse, OracleError>>>,
        pub(crate) requests: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedOracle {
        pub(crate) fn new(
            replies: impl IntoIterator<Item = Result<GenerateResponse, OracleError>>,
        ) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                requests: Mutex::default(),
            }
        }

        pub(crate) fn replying(text: &str) -> Self {
            Self::new([Ok(GenerateResponse::text(text))])
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        async fn generate(
            &self,
            request: &GenerateRequest,
        ) -> Result<GenerateResponse, OracleError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(OracleError::Connection("script exhausted".into())))
        }
    }

    fn request() -> GenerateRequest {
        GenerateRequest {
            model: "llama3".into(),
            prompt: "hi".into(),
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
            format: Some("json".into()),
        }
    }

    #[tokio::test]
    async fn timeouts_are_retried_until_success() {
        let oracle = ScriptedOracle::new([
            Err(OracleError::Timeout),
            Err(OracleError::Timeout),
            Ok(GenerateResponse::text("{}")),
        ]);
        let reply = generate_with_retry(&oracle, &request(), 3).await.unwrap();
        assert_eq!(reply.response, "{}");
        assert_eq!(oracle.calls(), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let oracle = ScriptedOracle::new([
            Err(OracleError::Timeout),
            Err(OracleError::Timeout),
            Err(OracleError::Timeout),
            Ok(GenerateResponse::text("late")),
        ]);
        let err = generate_with_retry(&oracle, &request(), 3).await.unwrap_err();
        assert_eq!(err, OracleError::Timeout);
        assert_eq!(oracle.calls(), 3);
    }

    #[tokio::test]
    async fn permanent_errors_fail_immediately() {
        let oracle = ScriptedOracle::new([
            Err(OracleError::Connection("refused".into())),
            Ok(GenerateResponse::text("never")),
        ]);
        let err = generate_with_retry(&oracle, &request(), 5).await.unwrap_err();
        assert!(matches!(err, OracleError::Connection(_)));
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn check_fails_when_nothing_listens() {
        let client = OllamaClient::new(&OracleSettings {
            base_url: "http://127.0.0.1:1/".into(),
            timeout_secs: 2,
            ..OracleSettings::default()
        })
        .unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:1");
        assert!(matches!(
            client.check().await,
            Err(OracleError::Connection(_) | OracleError::Timeout)
        ));
    }

    #[tokio::test]
    async fn zero_attempts_still_calls_once() {
        let oracle = ScriptedOracle::replying("ok");
        assert!(generate_with_retry(&oracle, &request(), 0).await.is_ok());
        assert_eq!(oracle.calls(), 1);
    }

    #[test]
    fn wire_request_shape() {
        let value = serde_json::to_value(request()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "llama3",
                "prompt": "hi",
                "stream": false,
                "options": {"temperature": 0.0},
                "format": "json"
            })
        );
    }

    #[test]
    fn reply_distinguishes_oracle_errors() {
        let failed: OracleReply = serde_json::from_str(r#"{"error": "model not found"}"#).unwrap();
        assert!(matches!(failed, OracleReply::Failed { .. }));

        let ok: OracleReply =
            serde_json::from_str(r#"{"response": "hello", "done": true, "model": "llama3"}"#)
                .unwrap();
        let OracleReply::Generated(ok) = ok else {
            panic!("expected a generated reply");
        };
        assert_eq!(ok.response, "hello");
        assert_eq!(ok.extra["done"], true);
    }
}
