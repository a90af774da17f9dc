use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use teamcoach_core::config::InferenceConfig;
use teamcoach_core::domain::history::TeamSuggestion;

use crate::decode::{decode_answer, decode_envelope, decode_team};
use crate::error::InferenceError;

/// The two remote operations exposed by the inference service. One attempt
/// per invocation; no retries at this layer.
#[async_trait]
pub trait InferenceApi: Send + Sync {
    async fn suggest_team(
        &self,
        strategy: &str,
        owned_characters: &[String],
    ) -> Result<TeamSuggestion, InferenceError>;

    async fn ask_question(&self, question: &str, model: &str) -> Result<String, InferenceError>;
}

#[derive(Serialize)]
struct SuggestTeamRequest<'a> {
    strategy: &'a str,
    // Omitted entirely when the caller owns no characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    owned_characters: Option<&'a [String]>,
}

impl<'a> SuggestTeamRequest<'a> {
    fn new(strategy: &'a str, owned_characters: &'a [String]) -> Self {
        Self {
            strategy,
            owned_characters: (!owned_characters.is_empty()).then_some(owned_characters),
        }
    }
}

#[derive(Serialize)]
struct AskQuestionRequest<'a> {
    question: &'a str,
    model: &'a str,
}

pub struct HttpInferenceClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpInferenceClient {
    /// The timeout applies per request and is the only cancellation
    /// trigger; generative inference routinely takes minutes.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn from_config(config: &InferenceConfig) -> Result<Self, reqwest::Error> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, InferenceError> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| InferenceError::Unreachable { detail: err.to_string() })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| InferenceError::Unreachable { detail: err.to_string() })?;

        debug!(url = %url, status = status.as_u16(), "inference service responded");
        decode_envelope(status, &bytes)
    }
}

#[async_trait]
impl InferenceApi for HttpInferenceClient {
    async fn suggest_team(
        &self,
        strategy: &str,
        owned_characters: &[String],
    ) -> Result<TeamSuggestion, InferenceError> {
        let inner = self
            .post("/suggest-team", &SuggestTeamRequest::new(strategy, owned_characters))
            .await?;
        decode_team(inner)
    }

    async fn ask_question(&self, question: &str, model: &str) -> Result<String, InferenceError> {
        let inner = self.post("/ask-question", &AskQuestionRequest { question, model }).await?;
        decode_answer(inner)
    }
}
