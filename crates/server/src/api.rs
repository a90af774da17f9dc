//! HTTP surface: submission endpoints plus the per-user history pages.
//! Handlers stay thin; the flow itself lives in [`crate::submit`].

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use teamcoach_core::domain::history::{HistoryId, HistoryRecord, QueryPayload};
use teamcoach_core::domain::user::UserId;
use teamcoach_db::HistoryRepository;

use crate::submit::{SubmitError, SubmitOutcome, SubmitService};

pub const USER_ID_HEADER: &str = "x-user-id";
const DEFAULT_PER_PAGE: u32 = 10;
const MAX_PER_PAGE: u32 = 100;

#[derive(Clone)]
pub struct ApiState {
    pub submit: Arc<SubmitService>,
    pub history: Arc<dyn HistoryRepository>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/suggest-team", post(suggest_team))
        .route("/api/ask-question", post(ask_question))
        .route("/api/history", get(list_history))
        .route("/api/history/{id}", get(show_history))
        .with_state(state)
}

/// Errors a handler can answer with. Submission failures that produce a
/// history record are not errors here; they come back as a 200 with
/// `status: "error"` in the body.
enum ApiError {
    MissingUserHeader,
    Validation(String),
    QuotaExceeded(String),
    NotFound,
    Internal,
}

impl From<SubmitError> for ApiError {
    fn from(error: SubmitError) -> Self {
        match error {
            SubmitError::Validation(inner) => ApiError::Validation(inner.to_string()),
            SubmitError::QuotaExceeded { .. } => ApiError::QuotaExceeded(error.to_string()),
            SubmitError::Repository(inner) => {
                tracing::error!(
                    event_name = "api.repository_error",
                    error = %inner,
                    "history repository failed while serving a request"
                );
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MissingUserHeader => {
                (StatusCode::UNAUTHORIZED, format!("missing {USER_ID_HEADER} header"))
            }
            ApiError::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            ApiError::QuotaExceeded(message) => (StatusCode::TOO_MANY_REQUESTS, message),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "history record not found".to_string()),
            ApiError::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Serialize, Deserialize)]
struct ErrorBody {
    error: String,
}

fn caller(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let value = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::MissingUserHeader)?;
    Ok(UserId(value.to_string()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestTeamBody {
    strategy: String,
    owned_characters: Option<String>,
}

#[derive(Deserialize)]
struct AskQuestionBody {
    question: String,
    model: Option<String>,
}

/// Both terminal outcomes answer 200; the `status` discriminant tells the
/// caller whether `response` or `message` is present.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
enum SubmitBody {
    #[serde(rename_all = "camelCase")]
    Success { history_id: HistoryId, response: QueryPayload },
    #[serde(rename_all = "camelCase")]
    Error { history_id: HistoryId, message: String },
}

impl From<SubmitOutcome> for SubmitBody {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Success { history_id, payload } => {
                SubmitBody::Success { history_id, response: payload }
            }
            SubmitOutcome::Failed { history_id, message } => {
                SubmitBody::Error { history_id, message }
            }
        }
    }
}

async fn suggest_team(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<SuggestTeamBody>,
) -> Result<Json<SubmitBody>, ApiError> {
    let user = caller(&headers)?;
    let outcome = state
        .submit
        .submit_team_suggestion(&user, &body.strategy, body.owned_characters.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

async fn ask_question(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<AskQuestionBody>,
) -> Result<Json<SubmitBody>, ApiError> {
    let user = caller(&headers)?;
    let outcome = state
        .submit
        .submit_question(&user, &body.question, body.model.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    page: Option<u32>,
    per_page: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct HistoryView {
    id: HistoryId,
    query_type: String,
    prompt: String,
    owned_characters: Vec<String>,
    model: Option<String>,
    status: String,
    response: Option<QueryPayload>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<HistoryRecord> for HistoryView {
    fn from(record: HistoryRecord) -> Self {
        Self {
            id: record.id,
            query_type: record.kind.as_str().to_string(),
            prompt: record.prompt,
            owned_characters: record.owned_characters,
            model: record.model,
            status: record.status.as_str().to_string(),
            response: record.response,
            error_message: record.error_message,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct HistoryPageView {
    records: Vec<HistoryView>,
    page: u32,
    per_page: u32,
    total: i64,
}

async fn list_history(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPageView>, ApiError> {
    let user = caller(&headers)?;
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);

    let result = state.history.list_for_user(&user, page, per_page).await.map_err(|error| {
        tracing::error!(
            event_name = "api.repository_error",
            error = %error,
            "history listing failed"
        );
        ApiError::Internal
    })?;

    Ok(Json(HistoryPageView {
        records: result.records.into_iter().map(HistoryView::from).collect(),
        page: result.page,
        per_page: result.per_page,
        total: result.total,
    }))
}

async fn show_history(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<HistoryView>, ApiError> {
    let user = caller(&headers)?;
    let record =
        state.history.find_for_user(&user, &HistoryId(id)).await.map_err(|error| {
            if error.is_not_found() {
                ApiError::NotFound
            } else {
                tracing::error!(
                    event_name = "api.repository_error",
                    error = %error,
                    "history lookup failed"
                );
                ApiError::Internal
            }
        })?;
    Ok(Json(record.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use teamcoach_core::domain::history::{Character, TeamSuggestion};
    use teamcoach_db::InMemoryHistoryRepository;
    use teamcoach_inference::{InferenceApi, InferenceError};

    use crate::submit::SubmitService;

    use super::{router, ApiState};

    struct StubInference {
        team_result: Result<TeamSuggestion, InferenceError>,
        answer_result: Result<String, InferenceError>,
    }

    #[async_trait]
    impl InferenceApi for StubInference {
        async fn suggest_team(
            &self,
            _strategy: &str,
            _owned_characters: &[String],
        ) -> Result<TeamSuggestion, InferenceError> {
            self.team_result.clone()
        }

        async fn ask_question(
            &self,
            _question: &str,
            _model: &str,
        ) -> Result<String, InferenceError> {
            self.answer_result.clone()
        }
    }

    fn character(name: &str) -> Character {
        Character {
            name: name.to_string(),
            rarity: "Diamond".to_string(),
            passive: "Power drain".to_string(),
            equipment: vec![],
        }
    }

    fn team() -> TeamSuggestion {
        TeamSuggestion {
            strategy: "Drain power bars, then burst.".to_string(),
            char1: character("Scorpion"),
            char2: character("Raiden"),
            char3: character("Jade"),
        }
    }

    fn app_with(inference: StubInference, daily_limit: u32) -> Router {
        let history = Arc::new(InMemoryHistoryRepository::default());
        let submit = Arc::new(SubmitService::new(
            history.clone(),
            Arc::new(inference),
            daily_limit,
            "mistral-nemo:12b".to_string(),
        ));
        router(ApiState { submit, history })
    }

    fn app() -> Router {
        app_with(
            StubInference { team_result: Ok(team()), answer_result: Ok("an answer".to_string()) },
            0,
        )
    }

    fn post_json(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(user) = user {
            request = request.header("x-user-id", user);
        }
        request.body(Body::from(body.to_string())).expect("request builds")
    }

    fn get(uri: &str, user: Option<&str>) -> Request<Body> {
        let mut request = Request::builder().method("GET").uri(uri);
        if let Some(user) = user {
            request = request.header("x-user-id", user);
        }
        request.body(Body::empty()).expect("request builds")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        serde_json::from_slice(&bytes).expect("body is JSON")
    }

    #[tokio::test]
    async fn missing_user_header_is_unauthorized() {
        let response = app()
            .oneshot(post_json(
                "/api/suggest-team",
                None,
                json!({"strategy": "rushdown all the way"}),
            ))
            .await
            .expect("request completes");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "missing x-user-id header");
    }

    #[tokio::test]
    async fn suggest_team_success_round_trips_through_history() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/suggest-team",
                Some("u-1"),
                json!({
                    "strategy": "power drain core with burst finisher",
                    "ownedCharacters": "Scorpion, Raiden, Jade",
                }),
            ))
            .await
            .expect("request completes");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["response"]["char1"]["name"], "Scorpion");
        let history_id = body["historyId"].as_str().expect("historyId present").to_string();

        let response = app
            .clone()
            .oneshot(get(&format!("/api/history/{history_id}"), Some("u-1")))
            .await
            .expect("request completes");
        assert_eq!(response.status(), StatusCode::OK);
        let record = body_json(response).await;
        assert_eq!(record["status"], "success");
        assert_eq!(record["queryType"], "team_suggest");
        assert_eq!(record["ownedCharacters"], json!(["Scorpion", "Raiden", "Jade"]));

        let response = app
            .oneshot(get("/api/history", Some("u-1")))
            .await
            .expect("request completes");
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_json(response).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["perPage"], 10);
        assert_eq!(page["records"][0]["id"], history_id.as_str());
    }

    #[tokio::test]
    async fn inference_failure_answers_ok_with_error_status() {
        let app = app_with(
            StubInference {
                team_result: Err(InferenceError::Unreachable {
                    detail: "connect refused".to_string(),
                }),
                answer_result: Ok("unused".to_string()),
            },
            0,
        );

        let response = app
            .oneshot(post_json(
                "/api/suggest-team",
                Some("u-1"),
                json!({"strategy": "anything reasonable"}),
            ))
            .await
            .expect("request completes");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(
            body["message"],
            "cannot reach the inference service; verify it is running."
        );
        assert!(body["historyId"].is_string());
    }

    #[tokio::test]
    async fn short_prompt_is_unprocessable() {
        let response = app()
            .oneshot(post_json("/api/ask-question", Some("u-1"), json!({"question": "hi"})))
            .await
            .expect("request completes");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["error"].as_str().expect("error message").contains("question"));
    }

    #[tokio::test]
    async fn quota_rejection_is_too_many_requests() {
        let app = app_with(
            StubInference { team_result: Ok(team()), answer_result: Ok("ok".to_string()) },
            1,
        );

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/ask-question",
                Some("u-1"),
                json!({"question": "first question of the day"}),
            ))
            .await
            .expect("request completes");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/ask-question",
                Some("u-1"),
                json!({"question": "second question of the day"}),
            ))
            .await
            .expect("request completes");
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["error"], "You have reached your daily limit of 1 queries.");

        // Another user is unaffected.
        let response = app
            .oneshot(post_json(
                "/api/ask-question",
                Some("u-2"),
                json!({"question": "a different user's question"}),
            ))
            .await
            .expect("request completes");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_history_id_is_not_found() {
        let response = app()
            .oneshot(get("/api/history/no-such-id", Some("u-1")))
            .await
            .expect("request completes");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "history record not found");
    }

    #[tokio::test]
    async fn history_is_scoped_to_the_caller() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/ask-question",
                Some("u-1"),
                json!({"question": "who counters Scorpion?"}),
            ))
            .await
            .expect("request completes");
        let body = body_json(response).await;
        let history_id = body["historyId"].as_str().expect("historyId present").to_string();

        let response = app
            .clone()
            .oneshot(get(&format!("/api/history/{history_id}"), Some("u-2")))
            .await
            .expect("request completes");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(get("/api/history", Some("u-2")))
            .await
            .expect("request completes");
        let page = body_json(response).await;
        assert_eq!(page["total"], 0);
    }

    #[tokio::test]
    async fn history_pages_are_newest_first() {
        let app = app_with(
            StubInference { team_result: Ok(team()), answer_result: Ok("ok".to_string()) },
            0,
        );

        for i in 0..3 {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/ask-question",
                    Some("u-1"),
                    json!({"question": format!("question number {i}")}),
                ))
                .await
                .expect("request completes");
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(get("/api/history?page=1&perPage=2", Some("u-1")))
            .await
            .expect("request completes");
        let page = body_json(response).await;
        assert_eq!(page["total"], 3);
        assert_eq!(page["records"].as_array().expect("records array").len(), 2);
        assert_eq!(page["records"][0]["prompt"], "question number 2");
        assert_eq!(page["records"][1]["prompt"], "question number 1");
    }
}
