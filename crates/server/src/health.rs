//! Liveness endpoint. Reports overall status plus the database probe so a
//! supervisor can tell a wedged pool apart from a dead process.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use teamcoach_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub checks: Vec<HealthCheck>,
}

#[derive(Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let healthy = database.healthy;

    let response = HealthResponse {
        status: if healthy { "ok".to_string() } else { "degraded".to_string() },
        checks: vec![database],
    };
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(response))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { name: "database".to_string(), healthy: true, detail: None },
        Err(error) => HealthCheck {
            name: "database".to_string(),
            healthy: false,
            detail: Some(error.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    use super::{router, HealthResponse};

    #[tokio::test]
    async fn health_reports_ok_with_a_live_database() {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("in-memory database connects");

        let response = router(pool)
            .oneshot(Request::get("/health").body(Body::empty()).expect("request builds"))
            .await
            .expect("request completes");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let body: HealthResponse = serde_json::from_slice(&bytes).expect("body is JSON");
        assert_eq!(body.status, "ok");
        assert!(body.checks.iter().any(|check| check.name == "database" && check.healthy));
    }

    #[tokio::test]
    async fn health_degrades_when_the_pool_is_closed() {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("in-memory database connects");
        pool.close().await;

        let response = router(pool)
            .oneshot(Request::get("/health").body(Body::empty()).expect("request builds"))
            .await
            .expect("request completes");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
