use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::query::executor::{QueryResult, QueryStatus, SchemaResponse};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub max_rows: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub table_count: usize,
}

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

// Standalone schema display
pub async fn get_schema(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SchemaResponse>, (StatusCode, String)> {
    let task_state = Arc::clone(&state);
    let response = tokio::task::spawn_blocking(move || task_state.engine.get_schema())
        .await
        .map_err(|e| {
            error!("Schema task join error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Schema task failed".to_string(),
            )
        })?
        .map_err(|e| {
            error!("Failed to fetch schema: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", e),
            )
        })?;

    Ok(Json(response))
}

// Question / SQL execution. Guard rejections come back as a 400 with the
// structured error body; database failures are a 500.
pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<(StatusCode, Json<QueryResult>), (StatusCode, String)> {
    let question = payload
        .question
        .unwrap_or_default()
        .trim()
        .to_string();
    // A blank sql field counts as absent, same as a blank question.
    let sql = payload.sql.filter(|s| !s.trim().is_empty());

    if question.is_empty() && sql.is_none() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(QueryResult::error("Provide a question or SQL to execute.")),
        ));
    }

    let max_rows = match payload.max_rows {
        None => state.config.query.default_max_rows,
        Some(n) if n > 0 => n as usize,
        Some(_) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(QueryResult::error("max_rows must be a positive integer.")),
            ));
        }
    };

    // Direct SQL without a question keeps a placeholder question string.
    let question = if question.is_empty() {
        "user-provided-sql".to_string()
    } else {
        question
    };

    info!(
        "Answering query (question: {:?}, direct sql: {})",
        question,
        sql.is_some()
    );

    let task_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        task_state
            .engine
            .query_sales(&question, sql.as_deref(), max_rows)
    })
    .await
    .map_err(|e| {
        error!("Query task join error: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Query task failed".to_string(),
        )
    })?
    .map_err(|e| {
        error!("Query failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Database error: {}", e),
        )
    })?;

    let status_code = if result.status == QueryStatus::Error {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    Ok((status_code, Json(result)))
}

// System status
pub async fn system_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SystemStatus>, (StatusCode, String)> {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds();

    let task_state = Arc::clone(&state);
    let schema = tokio::task::spawn_blocking(move || task_state.engine.get_schema())
        .await
        .map_err(|e| {
            error!("Status task join error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Status task failed".to_string(),
            )
        })?
        .map_err(|e| {
            error!("Failed to fetch schema for status: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", e),
            )
        })?;

    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        table_count: schema.schema.table_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, DatabaseConfig, QueryConfig, WebConfig};
    use crate::db::session;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use tower::ServiceExt;

    fn test_router(dir: &tempfile::TempDir) -> Router {
        let db_path = dir.path().join("api.db");
        let config = AppConfig {
            database: DatabaseConfig {
                path: db_path.to_string_lossy().to_string(),
                allowed_tables: vec!["chocolate_sales".to_string()],
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            query: QueryConfig {
                default_max_rows: 200,
            },
        };

        {
            let admin = session::open_admin(&config.database).unwrap();
            admin
                .execute_batch(
                    "CREATE TABLE chocolate_sales (
                         id INTEGER PRIMARY KEY,
                         sales_person VARCHAR,
                         amount DECIMAL(10,2)
                     );
                     INSERT INTO chocolate_sales VALUES
                         (1, 'Jan Cook', 5320.00),
                         (2, 'Luis Vega', 830.25);
                     CREATE TABLE internal_audit_log (id INTEGER);",
                )
                .unwrap();
        }

        crate::web::routes::api_routes().with_state(Arc::new(AppState::new(config)))
    }

    async fn post_query(router: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_router(&dir)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn mutating_sql_is_rejected_with_400() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = post_query(
            test_router(&dir),
            serde_json::json!({"sql": "DROP TABLE chocolate_sales"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["error_message"]
            .as_str()
            .unwrap()
            .contains("read-only SELECT/WITH"));
    }

    #[tokio::test]
    async fn missing_question_and_sql_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = post_query(test_router(&dir), serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn blank_sql_counts_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = post_query(
            test_router(&dir),
            serde_json::json!({"question": "", "sql": ""}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn blank_sql_falls_back_to_the_question() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = post_query(
            test_router(&dir),
            serde_json::json!({"question": "show me total sales", "sql": "   "}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["generated_sql"], true);
    }

    #[tokio::test]
    async fn non_positive_max_rows_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = post_query(
            test_router(&dir),
            serde_json::json!({"sql": "SELECT 1", "max_rows": 0}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn pattern_question_answers_with_generated_sql() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = post_query(
            test_router(&dir),
            serde_json::json!({"question": "show me total sales"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["generated_sql"], true);
        assert_eq!(body["row_count"], 1);
        // DECIMAL sums arrive as exact decimal text.
        assert_eq!(body["rows"][0][0], "6150.25");
    }

    #[tokio::test]
    async fn unanswerable_question_returns_needs_sql() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = post_query(
            test_router(&dir),
            serde_json::json!({"question": "what is the weather"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "needs_sql");
        assert!(body["schema_text"]
            .as_str()
            .unwrap()
            .contains("chocolate_sales"));
    }

    #[tokio::test]
    async fn schema_endpoint_hides_non_allow_listed_tables() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_router(&dir)
            .oneshot(Request::builder().uri("/schema").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "success");
        assert!(body["schema"]["tables"]
            .get("main.chocolate_sales")
            .is_some());
        assert!(body["schema"]["tables"].get("main.internal_audit_log").is_none());
        assert!(!body["schema_text"]
            .as_str()
            .unwrap()
            .contains("internal_audit_log"));
    }

    #[tokio::test]
    async fn status_endpoint_counts_visible_tables() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_router(&dir)
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["table_count"], 1);
    }
}
