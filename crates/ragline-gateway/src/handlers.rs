use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::server::AppState;
use crate::error::AnswerError;

const EMPTY_QUESTION_DETAIL: &str = "Question cannot be empty.";

#[derive(serde::Deserialize)]
pub(crate) struct AskRequest {
    pub question: String,
}

#[derive(serde::Serialize)]
struct AskResponse {
    answer: String,
}

#[derive(serde::Serialize)]
struct ErrorResponse {
    detail: String,
}

#[derive(serde::Serialize)]
struct RootResponse {
    status: &'static str,
    message: &'static str,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
        .into_response()
}

pub(crate) async fn root_handler() -> impl IntoResponse {
    Json(RootResponse {
        status: "ok",
        message: "RAG assistant API is running",
    })
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub(crate) async fn ask_handler(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Response {
    if request.question.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, EMPTY_QUESTION_DETAIL);
    }

    match state.answer.answer(&request.question).await {
        Ok(answer) => Json(AskResponse { answer }).into_response(),
        Err(AnswerError::EmptyQuestion) => {
            error_response(StatusCode::BAD_REQUEST, EMPTY_QUESTION_DETAIL)
        }
        Err(AnswerError::Upstream(detail)) => {
            tracing::error!("answer generation failed: {detail}");
            error_response(StatusCode::BAD_GATEWAY, detail)
        }
    }
}
