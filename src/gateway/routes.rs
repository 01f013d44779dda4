//! Usage: Loopback HTTP front door for the page domain (`POST /message`, `GET /health`).

use crate::auth::{AuthIndicator, IndicatorState};
use crate::background::BackgroundHandle;
use crate::shared::error::{AppError, UNKNOWN_MESSAGE};
use crate::shared::time::now_unix_seconds;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct GatewayState {
    pub(crate) background: BackgroundHandle,
    pub(crate) indicator: Arc<AuthIndicator>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    app: &'static str,
    version: &'static str,
    authorization: IndicatorState,
    ts: i64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

async fn health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        app: "delocalise",
        version: env!("CARGO_PKG_VERSION"),
        authorization: state.indicator.current(),
        ts: now_unix_seconds(),
    })
}

async fn message(State(state): State<GatewayState>, Json(body): Json<Value>) -> Response {
    match state.background.send(body).await {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) fn status_for(err: &AppError) -> StatusCode {
    use crate::shared::error::{MALFORMED_RESPONSE, TRANSPORT_ERROR, UNEXPECTED_RESPONSE};

    match err.code() {
        UNKNOWN_MESSAGE => StatusCode::BAD_REQUEST,
        MALFORMED_RESPONSE | TRANSPORT_ERROR | UNEXPECTED_RESPONSE | "SEC_INVALID_INPUT" => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: AppError) -> Response {
    let status = status_for(&err);
    let body = ErrorBody {
        code: err.code().to_string(),
        message: err.message().to_string(),
    };
    (status, Json(body)).into_response()
}

pub(crate) fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/message", post(message))
        .with_state(state)
}
