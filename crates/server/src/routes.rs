use axum::{
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;

use common::types::Health;

use crate::observability;
use crate::openapi::ApiDoc;
use crate::state::AppState;

pub mod entries;

pub const SAVE_ENTRY_PATH: &str = "/save-entry";
/// Serverless-function path that older front-ends still post to.
pub const LEGACY_SAVE_ENTRY_PATH: &str = "/.netlify/functions/save-entry";

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "OK", body = crate::openapi::HealthResponse)))]
pub async fn health() -> Json<Health> {
    Json(Health::ok())
}

async fn metrics() -> (axum::http::StatusCode, String) {
    observability::encode_metrics()
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the full application router: save endpoint, health, metrics and the OpenAPI document.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let save = post(entries::save_entry).fallback(entries::method_not_allowed);

    Router::new()
        .route(SAVE_ENTRY_PATH, save.clone())
        .route(LEGACY_SAVE_ENTRY_PATH, save)
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/openapi.json", get(openapi_json))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // 每次请求创建 span，包含方法和路径等，日志级别为 INFO
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                // 响应返回时打点，包含状态码与耗时
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                // 失败（5xx 等）时以 ERROR 记录
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
