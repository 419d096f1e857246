use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::Serialize;
use service::{Action, EntryStoreError, SaveEntryRequest, SaveOutcome};

use crate::errors::ApiError;
use crate::observability::{self, SAVE_DURATION};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SaveEntryResponse {
    pub ok: bool,
    pub action: Action,
}

/// Apply an upsert or delete to the entries document.
///
/// The body is read raw so that an empty body means `{}` and malformed JSON
/// gets the same plain-text 400 as any other validation failure.
#[utoipa::path(
    post,
    path = "/save-entry",
    tag = "entries",
    request_body = crate::openapi::SaveEntryRequestDoc,
    responses(
        (status = 200, description = "Committed", body = crate::openapi::SaveEntryResponseDoc),
        (status = 400, description = "Missing entry, entry.id or id"),
        (status = 409, description = "Document changed since it was read"),
        (status = 500, description = "Missing GitHub configuration"),
        (status = 502, description = "GitHub read or write failed")
    )
)]
pub async fn save_entry(State(state): State<AppState>, body: Bytes) -> Result<Json<SaveEntryResponse>, ApiError> {
    let _timer = SAVE_DURATION.start_timer();

    let request = SaveEntryRequest::from_body(&body).map_err(|e| {
        observability::record_save("unknown", e.kind());
        ApiError(e)
    })?;
    let action = request.action();

    match save(&state, request).await {
        Ok(saved) => {
            observability::record_save(action.as_str(), "ok");
            Ok(Json(SaveEntryResponse { ok: true, action: saved.action }))
        }
        Err(e) => {
            observability::record_save(action.as_str(), e.kind());
            Err(ApiError(e))
        }
    }
}

async fn save(state: &AppState, request: SaveEntryRequest) -> Result<SaveOutcome, EntryStoreError> {
    // 先校验请求，再检查配置，二者都在任何网络请求之前
    let mutation = request.into_mutation()?;
    let access = state.store_config.resolve()?;
    state.updater.apply(&access, &mutation).await
}

pub async fn method_not_allowed() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}
