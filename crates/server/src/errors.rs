use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use service::EntryStoreError;
use tracing::{error, warn};

/// Turns every save failure into a status code and a plain-text body.
#[derive(Debug)]
pub struct ApiError(pub EntryStoreError);

impl From<EntryStoreError> for ApiError {
    fn from(e: EntryStoreError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            EntryStoreError::Validation(_) => StatusCode::BAD_REQUEST,
            EntryStoreError::MissingConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EntryStoreError::UpstreamRead(_) => StatusCode::BAD_GATEWAY,
            EntryStoreError::UpstreamWrite(e) if e.is_conflict() => StatusCode::CONFLICT,
            EntryStoreError::UpstreamWrite(_) => StatusCode::BAD_GATEWAY,
            EntryStoreError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.0.kind();
        match &self.0 {
            EntryStoreError::Validation(msg) => {
                warn!(kind, status = status.as_u16(), error = %msg, "rejected save request");
            }
            EntryStoreError::MissingConfiguration(detail) => {
                error!(kind, status = status.as_u16(), detail = %detail, "store configuration incomplete");
            }
            other => {
                error!(kind, status = status.as_u16(), error = %other, "save failed");
            }
        }
        (status, self.0.to_string()).into_response()
    }
}
