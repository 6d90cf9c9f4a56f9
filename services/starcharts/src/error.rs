//! Mapping of GitHub client errors to HTTP responses
//!
//! Every failure renders as
//! `{"error":{"type":"...","message":"...","request_id":"req_..."}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

/// A request failure ready to be rendered.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl From<github::Error> for ApiError {
    fn from(err: github::Error) -> Self {
        let (status, kind) = match &err {
            github::Error::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            github::Error::RateLimited => (StatusCode::SERVICE_UNAVAILABLE, "rate_limited"),
            github::Error::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "upstream_error"),
        };
        Self {
            status,
            kind,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        if self.status.is_server_error() {
            error!(
                request_id = %request_id,
                kind = self.kind,
                error = %self.message,
                "request failed"
            );
        } else {
            warn!(
                request_id = %request_id,
                kind = self.kind,
                error = %self.message,
                "request failed"
            );
        }

        let body = serde_json::json!({
            "error": {
                "type": self.kind,
                "message": self.message,
                "request_id": request_id,
            }
        });
        (
            self.status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
