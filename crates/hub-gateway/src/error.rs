//! Error types for the HTTP surface.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use hub_core::HubError;
use thiserror::Error;

/// Engine error rendered as a plain-text response.
#[derive(Debug)]
pub struct ApiError(pub HubError);

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.0.to_string(),
        )
            .into_response()
    }
}

/// Server lifecycle errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Listener could not be bound or the server loop failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
