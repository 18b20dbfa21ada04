//! Handler error type.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use routeguard_authz::AuthzError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,

    #[error(transparent)]
    Authz(#[from] AuthzError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => {
                let body = Json(json!({
                    "error": "not-found",
                    "message": "resource not found",
                }));
                (StatusCode::NOT_FOUND, body).into_response()
            }
            Self::Authz(error) => error.into_response(),
        }
    }
}
