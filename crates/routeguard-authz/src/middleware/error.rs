//! HTTP mapping for authorization errors.
//!
//! Responses are deliberately uninformative: an unconfigured path and a
//! failed rule produce the same 403 body, and no rule detail ever reaches
//! the client. The distinction lives in the server logs.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::AuthzError;

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => {
                let body = Json(json!({
                    "error": "unauthenticated",
                    "message": "authentication required",
                }));
                (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, "Bearer realm=\"routeguard\"")],
                    body,
                )
                    .into_response()
            }
            Self::InsufficientPermissions | Self::Unconfigured => {
                tracing::debug!(error = %self, "request forbidden");
                let body = Json(json!({
                    "error": "forbidden",
                    "message": "access denied",
                }));
                (StatusCode::FORBIDDEN, body).into_response()
            }
            Self::PolicyLoad { ref message } => {
                tracing::error!(message, "policy failure while handling request");
                let body = Json(json!({
                    "error": "internal",
                    "message": "internal server error",
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
