//! Request middleware: authentication and request ids.
//!
//! Authentication is deliberately non-blocking. A request with a valid
//! bearer token gets an [`Identity`](routeguard_authz::Identity) extension;
//! a request with a missing,
//! malformed, or expired token simply gets none. Rejection is the
//! authorization gate's job, which keeps public paths reachable no matter
//! what the `Authorization` header contains.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::verifier::TokenVerifier;

#[derive(Clone)]
pub struct AuthnState {
    verifier: TokenVerifier,
}

impl AuthnState {
    #[must_use]
    pub fn new(verifier: TokenVerifier) -> Self {
        Self { verifier }
    }
}

/// Verifies a bearer token, if present, and attaches the identity.
pub async fn authentication_middleware(
    State(state): State<AuthnState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(request.headers()) {
        match state.verifier.verify(token) {
            Ok(identity) => {
                request.extensions_mut().insert(identity);
            }
            Err(error) => {
                tracing::debug!(%error, "ignoring invalid bearer token");
            }
        }
    }
    next.run(request).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Assigns a request id when the client did not send one and echoes it
/// back on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&id) {
        request.headers_mut().insert("x-request-id", value.clone());
        let mut response = next.run(request).await;
        response.headers_mut().insert("x-request-id", value);
        response
    } else {
        next.run(request).await
    }
}
