//! The global authorization gate.
//!
//! Mounted outside the router, so it runs before any handler and before
//! path parameters exist. It expects an upstream authentication layer to
//! have inserted a verified [`Identity`] extension when the request carried
//! a valid token; the gate itself never parses credentials.
//!
//! Rules that read path parameters or caller context cannot be settled
//! here. For those the gate records a deferred check in the request
//! extensions and lets the request through; the handler completes the
//! check via the [`DeferredAuthz`](super::deferred::DeferredAuthz)
//! extractor.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::AuthzError;
use crate::identity::Identity;
use crate::policy::{DecisionContext, Evaluator, GateOutcome};
use super::deferred::{AuthzDisposition, DeferredCheck};

/// Shared state for [`authorization_gate`].
#[derive(Debug, Clone)]
pub struct GateState {
    evaluator: Arc<Evaluator>,
}

impl GateState {
    #[must_use]
    pub fn new(evaluator: Arc<Evaluator>) -> Self {
        Self { evaluator }
    }

    #[must_use]
    pub fn evaluator(&self) -> &Arc<Evaluator> {
        &self.evaluator
    }
}

/// Pipeline-phase check for every request. Use with
/// `axum::middleware::from_fn_with_state`.
pub async fn authorization_gate(
    State(state): State<GateState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let identity = request.extensions().get::<Identity>().cloned();
    let ctx = DecisionContext::new(path.clone()).with_identity(identity.clone());

    match state.evaluator.preflight(&ctx) {
        GateOutcome::Allow => {
            request.extensions_mut().insert(AuthzDisposition::Granted);
            next.run(request).await
        }
        GateOutcome::Deny(kind) => AuthzError::from(kind).into_response(),
        GateOutcome::Deferred => {
            request
                .extensions_mut()
                .insert(AuthzDisposition::Deferred(DeferredCheck::new(
                    Arc::clone(&state.evaluator),
                    path,
                    identity,
                )));
            next.run(request).await
        }
    }
}
