//! Handler-side completion of deferred checks.
//!
//! Handlers on guarded routes take a [`DeferredAuthz`] argument and call
//! [`DeferredAuthz::authorize`] before touching the resource. For requests
//! the gate already settled this is a no-op; for deferred ones it re-runs
//! the matched rule with the bound path parameters and whatever context
//! object the handler supplies.
//!
//! A request that somehow reaches a guarded handler without passing the
//! gate carries no disposition extension. `authorize` treats that as a
//! denial, so a route wired outside the gate fails closed instead of
//! serving unchecked.

use std::sync::Arc;

use axum::extract::{FromRequestParts, RawPathParams};
use axum::http::request::Parts;
use serde_json::{Map, Value};

use crate::error::AuthzError;
use crate::identity::Identity;
use crate::policy::{DecisionContext, Evaluator};

/// What the gate decided for this request.
#[derive(Debug, Clone)]
pub enum AuthzDisposition {
    /// The gate settled the check; nothing left to verify.
    Granted,
    /// The rule needs request data; the handler must finish the check.
    Deferred(DeferredCheck),
}

/// The saved half of a deferred decision.
#[derive(Debug, Clone)]
pub struct DeferredCheck {
    evaluator: Arc<Evaluator>,
    path: String,
    identity: Option<Identity>,
}

impl DeferredCheck {
    #[must_use]
    pub fn new(evaluator: Arc<Evaluator>, path: String, identity: Option<Identity>) -> Self {
        Self {
            evaluator,
            path,
            identity,
        }
    }
}

/// Extractor that completes authorization inside a handler.
#[derive(Debug)]
pub struct DeferredAuthz {
    disposition: Option<AuthzDisposition>,
    path_params: Value,
}

impl DeferredAuthz {
    /// Finishes the check. `context` is the handler-supplied object that
    /// `{context.*}` operands resolve against; pass `json!({})` when the
    /// route's rules use none.
    pub fn authorize(&self, context: Value) -> Result<(), AuthzError> {
        match &self.disposition {
            Some(AuthzDisposition::Granted) => Ok(()),
            Some(AuthzDisposition::Deferred(check)) => {
                let ctx = DecisionContext::new(check.path.clone())
                    .with_identity(check.identity.clone())
                    .with_path_params(self.path_params.clone())
                    .with_context(context);
                check.evaluator.check(&ctx)
            }
            None => {
                tracing::warn!("guarded handler reached without passing the authorization gate");
                Err(AuthzError::Unconfigured)
            }
        }
    }
}

impl<S> FromRequestParts<S> for DeferredAuthz
where
    S: Send + Sync,
{
    type Rejection = AuthzError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let disposition = parts.extensions.get::<AuthzDisposition>().cloned();
        let path_params = match RawPathParams::from_request_parts(parts, state).await {
            Ok(params) => {
                let mut map = Map::new();
                for (name, value) in &params {
                    map.insert(name.to_string(), Value::String(value.to_string()));
                }
                Value::Object(map)
            }
            Err(error) => {
                tracing::warn!(%error, "path parameters unreadable, failing closed");
                return Err(AuthzError::InsufficientPermissions);
            }
        };
        Ok(Self {
            disposition,
            path_params,
        })
    }
}
