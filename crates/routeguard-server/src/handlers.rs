//! HTTP handlers for the demo service.
//!
//! Routes fall into three groups, matching the shipped policy documents:
//! public endpoints (`/`, `/healthz`), endpoints the gate settles on its
//! own (`/dashboard`, `/admin/*`), and the item routes whose ownership
//! rule is completed in the handler via [`DeferredAuthz`].

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::Extension;
use routeguard_authz::{DeferredAuthz, Evaluator, Identity};
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::items::{Item, ItemStore};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub evaluator: Arc<Evaluator>,
    pub items: Arc<ItemStore>,
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "routeguard-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Any authenticated caller. The gate has already settled the check.
pub async fn dashboard(Extension(identity): Extension<Identity>) -> Json<Value> {
    Json(json!({
        "message": "welcome",
        "subject": identity.subject(),
    }))
}

/// Admin only, per the shipped rule mapping.
pub async fn admin_stats(State(state): State<AppState>) -> Json<Value> {
    let stats = state.evaluator.store().snapshot().stats();
    Json(json!({
        "policies": stats,
        "items": state.items.len(),
    }))
}

/// Re-reads the policy documents and swaps the snapshot in.
pub async fn admin_reload(State(state): State<AppState>) -> Json<Value> {
    let stats = state.evaluator.store().reload();
    Json(json!({"reloaded": true, "policies": stats}))
}

/// Ownership-guarded read. The rule for `/items/{id}` compares the
/// caller's subject against the item's owner, so the lookup happens
/// before the deferred check and feeds it the owner id. A missing item
/// is authorized against an empty context first, which keeps existence
/// hidden from callers the rule would deny anyway.
pub async fn get_item(
    State(state): State<AppState>,
    authz: DeferredAuthz,
    Path(id): Path<String>,
) -> Result<Json<Item>, ApiError> {
    match state.items.get(&id) {
        Some(item) => {
            authz.authorize(json!({"resource": {"owner_id": item.owner_id}}))?;
            Ok(Json(item))
        }
        None => {
            authz.authorize(json!({}))?;
            Err(ApiError::NotFound)
        }
    }
}

/// Ownership-guarded delete, same shape as [`get_item`].
pub async fn delete_item(
    State(state): State<AppState>,
    authz: DeferredAuthz,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.items.get(&id) {
        Some(item) => {
            authz.authorize(json!({"resource": {"owner_id": item.owner_id}}))?;
            state.items.remove(&id);
            Ok(Json(json!({"deleted": id})))
        }
        None => {
            authz.authorize(json!({}))?;
            Err(ApiError::NotFound)
        }
    }
}
