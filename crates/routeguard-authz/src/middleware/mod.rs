//! Axum integration: the global gate, deferred handler checks, and the
//! HTTP mapping for denial errors.

pub mod deferred;
mod error;
pub mod gate;

pub use deferred::{AuthzDisposition, DeferredAuthz, DeferredCheck};
pub use gate::{authorization_gate, GateState};
