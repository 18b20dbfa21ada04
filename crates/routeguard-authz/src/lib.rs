//! Request-time authorization for HTTP services.
//!
//! The crate evaluates declarative policy documents against incoming
//! requests: a public path list of full-match patterns, and a rule mapping
//! from path patterns to boolean rules over identity claims, roles, path
//! parameters, and handler-supplied context. Decisions fail closed:
//! unconfigured paths, malformed rules, and unresolvable comparisons all
//! deny.
//!
//! Checking happens in two phases. The [`middleware::authorization_gate`]
//! settles most requests before routing; rules that read path parameters
//! or caller context are deferred and completed inside the handler through
//! the [`middleware::DeferredAuthz`] extractor.
//!
//! Policy documents live behind a [`policy::PolicyStore`], an atomically
//! swappable snapshot that can be reloaded at runtime without dropping
//! requests.

pub mod config;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod policy;

pub use config::AuthzConfig;
pub use error::{AuthzError, DenyKind};
pub use identity::{Identity, RoleSet};
pub use middleware::{authorization_gate, DeferredAuthz, GateState};
pub use policy::{Decision, DecisionContext, Evaluator, GateOutcome, PolicyStore};
