//! Demo HTTP service wired to the Routeguard authorization engine.
//!
//! Every request passes an authentication layer that attaches a verified
//! identity when a valid bearer token is present, then the global
//! authorization gate. Routes with ownership rules finish their checks in
//! the handler. Policy documents hot reload from disk.

pub mod config;
pub mod error;
pub mod handlers;
pub mod items;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod verifier;
pub mod watch;

pub use config::AppConfig;
pub use server::{RouteguardServer, ServerBuilder, build_app};
