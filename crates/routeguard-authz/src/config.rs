//! Authorization engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the policy store and evaluator.
///
/// # Example (TOML)
///
/// ```toml
/// [authz]
/// public_map_path = "policies/public.map.json"
/// rule_map_path = "policies/authz.map.json"
/// base_path = "/api"
/// client_id = "routeguard"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Path to the public-path document (JSON array of path patterns).
    pub public_map_path: PathBuf,

    /// Path to the rule document (JSON object of path pattern to rule).
    pub rule_map_path: PathBuf,

    /// Prefix prepended to every pattern of both documents at load time.
    /// Lets one policy document serve a service mounted under any URL prefix.
    pub base_path: String,

    /// Client identifier used to select the client-scoped role claim
    /// (`resource_access.<client_id>.roles`).
    pub client_id: String,

    /// Reload policies automatically when the documents change on disk.
    pub watch: bool,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            public_map_path: PathBuf::from("policies/public.map.json"),
            rule_map_path: PathBuf::from("policies/authz.map.json"),
            base_path: String::new(),
            client_id: "routeguard".to_string(),
            watch: false,
        }
    }
}
