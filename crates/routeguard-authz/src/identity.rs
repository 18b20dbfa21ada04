//! Verified identity and role-set derivation.
//!
//! An [`Identity`] is the opaque claims object produced by token
//! verification (an external collaborator). The engine never inspects how
//! the claims were obtained; it only reads them.

use std::collections::HashSet;

use serde_json::Value;

/// A verified claims object.
///
/// Wraps the raw JSON claims so placeholder resolution can traverse them.
/// Cheap to clone relative to request volume; stored in request extensions
/// by the authentication layer.
#[derive(Debug, Clone)]
pub struct Identity {
    claims: Value,
}

impl Identity {
    /// Wraps a verified claims object.
    ///
    /// Non-object values are accepted but resolve every claim lookup to
    /// absent, which fails closed.
    #[must_use]
    pub fn new(claims: Value) -> Self {
        Self { claims }
    }

    /// The raw claims object.
    #[must_use]
    pub fn claims(&self) -> &Value {
        &self.claims
    }

    /// The `sub` claim, if present and a string.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(Value::as_str)
    }

    /// Derives the role set for this identity: the union of the realm-level
    /// roles (`realm_access.roles`) and the client-scoped roles
    /// (`resource_access.<client_id>.roles`).
    #[must_use]
    pub fn role_set(&self, client_id: &str) -> RoleSet {
        let mut roles = HashSet::new();
        collect_roles(
            self.claims.get("realm_access").and_then(|v| v.get("roles")),
            &mut roles,
        );
        collect_roles(
            self.claims
                .get("resource_access")
                .and_then(|v| v.get(client_id))
                .and_then(|v| v.get("roles")),
            &mut roles,
        );
        RoleSet { roles }
    }
}

fn collect_roles(value: Option<&Value>, out: &mut HashSet<String>) {
    if let Some(Value::Array(items)) = value {
        for item in items {
            if let Value::String(role) = item {
                out.insert(role.clone());
            }
        }
    }
}

/// The set of role names held by an identity for one check.
#[derive(Debug, Clone, Default)]
pub struct RoleSet {
    roles: HashSet<String>,
}

impl RoleSet {
    /// Returns `true` if the role is present.
    #[must_use]
    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Number of distinct roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Returns `true` if the identity holds no roles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
