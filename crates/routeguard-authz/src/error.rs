//! Authorization error types.
//!
//! Every denial produced by the engine maps to exactly one variant here;
//! there is no ambiguous or silent-allow path. Boundary code translates
//! `Unauthenticated` to 401 and the other denial kinds to 403.

use std::fmt;

/// Errors that can occur during authorization.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The request carries no verified identity on a protected path.
    #[error("Not authenticated")]
    Unauthenticated,

    /// A rule matched the path and evaluated to false for this identity.
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    /// The path is not public and no rule is configured for it.
    /// Secure by default: an unlisted protected path is always denied.
    #[error("Access to this resource is not configured")]
    Unconfigured,

    /// A policy document could not be read or parsed.
    #[error("Policy load error: {message}")]
    PolicyLoad {
        /// Description of the load failure.
        message: String,
    },
}

impl AuthzError {
    /// Creates a new `PolicyLoad` error.
    #[must_use]
    pub fn policy_load(message: impl Into<String>) -> Self {
        Self::PolicyLoad {
            message: message.into(),
        }
    }

    /// Returns `true` if this error represents a denial of a request
    /// (as opposed to an operational problem).
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::InsufficientPermissions | Self::Unconfigured
        )
    }

    /// Returns `true` if this is an authentication failure (401 category).
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    /// Returns `true` if this is an authorization failure (403 category).
    #[must_use]
    pub fn is_authorization_error(&self) -> bool {
        matches!(self, Self::InsufficientPermissions | Self::Unconfigured)
    }

    /// The denial kind, if this error is a denial.
    #[must_use]
    pub fn deny_kind(&self) -> Option<DenyKind> {
        match self {
            Self::Unauthenticated => Some(DenyKind::Unauthenticated),
            Self::InsufficientPermissions => Some(DenyKind::InsufficientPermissions),
            Self::Unconfigured => Some(DenyKind::Unconfigured),
            Self::PolicyLoad { .. } => None,
        }
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyKind {
    /// No verified identity on a protected path.
    Unauthenticated,
    /// A matching rule evaluated to false.
    InsufficientPermissions,
    /// No rule is configured for the path.
    Unconfigured,
}

impl From<DenyKind> for AuthzError {
    fn from(kind: DenyKind) -> Self {
        match kind {
            DenyKind::Unauthenticated => Self::Unauthenticated,
            DenyKind::InsufficientPermissions => Self::InsufficientPermissions,
            DenyKind::Unconfigured => Self::Unconfigured,
        }
    }
}

impl fmt::Display for DenyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::InsufficientPermissions => write!(f, "insufficient-permissions"),
            Self::Unconfigured => write!(f, "unconfigured"),
        }
    }
}
