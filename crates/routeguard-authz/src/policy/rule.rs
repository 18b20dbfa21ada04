//! The declarative rule language.
//!
//! A rule is a JSON object keyed by one of the recognized operators
//! (checked in a fixed priority order): `NOT`, `ALL`, `ANY`, `claims`,
//! `claims_lte`, `claims_gte`, `claims_contains`, `claims_timediff_lte`.
//! The dynamic document shape is parsed once, at load time, into the closed
//! [`RuleNode`] union; evaluation is an exhaustive match with no runtime
//! type errors. Shapes the parser does not recognize become designated
//! variants that fail closed instead of crashing:
//!
//! - an object with none of the operator keys is [`RuleNode::Unrecognized`]
//!   (at the top of a rule mapping this means "authenticated only", nested
//!   it evaluates to false);
//! - an operator with a payload of the wrong type is [`RuleNode::Malformed`]
//!   and always evaluates to false.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::placeholder::Operand;

/// A child of `NOT`/`ALL`/`ANY`: either a bare role name or a nested rule.
///
/// Bare role strings are valid only in child position; a top-level bare
/// string is not a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleChild {
    /// Satisfied when the role is in the identity's role set.
    Role(String),
    /// A nested rule object.
    Node(RuleNode),
}

impl RuleChild {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::String(role) => Self::Role(role.clone()),
            Value::Object(_) => Self::Node(RuleNode::from_value(value)),
            _ => Self::Node(RuleNode::Malformed),
        }
    }

    fn needs_request_data(&self) -> bool {
        match self {
            Self::Role(_) => false,
            Self::Node(node) => node.requires_request_data(),
        }
    }
}

/// One node of the recursive rule structure.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleNode {
    /// Empty condition: satisfied by any authenticated identity.
    Authenticated,
    /// Negation of a role or nested rule.
    Not(Box<RuleChild>),
    /// Conjunction; false on the first failing child.
    All(Vec<RuleChild>),
    /// Disjunction; true on the first satisfied child.
    Any(Vec<RuleChild>),
    /// Every pair's resolved values must be equal (and concrete).
    ClaimsEqual(Vec<(Operand, Operand)>),
    /// Numeric less-than-or-equal per pair; non-numeric sides fail closed.
    ClaimsLte(Vec<(Operand, Operand)>),
    /// Numeric greater-than-or-equal per pair; non-numeric sides fail closed.
    ClaimsGte(Vec<(Operand, Operand)>),
    /// Left resolves to an array, right must be an element of it.
    ClaimsContains(Vec<(Operand, Operand)>),
    /// Claim (a Unix timestamp) must be at most this many seconds old.
    ClaimsRecency(Vec<(String, i64)>),
    /// An object with no recognized operator key. Authenticated-only at the
    /// top level of the rule mapping; false when nested.
    Unrecognized,
    /// A recognized operator with a payload of the wrong shape.
    /// Always evaluates to false.
    Malformed,
}

/// Recognized operator keys, in priority order.
const OPERATOR_KEYS: [&str; 8] = [
    "NOT",
    "ALL",
    "ANY",
    "claims",
    "claims_lte",
    "claims_gte",
    "claims_contains",
    "claims_timediff_lte",
];

impl RuleNode {
    /// Parses a rule-document value. Never fails: unknown or malformed
    /// shapes map to the designated fail-closed variants.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Self::Malformed;
        };
        if map.is_empty() {
            return Self::Authenticated;
        }

        for key in OPERATOR_KEYS {
            if let Some(payload) = map.get(key) {
                return Self::from_operator(key, payload);
            }
        }
        Self::Unrecognized
    }

    fn from_operator(key: &str, payload: &Value) -> Self {
        match key {
            "NOT" => match payload {
                Value::String(role) => Self::Not(Box::new(RuleChild::Role(role.clone()))),
                Value::Object(_) => {
                    Self::Not(Box::new(RuleChild::Node(Self::from_value(payload))))
                }
                _ => Self::Malformed,
            },
            "ALL" | "ANY" => {
                let Value::Array(items) = payload else {
                    return Self::Malformed;
                };
                let children = items.iter().map(RuleChild::from_value).collect();
                if key == "ALL" {
                    Self::All(children)
                } else {
                    Self::Any(children)
                }
            }
            "claims" | "claims_lte" | "claims_gte" | "claims_contains" => {
                let Value::Object(pairs) = payload else {
                    return Self::Malformed;
                };
                let pairs = pairs
                    .iter()
                    .map(|(k, v)| (Operand::from_key(k), Operand::from_value(v)))
                    .collect();
                match key {
                    "claims" => Self::ClaimsEqual(pairs),
                    "claims_lte" => Self::ClaimsLte(pairs),
                    "claims_gte" => Self::ClaimsGte(pairs),
                    _ => Self::ClaimsContains(pairs),
                }
            }
            "claims_timediff_lte" => {
                let Value::Object(pairs) = payload else {
                    return Self::Malformed;
                };
                let mut parsed = Vec::with_capacity(pairs.len());
                for (claim, max_age) in pairs {
                    match max_age.as_i64() {
                        Some(seconds) => parsed.push((claim.clone(), seconds)),
                        None => return Self::Malformed,
                    }
                }
                Self::ClaimsRecency(parsed)
            }
            _ => Self::Malformed,
        }
    }

    /// Returns `true` if this rule grants access to any authenticated
    /// identity without further evaluation: the empty condition, an empty
    /// `ALL`, or an object with no recognized operator.
    #[must_use]
    pub fn is_authenticated_only(&self) -> bool {
        match self {
            Self::Authenticated | Self::Unrecognized => true,
            Self::All(children) => children.is_empty(),
            _ => false,
        }
    }

    /// Returns `true` if evaluating this rule needs data the global
    /// pipeline check cannot see: path parameters (bound only inside the
    /// router) or caller-supplied context (available only to the handler).
    #[must_use]
    pub fn requires_request_data(&self) -> bool {
        match self {
            Self::Authenticated | Self::Unrecognized | Self::Malformed => false,
            Self::Not(child) => child.needs_request_data(),
            Self::All(children) | Self::Any(children) => {
                children.iter().any(RuleChild::needs_request_data)
            }
            Self::ClaimsEqual(pairs)
            | Self::ClaimsLte(pairs)
            | Self::ClaimsGte(pairs)
            | Self::ClaimsContains(pairs) => pairs
                .iter()
                .any(|(k, v)| k.needs_request_data() || v.needs_request_data()),
            // Recency always reads the identity's claims.
            Self::ClaimsRecency(_) => false,
        }
    }
}

impl<'de> Deserialize<'de> for RuleNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}
