//! Placeholder parsing and resolution.
//!
//! Rule operands are either literal JSON scalars or placeholder strings of
//! the form `{scope.path.to.field}` with `scope` one of `user`, `path` or
//! `context`. Resolution is a dotted traversal into the corresponding JSON
//! object. A missing key, traversal through a non-object, or an unknown
//! scope resolves to [`Resolved::Absent`] — distinct from a present JSON
//! `null`, although both compare unequal to any concrete value.

use serde_json::Value;

/// The data scope a placeholder reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Verified identity claims.
    User,
    /// Request path parameters bound by the router.
    Path,
    /// Caller-supplied context (e.g. a loaded business record).
    Context,
}

impl Scope {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "user" => Some(Self::User),
            "path" => Some(Self::Path),
            "context" => Some(Self::Context),
            _ => None,
        }
    }
}

/// A parsed rule operand: a placeholder or a literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A `{scope.a.b}` placeholder.
    Placeholder {
        /// Scope to resolve against.
        scope: Scope,
        /// Dotted path segments after the scope.
        segments: Vec<String>,
    },
    /// A placeholder naming an unknown scope; always resolves to absent.
    Unresolvable,
    /// A literal value taken verbatim from the rule document.
    Literal(Value),
}

impl Operand {
    /// Parses an operand from a rule-document value.
    ///
    /// Only strings of the form `{...}` become placeholders; everything
    /// else is a literal.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::from_str_spec(s),
            other => Self::Literal(other.clone()),
        }
    }

    /// Parses an operand from a rule-document mapping key.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        Self::from_str_spec(key)
    }

    fn from_str_spec(spec: &str) -> Self {
        let Some(inner) = spec
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
        else {
            return Self::Literal(Value::String(spec.to_string()));
        };

        let mut parts = inner.split('.');
        // split always yields at least one item
        let scope_name = parts.next().unwrap_or_default();
        match Scope::from_name(scope_name) {
            Some(scope) => Self::Placeholder {
                scope,
                segments: parts.map(ToString::to_string).collect(),
            },
            None => Self::Unresolvable,
        }
    }

    /// Returns the scope if this operand is a placeholder.
    #[must_use]
    pub fn scope(&self) -> Option<Scope> {
        match self {
            Self::Placeholder { scope, .. } => Some(*scope),
            _ => None,
        }
    }

    /// Returns `true` if resolving this operand needs data the global
    /// request-pipeline check cannot see (path parameters or caller context).
    #[must_use]
    pub fn needs_request_data(&self) -> bool {
        matches!(self.scope(), Some(Scope::Path | Scope::Context))
    }

    /// Resolves the operand against the three data scopes.
    #[must_use]
    pub fn resolve<'a>(&'a self, scopes: &EvalScopes<'a>) -> Resolved<'a> {
        match self {
            Self::Literal(value) => Resolved::Value(value),
            Self::Unresolvable => Resolved::Absent,
            Self::Placeholder { scope, segments } => {
                let mut current = match scope {
                    Scope::User => scopes.user,
                    Scope::Path => scopes.path_params,
                    Scope::Context => scopes.context,
                };
                for segment in segments {
                    match current.get(segment.as_str()) {
                        Some(next) => current = next,
                        None => return Resolved::Absent,
                    }
                }
                Resolved::Value(current)
            }
        }
    }
}

/// The three data scopes a placeholder can read from during one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvalScopes<'a> {
    /// Identity claims (empty object when resolving without an identity).
    pub user: &'a Value,
    /// Request path parameters.
    pub path_params: &'a Value,
    /// Caller-supplied context.
    pub context: &'a Value,
}

/// The result of resolving an operand.
///
/// `Absent` is distinct from `Value(Null)`: a claim that is present but
/// null resolves to the latter. Both fail comparisons against concrete
/// values; [`Resolved::concrete`] collapses them for comparison purposes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    /// The placeholder pointed at nothing.
    Absent,
    /// A resolved (or literal) value.
    Value(&'a Value),
}

impl<'a> Resolved<'a> {
    /// Returns `true` if nothing was resolved.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The resolved value unless absent or JSON null.
    #[must_use]
    pub fn concrete(&self) -> Option<&'a Value> {
        match self {
            Self::Value(v) if !v.is_null() => Some(v),
            _ => None,
        }
    }

    /// The resolved value as a number, widening integers to f64.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        self.concrete().and_then(Value::as_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scopes<'a>(user: &'a Value, path: &'a Value, context: &'a Value) -> EvalScopes<'a> {
        EvalScopes {
            user,
            path_params: path,
            context,
        }
    }

    #[test]
    fn test_literal_passthrough() {
        let op = Operand::from_value(&json!(42));
        assert_eq!(op, Operand::Literal(json!(42)));

        let op = Operand::from_value(&json!("plain-string"));
        assert_eq!(op, Operand::Literal(json!("plain-string")));

        // Braces must wrap the whole string to count as a placeholder.
        let op = Operand::from_value(&json!("prefix{user.sub}"));
        assert!(matches!(op, Operand::Literal(_)));
    }

    #[test]
    fn test_user_scope_resolution() {
        let user = json!({"sub": "u1", "profile": {"level": 3}});
        let empty = json!({});
        let s = scopes(&user, &empty, &empty);

        let op = Operand::from_key("{user.sub}");
        assert_eq!(op.resolve(&s), Resolved::Value(&json!("u1")));

        let op = Operand::from_key("{user.profile.level}");
        assert_eq!(op.resolve(&s), Resolved::Value(&json!(3)));
    }

    #[test]
    fn test_missing_key_is_absent() {
        let user = json!({"sub": "u1"});
        let empty = json!({});
        let s = scopes(&user, &empty, &empty);

        let op = Operand::from_key("{user.missing}");
        assert!(op.resolve(&s).is_absent());

        // Traversal through a non-object is absent, not an error.
        let op = Operand::from_key("{user.sub.deeper}");
        assert!(op.resolve(&s).is_absent());
    }

    #[test]
    fn test_unknown_scope_is_absent() {
        let empty = json!({});
        let s = scopes(&empty, &empty, &empty);

        let op = Operand::from_key("{env.hostname}");
        assert_eq!(op, Operand::Unresolvable);
        assert!(op.resolve(&s).is_absent());
    }

    #[test]
    fn test_null_is_present_but_not_concrete() {
        let user = json!({"mfa_at": null});
        let empty = json!({});
        let s = scopes(&user, &empty, &empty);

        let op = Operand::from_key("{user.mfa_at}");
        let resolved = op.resolve(&s);
        assert!(!resolved.is_absent());
        assert!(resolved.concrete().is_none());
    }

    #[test]
    fn test_path_and_context_scopes() {
        let empty = json!({});
        let path = json!({"user_id": "u7"});
        let context = json!({"resource": {"owner_id": "u7"}});
        let s = scopes(&empty, &path, &context);

        let op = Operand::from_key("{path.user_id}");
        assert_eq!(op.resolve(&s), Resolved::Value(&json!("u7")));
        assert!(op.needs_request_data());

        let op = Operand::from_key("{context.resource.owner_id}");
        assert_eq!(op.resolve(&s), Resolved::Value(&json!("u7")));
        assert!(op.needs_request_data());

        let op = Operand::from_key("{user.sub}");
        assert!(!op.needs_request_data());
    }

    #[test]
    fn test_scope_alone_resolves_whole_object() {
        let user = json!({"sub": "u1"});
        let empty = json!({});
        let s = scopes(&user, &empty, &empty);

        let op = Operand::from_key("{user}");
        assert_eq!(op.resolve(&s), Resolved::Value(&user));
    }

    #[test]
    fn test_number_widening() {
        let user = json!({"int": 3, "float": 3.5});
        let empty = json!({});
        let s = scopes(&user, &empty, &empty);

        assert_eq!(
            Operand::from_key("{user.int}").resolve(&s).as_number(),
            Some(3.0)
        );
        assert_eq!(
            Operand::from_key("{user.float}").resolve(&s).as_number(),
            Some(3.5)
        );
        assert_eq!(
            Operand::from_key("{user.missing}").resolve(&s).as_number(),
            None
        );
    }
}
