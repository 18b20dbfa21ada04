//! Inputs to a policy decision.

use serde_json::{Map, Value};

use crate::identity::Identity;

/// Everything a decision can depend on: the request path, the verified
/// identity (if any), and the request-time data sources that placeholder
/// operands resolve against.
///
/// The global pipeline check builds one of these with empty `path_params`
/// and `context`; a deferred handler-side check rebuilds it with the bound
/// path parameters and any caller-supplied context object.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    path: String,
    identity: Option<Identity>,
    path_params: Value,
    context: Value,
}

impl DecisionContext {
    /// Starts a context for the given request path (relative to the
    /// service, before base-path prefixing).
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            identity: None,
            path_params: Value::Object(Map::new()),
            context: Value::Object(Map::new()),
        }
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    /// Sets the bound path parameters, as a flat JSON object of
    /// parameter name to string value.
    #[must_use]
    pub fn with_path_params(mut self, params: Value) -> Self {
        self.path_params = params;
        self
    }

    /// Sets the caller-supplied context object for `{context.*}` operands.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn path_params(&self) -> &Value {
        &self.path_params
    }

    #[must_use]
    pub fn context(&self) -> &Value {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_empty_objects() {
        let ctx = DecisionContext::new("/items/42");
        assert_eq!(ctx.path(), "/items/42");
        assert!(ctx.identity().is_none());
        assert_eq!(ctx.path_params(), &json!({}));
        assert_eq!(ctx.context(), &json!({}));
    }

    #[test]
    fn test_builder_sets_all_fields() {
        let identity = Identity::new(json!({"sub": "u1"}));
        let ctx = DecisionContext::new("/items/42")
            .with_identity(Some(identity))
            .with_path_params(json!({"id": "42"}))
            .with_context(json!({"resource": {"owner_id": "u1"}}));
        assert_eq!(ctx.identity().unwrap().subject(), Some("u1"));
        assert_eq!(ctx.path_params()["id"], "42");
        assert_eq!(ctx.context()["resource"]["owner_id"], "u1");
    }
}
