//! The decision procedure.
//!
//! Order of checks for a request path: public list first (an anonymous
//! request to a public path is allowed without looking at credentials),
//! then authentication, then rule lookup. A path with no matching rule is
//! denied as unconfigured. A matching rule either grants on authentication
//! alone, evaluates immediately, or is deferred to the handler when it
//! reads data only the handler can supply.
//!
//! Every comparison fails closed: absent or null operands, non-numeric
//! sides of an ordering, and malformed rule shapes all evaluate to false.

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;

use crate::error::{AuthzError, DenyKind};
use crate::identity::{Identity, RoleSet};
use super::context::DecisionContext;
use super::placeholder::{EvalScopes, Operand};
use super::rule::{RuleChild, RuleNode};
use super::store::PolicyStore;

/// The final verdict for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyKind),
}

impl Decision {
    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Outcome of the global pipeline check, before path parameters are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Allow,
    Deny(DenyKind),
    /// The matched rule reads path parameters or caller context, which the
    /// pipeline cannot see. The handler must complete the check.
    Deferred,
}

/// Evaluates rules against the current policy snapshot.
#[derive(Debug, Clone)]
pub struct Evaluator {
    store: Arc<PolicyStore>,
    client_id: String,
}

impl Evaluator {
    #[must_use]
    pub fn new(store: Arc<PolicyStore>, client_id: impl Into<String>) -> Self {
        Self {
            store,
            client_id: client_id.into(),
        }
    }

    /// The underlying store, for reload and stats surfaces.
    #[must_use]
    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// The pipeline-phase check. Identical to [`Evaluator::decide`] except
    /// that a rule needing request data yields [`GateOutcome::Deferred`]
    /// instead of being evaluated against empty scopes.
    #[must_use]
    pub fn preflight(&self, ctx: &DecisionContext) -> GateOutcome {
        let snapshot = self.store.snapshot();
        if snapshot.is_public(ctx.path()) {
            return GateOutcome::Allow;
        }
        let Some(identity) = ctx.identity() else {
            return GateOutcome::Deny(DenyKind::Unauthenticated);
        };
        let Some(rule) = snapshot.find_rule(ctx.path()) else {
            tracing::debug!(path = ctx.path(), "no rule configured for path");
            return GateOutcome::Deny(DenyKind::Unconfigured);
        };
        if rule.is_authenticated_only() {
            return GateOutcome::Allow;
        }
        if rule.requires_request_data() {
            return GateOutcome::Deferred;
        }
        if self.evaluate(rule, identity, ctx, now_unix()) {
            GateOutcome::Allow
        } else {
            GateOutcome::Deny(DenyKind::InsufficientPermissions)
        }
    }

    /// The complete check, with all request data in the context.
    #[must_use]
    pub fn decide(&self, ctx: &DecisionContext) -> Decision {
        self.decide_at(ctx, now_unix())
    }

    /// [`Evaluator::decide`] with an explicit clock, for recency rules.
    #[must_use]
    pub fn decide_at(&self, ctx: &DecisionContext, now: i64) -> Decision {
        let snapshot = self.store.snapshot();
        if snapshot.is_public(ctx.path()) {
            return Decision::Allow;
        }
        let Some(identity) = ctx.identity() else {
            return Decision::Deny(DenyKind::Unauthenticated);
        };
        let Some(rule) = snapshot.find_rule(ctx.path()) else {
            tracing::debug!(path = ctx.path(), "no rule configured for path");
            return Decision::Deny(DenyKind::Unconfigured);
        };
        if rule.is_authenticated_only() || self.evaluate(rule, identity, ctx, now) {
            Decision::Allow
        } else {
            tracing::debug!(path = ctx.path(), subject = identity.subject(), "rule not satisfied");
            Decision::Deny(DenyKind::InsufficientPermissions)
        }
    }

    /// [`Evaluator::decide`] as a `Result`, for call sites that propagate
    /// denials as errors.
    pub fn check(&self, ctx: &DecisionContext) -> Result<(), AuthzError> {
        match self.decide(ctx) {
            Decision::Allow => Ok(()),
            Decision::Deny(kind) => Err(kind.into()),
        }
    }

    fn evaluate(&self, rule: &RuleNode, identity: &Identity, ctx: &DecisionContext, now: i64) -> bool {
        let roles = identity.role_set(&self.client_id);
        let scopes = EvalScopes {
            user: identity.claims(),
            path_params: ctx.path_params(),
            context: ctx.context(),
        };
        eval_node(rule, &roles, &scopes, now)
    }
}

fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

fn eval_node(node: &RuleNode, roles: &RoleSet, scopes: &EvalScopes<'_>, now: i64) -> bool {
    match node {
        RuleNode::Authenticated => true,
        // Only authenticated-only at the top of a rule mapping, which the
        // caller short-circuits. Nested, an unknown shape grants nothing.
        RuleNode::Unrecognized | RuleNode::Malformed => false,
        RuleNode::Not(child) => !eval_child(child, roles, scopes, now),
        RuleNode::All(children) => children.iter().all(|c| eval_child(c, roles, scopes, now)),
        RuleNode::Any(children) => children.iter().any(|c| eval_child(c, roles, scopes, now)),
        RuleNode::ClaimsEqual(pairs) => pairs
            .iter()
            .all(|(left, right)| eval_equal(left, right, scopes)),
        RuleNode::ClaimsLte(pairs) => pairs
            .iter()
            .all(|(left, right)| eval_ordering(left, right, scopes, |l, r| l <= r)),
        RuleNode::ClaimsGte(pairs) => pairs
            .iter()
            .all(|(left, right)| eval_ordering(left, right, scopes, |l, r| l >= r)),
        RuleNode::ClaimsContains(pairs) => pairs
            .iter()
            .all(|(left, right)| eval_contains(left, right, scopes)),
        RuleNode::ClaimsRecency(pairs) => pairs
            .iter()
            .all(|(claim, max_age)| eval_recency(claim, *max_age, scopes, now)),
    }
}

fn eval_child(child: &RuleChild, roles: &RoleSet, scopes: &EvalScopes<'_>, now: i64) -> bool {
    match child {
        RuleChild::Role(role) => roles.contains(role),
        RuleChild::Node(node) => eval_node(node, roles, scopes, now),
    }
}

/// Equality requires both sides to be concrete. Two absent or null sides
/// are not "equal unknowns"; they fail the check.
fn eval_equal(left: &Operand, right: &Operand, scopes: &EvalScopes<'_>) -> bool {
    let (Some(left), Some(right)) = (
        left.resolve(scopes).concrete(),
        right.resolve(scopes).concrete(),
    ) else {
        return false;
    };
    values_equal(left, right)
}

fn eval_ordering(
    left: &Operand,
    right: &Operand,
    scopes: &EvalScopes<'_>,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    let (Some(left), Some(right)) = (
        left.resolve(scopes).as_number(),
        right.resolve(scopes).as_number(),
    ) else {
        return false;
    };
    cmp(left, right)
}

fn eval_contains(left: &Operand, right: &Operand, scopes: &EvalScopes<'_>) -> bool {
    let (Some(haystack), Some(needle)) = (
        left.resolve(scopes).concrete(),
        right.resolve(scopes).concrete(),
    ) else {
        return false;
    };
    let Value::Array(items) = haystack else {
        return false;
    };
    items.iter().any(|item| values_equal(item, needle))
}

/// The claim must be an integer Unix timestamp no more than `max_age`
/// seconds before `now`. Fractional or non-numeric claims fail closed.
fn eval_recency(claim: &str, max_age: i64, scopes: &EvalScopes<'_>, now: i64) -> bool {
    let mut current = scopes.user;
    for segment in claim.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return false,
        }
    }
    let Some(timestamp) = current.as_i64() else {
        return false;
    };
    now - timestamp <= max_age
}

/// JSON equality with integers widened, so a claim of `3` matches a rule
/// literal of `3.0`.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthzConfig;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        evaluator: Evaluator,
    }

    fn fixture(public: &str, rules: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let public_path = dir.path().join("public.map.json");
        let rules_path = dir.path().join("authz.map.json");
        fs::write(&public_path, public).unwrap();
        fs::write(&rules_path, rules).unwrap();
        let store = Arc::new(PolicyStore::load(&AuthzConfig {
            public_map_path: public_path,
            rule_map_path: rules_path,
            ..AuthzConfig::default()
        }));
        Fixture {
            _dir: dir,
            evaluator: Evaluator::new(store, "demo-client"),
        }
    }

    fn user(claims: Value) -> Option<Identity> {
        Some(Identity::new(claims))
    }

    fn with_roles(roles: &[&str]) -> Option<Identity> {
        user(json!({"sub": "u1", "realm_access": {"roles": roles}}))
    }

    #[test]
    fn test_public_path_allows_anonymous() {
        let f = fixture(r#"["/healthz"]"#, "{}");
        let ctx = DecisionContext::new("/healthz");
        assert_eq!(f.evaluator.decide(&ctx), Decision::Allow);
        assert_eq!(f.evaluator.preflight(&ctx), GateOutcome::Allow);
    }

    #[test]
    fn test_anonymous_non_public_is_unauthenticated() {
        let f = fixture("[]", r#"{"/dashboard": {}}"#);
        let ctx = DecisionContext::new("/dashboard");
        assert_eq!(
            f.evaluator.decide(&ctx),
            Decision::Deny(DenyKind::Unauthenticated)
        );
    }

    #[test]
    fn test_unconfigured_path_is_denied() {
        let f = fixture("[]", r#"{"/dashboard": {}}"#);
        let ctx = DecisionContext::new("/somewhere-else").with_identity(user(json!({"sub": "u1"})));
        assert_eq!(
            f.evaluator.decide(&ctx),
            Decision::Deny(DenyKind::Unconfigured)
        );
    }

    #[test]
    fn test_authenticated_only_rules() {
        let f = fixture(
            "[]",
            r#"{"/a": {}, "/b": {"ALL": []}, "/c": {"unknown_op": 1}}"#,
        );
        for path in ["/a", "/b", "/c"] {
            let ctx = DecisionContext::new(path).with_identity(user(json!({"sub": "u1"})));
            assert_eq!(f.evaluator.decide(&ctx), Decision::Allow, "path {path}");
        }
    }

    #[test]
    fn test_role_conjunction_and_disjunction() {
        let f = fixture(
            "[]",
            r#"{
                "/both": {"ALL": ["reader", "writer"]},
                "/either": {"ANY": ["reader", "writer"]}
            }"#,
        );
        let reader = || DecisionContext::new("/both").with_identity(with_roles(&["reader"]));
        assert_eq!(
            f.evaluator.decide(&reader()),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );

        let both = DecisionContext::new("/both").with_identity(with_roles(&["reader", "writer"]));
        assert_eq!(f.evaluator.decide(&both), Decision::Allow);

        let either = DecisionContext::new("/either").with_identity(with_roles(&["writer"]));
        assert_eq!(f.evaluator.decide(&either), Decision::Allow);
    }

    #[test]
    fn test_client_roles_count_toward_role_set() {
        let f = fixture("[]", r#"{"/x": {"ALL": ["operator"]}}"#);
        let ctx = DecisionContext::new("/x").with_identity(user(json!({
            "sub": "u1",
            "resource_access": {"demo-client": {"roles": ["operator"]}}
        })));
        assert_eq!(f.evaluator.decide(&ctx), Decision::Allow);

        // Roles under some other client id do not count.
        let ctx = DecisionContext::new("/x").with_identity(user(json!({
            "sub": "u1",
            "resource_access": {"other-client": {"roles": ["operator"]}}
        })));
        assert_eq!(
            f.evaluator.decide(&ctx),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );
    }

    #[test]
    fn test_negation() {
        let f = fixture("[]", r#"{"/x": {"NOT": "banned"}}"#);
        let ok = DecisionContext::new("/x").with_identity(with_roles(&["reader"]));
        assert_eq!(f.evaluator.decide(&ok), Decision::Allow);

        let banned = DecisionContext::new("/x").with_identity(with_roles(&["banned"]));
        assert_eq!(
            f.evaluator.decide(&banned),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );
    }

    #[test]
    fn test_claims_equality_with_placeholders() {
        let f = fixture(
            "[]",
            r#"{"/users/[^/]+": {"claims": {"{user.sub}": "{path.user_id}"}}}"#,
        );
        let ctx = DecisionContext::new("/users/u1")
            .with_identity(user(json!({"sub": "u1"})))
            .with_path_params(json!({"user_id": "u1"}));
        assert_eq!(f.evaluator.decide(&ctx), Decision::Allow);

        let other = DecisionContext::new("/users/u2")
            .with_identity(user(json!({"sub": "u1"})))
            .with_path_params(json!({"user_id": "u2"}));
        assert_eq!(
            f.evaluator.decide(&other),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );
    }

    #[test]
    fn test_equality_fails_when_either_side_is_absent_or_null() {
        let f = fixture(
            "[]",
            r#"{"/x": {"claims": {"{user.department}": "{context.department}"}}}"#,
        );
        // Both sides absent: still a denial, never "equal unknowns".
        let ctx = DecisionContext::new("/x").with_identity(user(json!({"sub": "u1"})));
        assert_eq!(
            f.evaluator.decide(&ctx),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );

        // Both sides present but null: same.
        let ctx = DecisionContext::new("/x")
            .with_identity(user(json!({"sub": "u1", "department": null})))
            .with_context(json!({"department": null}));
        assert_eq!(
            f.evaluator.decide(&ctx),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );
    }

    #[test]
    fn test_numeric_ordering_and_widening() {
        let f = fixture(
            "[]",
            r#"{
                "/clearance": {"claims_gte": {"{user.clearance}": 3}},
                "/quota": {"claims_lte": {"{user.usage}": "{context.limit}"}}
            }"#,
        );
        let ctx = DecisionContext::new("/clearance")
            .with_identity(user(json!({"sub": "u1", "clearance": 3.0})));
        assert_eq!(f.evaluator.decide(&ctx), Decision::Allow);

        let ctx = DecisionContext::new("/clearance")
            .with_identity(user(json!({"sub": "u1", "clearance": 2})));
        assert_eq!(
            f.evaluator.decide(&ctx),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );

        // Non-numeric side fails closed.
        let ctx = DecisionContext::new("/clearance")
            .with_identity(user(json!({"sub": "u1", "clearance": "high"})));
        assert_eq!(
            f.evaluator.decide(&ctx),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );

        let ctx = DecisionContext::new("/quota")
            .with_identity(user(json!({"sub": "u1", "usage": 7})))
            .with_context(json!({"limit": 10.5}));
        assert_eq!(f.evaluator.decide(&ctx), Decision::Allow);
    }

    #[test]
    fn test_claims_contains() {
        let f = fixture(
            "[]",
            r#"{"/groups": {"claims_contains": {"{user.groups}": "{context.required_group}"}}}"#,
        );
        let member = DecisionContext::new("/groups")
            .with_identity(user(json!({"sub": "u1", "groups": ["ops", "dev"]})))
            .with_context(json!({"required_group": "ops"}));
        assert_eq!(f.evaluator.decide(&member), Decision::Allow);

        let outsider = DecisionContext::new("/groups")
            .with_identity(user(json!({"sub": "u1", "groups": ["dev"]})))
            .with_context(json!({"required_group": "ops"}));
        assert_eq!(
            f.evaluator.decide(&outsider),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );

        // A non-array left side fails closed.
        let scalar = DecisionContext::new("/groups")
            .with_identity(user(json!({"sub": "u1", "groups": "ops"})))
            .with_context(json!({"required_group": "ops"}));
        assert_eq!(
            f.evaluator.decide(&scalar),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );
    }

    #[test]
    fn test_recency_with_fixed_clock() {
        let f = fixture("[]", r#"{"/sensitive": {"claims_timediff_lte": {"mfa_at": 300}}}"#);
        let now = 1_700_000_000;

        let fresh = DecisionContext::new("/sensitive")
            .with_identity(user(json!({"sub": "u1", "mfa_at": now - 120})));
        assert_eq!(f.evaluator.decide_at(&fresh, now), Decision::Allow);

        let stale = DecisionContext::new("/sensitive")
            .with_identity(user(json!({"sub": "u1", "mfa_at": now - 301})));
        assert_eq!(
            f.evaluator.decide_at(&stale, now),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );

        let missing = DecisionContext::new("/sensitive").with_identity(user(json!({"sub": "u1"})));
        assert_eq!(
            f.evaluator.decide_at(&missing, now),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );

        // The claim must be an integer timestamp; a fractional one denies.
        let fractional = DecisionContext::new("/sensitive")
            .with_identity(user(json!({"sub": "u1", "mfa_at": (now as f64) - 120.5})));
        assert_eq!(
            f.evaluator.decide_at(&fractional, now),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );
    }

    #[test]
    fn test_decide_is_idempotent() {
        let f = fixture(
            r#"["/healthz"]"#,
            r#"{
                "/both": {"ALL": ["reader", "writer"]},
                "/users/[^/]+": {"claims": {"{user.sub}": "{path.user_id}"}}
            }"#,
        );
        let contexts = [
            DecisionContext::new("/healthz"),
            DecisionContext::new("/both").with_identity(with_roles(&["reader"])),
            DecisionContext::new("/both").with_identity(with_roles(&["reader", "writer"])),
            DecisionContext::new("/users/u1")
                .with_identity(user(json!({"sub": "u1"})))
                .with_path_params(json!({"user_id": "u1"})),
            DecisionContext::new("/nowhere").with_identity(user(json!({"sub": "u1"}))),
        ];
        for ctx in &contexts {
            let first = f.evaluator.decide(ctx);
            let second = f.evaluator.decide(ctx);
            assert_eq!(first, second, "path {}", ctx.path());
        }
    }

    #[test]
    fn test_nested_composition() {
        let f = fixture(
            "[]",
            r#"{"/x": {"ANY": [
                "admin",
                {"ALL": ["reader", {"NOT": "suspended"}]}
            ]}}"#,
        );
        let admin = DecisionContext::new("/x").with_identity(with_roles(&["admin"]));
        assert_eq!(f.evaluator.decide(&admin), Decision::Allow);

        let reader = DecisionContext::new("/x").with_identity(with_roles(&["reader"]));
        assert_eq!(f.evaluator.decide(&reader), Decision::Allow);

        let suspended =
            DecisionContext::new("/x").with_identity(with_roles(&["reader", "suspended"]));
        assert_eq!(
            f.evaluator.decide(&suspended),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );
    }

    #[test]
    fn test_malformed_rule_always_denies() {
        let f = fixture("[]", r#"{"/x": {"ALL": "not an array"}}"#);
        let ctx = DecisionContext::new("/x").with_identity(with_roles(&["admin"]));
        assert_eq!(
            f.evaluator.decide(&ctx),
            Decision::Deny(DenyKind::InsufficientPermissions)
        );
    }

    #[test]
    fn test_preflight_defers_rules_needing_request_data() {
        let f = fixture(
            "[]",
            r#"{
                "/items/[^/]+": {"ANY": ["admin", {"claims": {"{user.sub}": "{context.resource.owner_id}"}}]},
                "/static": {"ALL": ["reader"]}
            }"#,
        );
        let ctx = DecisionContext::new("/items/42").with_identity(with_roles(&["reader"]));
        assert_eq!(f.evaluator.preflight(&ctx), GateOutcome::Deferred);

        // A deferred rule can still short-circuit at decide time.
        let admin = DecisionContext::new("/items/42").with_identity(with_roles(&["admin"]));
        assert_eq!(f.evaluator.decide(&admin), Decision::Allow);

        let plain = DecisionContext::new("/static").with_identity(with_roles(&["reader"]));
        assert_eq!(f.evaluator.preflight(&plain), GateOutcome::Allow);
    }

    #[test]
    fn test_check_maps_denials_to_errors() {
        let f = fixture("[]", r#"{"/x": {"ALL": ["admin"]}}"#);
        let ctx = DecisionContext::new("/x").with_identity(with_roles(&["reader"]));
        let err = f.evaluator.check(&ctx).unwrap_err();
        assert!(matches!(err, AuthzError::InsufficientPermissions));

        let public = fixture(r#"["/x"]"#, "{}");
        assert!(public.evaluator.check(&DecisionContext::new("/x")).is_ok());
    }
}
