//! Policy documents, the rule language, and the decision procedure.

pub mod context;
pub mod evaluator;
pub mod placeholder;
pub mod rule;
pub mod store;

pub use context::DecisionContext;
pub use evaluator::{Decision, Evaluator, GateOutcome};
pub use rule::{RuleChild, RuleNode};
pub use store::{PolicySnapshot, PolicyStats, PolicyStore};
