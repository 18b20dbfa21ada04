//! Policy document loading and the swappable in-memory snapshot.
//!
//! Two JSON documents back the store: a public path list (an array of
//! regex strings matched against the full request path) and a rule mapping
//! (an object from path pattern to rule, checked in document order with
//! first match winning). Both are compiled once at load time into a
//! [`PolicySnapshot`] held behind an [`ArcSwap`], so request-path lookups
//! are lock-free and a reload swaps the whole snapshot atomically.
//!
//! Loading never panics and never leaves the previous snapshot half
//! replaced. A document that cannot be read or parsed degrades to empty,
//! which fails closed: no path is public and every path is unconfigured.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::config::AuthzConfig;
use super::rule::RuleNode;

/// A path pattern compiled for full-match semantics.
#[derive(Debug)]
struct CompiledPattern {
    regex: Regex,
}

impl CompiledPattern {
    /// Anchors the pattern so it must match the entire path, with the
    /// base path prepended as a literal prefix.
    fn compile(base_path: &str, pattern: &str) -> Result<Self, regex::Error> {
        let anchored = format!(r"\A(?:{}{})\z", regex::escape(base_path), pattern);
        Ok(Self {
            regex: Regex::new(&anchored)?,
        })
    }

    fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Counts and health flags for the currently loaded policy documents.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PolicyStats {
    pub public_patterns: usize,
    pub rule_patterns: usize,
    /// True when the public list could not be read, parsed, or fully
    /// compiled and is serving a reduced (possibly empty) set.
    pub public_degraded: bool,
    /// Same, for the rule mapping.
    pub rules_degraded: bool,
}

/// An immutable, compiled view of both policy documents.
#[derive(Debug)]
pub struct PolicySnapshot {
    public: Vec<CompiledPattern>,
    rules: Vec<(CompiledPattern, RuleNode)>,
    public_degraded: bool,
    rules_degraded: bool,
}

impl PolicySnapshot {
    /// A snapshot with no public paths and no rules. Every request
    /// through it is denied as unconfigured.
    fn empty() -> Self {
        Self {
            public: Vec::new(),
            rules: Vec::new(),
            public_degraded: false,
            rules_degraded: false,
        }
    }

    /// Returns `true` when the full path matches a public pattern.
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.public.iter().any(|p| p.matches(path))
    }

    /// Returns the first rule whose pattern fully matches the path,
    /// in document order.
    #[must_use]
    pub fn find_rule(&self, path: &str) -> Option<&RuleNode> {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.matches(path))
            .map(|(_, rule)| rule)
    }

    #[must_use]
    pub fn stats(&self) -> PolicyStats {
        PolicyStats {
            public_patterns: self.public.len(),
            rule_patterns: self.rules.len(),
            public_degraded: self.public_degraded,
            rules_degraded: self.rules_degraded,
        }
    }
}

/// Owns the snapshot and knows how to rebuild it from disk.
#[derive(Debug)]
pub struct PolicyStore {
    public_path: PathBuf,
    rules_path: PathBuf,
    base_path: String,
    snapshot: ArcSwap<PolicySnapshot>,
}

impl PolicyStore {
    /// Builds a store and performs the initial load. Document problems
    /// are logged and degrade to empty rather than failing startup.
    #[must_use]
    pub fn load(config: &AuthzConfig) -> Self {
        let store = Self {
            public_path: config.public_map_path.clone(),
            rules_path: config.rule_map_path.clone(),
            base_path: config.base_path.clone(),
            snapshot: ArcSwap::from_pointee(PolicySnapshot::empty()),
        };
        store.reload();
        store
    }

    /// The current compiled snapshot. Cheap to call per request.
    #[must_use]
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.snapshot.load_full()
    }

    /// Re-reads both documents and swaps the snapshot in atomically.
    /// Returns the stats of the snapshot now being served.
    pub fn reload(&self) -> PolicyStats {
        let (public, public_degraded) = self.load_public();
        let (rules, rules_degraded) = self.load_rules();
        let next = PolicySnapshot {
            public,
            rules,
            public_degraded,
            rules_degraded,
        };
        let stats = next.stats();
        self.snapshot.store(Arc::new(next));
        tracing::info!(
            public_patterns = stats.public_patterns,
            rule_patterns = stats.rule_patterns,
            public_degraded = stats.public_degraded,
            rules_degraded = stats.rules_degraded,
            "policy snapshot loaded"
        );
        stats
    }

    fn load_public(&self) -> (Vec<CompiledPattern>, bool) {
        let raw = match read_document(&self.public_path, "public path list") {
            Some(raw) => raw,
            None => return (Vec::new(), true),
        };
        let entries: Vec<String> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(
                    path = %self.public_path.display(),
                    %error,
                    "public path list is not a JSON array of strings, serving empty"
                );
                return (Vec::new(), true);
            }
        };
        let mut compiled = Vec::with_capacity(entries.len());
        let mut degraded = false;
        for entry in &entries {
            match CompiledPattern::compile(&self.base_path, entry) {
                Ok(pattern) => compiled.push(pattern),
                Err(error) => {
                    degraded = true;
                    tracing::warn!(pattern = %entry, %error, "skipping invalid public pattern");
                }
            }
        }
        (compiled, degraded)
    }

    fn load_rules(&self) -> (Vec<(CompiledPattern, RuleNode)>, bool) {
        let raw = match read_document(&self.rules_path, "rule mapping") {
            Some(raw) => raw,
            None => return (Vec::new(), true),
        };
        // serde_json is built with preserve_order here: a rule mapping is
        // checked first match wins, so document order is semantics.
        let document: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(
                    path = %self.rules_path.display(),
                    %error,
                    "rule mapping is not valid JSON, serving empty"
                );
                return (Vec::new(), true);
            }
        };
        let Value::Object(entries) = document else {
            tracing::warn!(
                path = %self.rules_path.display(),
                "rule mapping is not a JSON object, serving empty"
            );
            return (Vec::new(), true);
        };
        let mut compiled = Vec::with_capacity(entries.len());
        let mut degraded = false;
        for (pattern, rule) in &entries {
            match CompiledPattern::compile(&self.base_path, pattern) {
                Ok(compiled_pattern) => {
                    compiled.push((compiled_pattern, RuleNode::from_value(rule)));
                }
                Err(error) => {
                    degraded = true;
                    tracing::warn!(pattern = %pattern, %error, "skipping invalid rule pattern");
                }
            }
        }
        (compiled, degraded)
    }
}

fn read_document(path: &Path, kind: &str) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(raw) => Some(raw),
        Err(error) => {
            tracing::warn!(path = %path.display(), kind, %error, "policy document unreadable, serving empty");
            None
        }
    }
}
