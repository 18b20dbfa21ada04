//! Hot reload of policy documents.
//!
//! Watches the directories containing the two policy files and reloads
//! the store when either changes. Directories rather than files, because
//! editors and deploy tools replace files atomically and the original
//! inode stops receiving events.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use routeguard_authz::{AuthzConfig, PolicyStore};

const DEBOUNCE: Duration = Duration::from_millis(300);

/// Starts watching the policy documents. The returned debouncer must be
/// kept alive for as long as reloads should happen.
pub fn spawn_policy_watcher(
    config: &AuthzConfig,
    store: Arc<PolicyStore>,
) -> Result<Debouncer<RecommendedWatcher>, notify::Error> {
    let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| match result {
        Ok(events) => {
            tracing::debug!(count = events.len(), "policy file change detected");
            store.reload();
        }
        Err(error) => {
            tracing::warn!(%error, "policy watcher error");
        }
    })?;

    for dir in watch_dirs(config) {
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(dir = %dir.display(), "watching policy directory");
    }
    Ok(debouncer)
}

fn watch_dirs(config: &AuthzConfig) -> BTreeSet<PathBuf> {
    [&config.public_map_path, &config.rule_map_path]
        .into_iter()
        .map(|p| parent_dir(p))
        .collect()
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
