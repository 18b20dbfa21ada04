//! The demo resource: a small in-memory item store.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub owner_id: String,
}

#[derive(Debug, Default)]
pub struct ItemStore {
    inner: RwLock<HashMap<String, Item>>,
}

impl ItemStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with a couple of items owned by known demo
    /// subjects.
    #[must_use]
    pub fn with_demo_data() -> Self {
        let store = Self::new();
        store.insert(Item {
            id: "1".into(),
            name: "alice's notebook".into(),
            owner_id: "alice".into(),
        });
        store.insert(Item {
            id: "2".into(),
            name: "bob's ledger".into(),
            owner_id: "bob".into(),
        });
        store
    }

    pub fn insert(&self, item: Item) {
        self.write().insert(item.id.clone(), item);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Item> {
        self.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Item> {
        self.write().remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Item>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Item>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}
