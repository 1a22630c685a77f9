//! String key-value storage backing the session stores.
//!
//! Mirrors the shape of a browser's `localStorage`/`sessionStorage` so the
//! same session code runs over an in-memory map in tests and native hosts, or
//! over a web storage binding.

use parking_lot::Mutex;
use std::collections::HashMap;

pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// Process-local storage. Contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items.lock().insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items.lock().remove(key);
    }
}
