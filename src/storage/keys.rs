//! The set of keys the store accepts.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{KeyConfig, KeyShape};

/// Immutable whitelist of accepted keys, shared by every worker.
///
/// Cloning is cheap; all clones point at the same table.
#[derive(Debug, Clone)]
pub struct KeySet {
    shapes: Arc<HashMap<String, KeyShape>>,
    ordered: Arc<[String]>,
}

impl KeySet {
    /// Build the set from configuration entries. Later duplicates win.
    pub fn new(keys: &[KeyConfig]) -> Self {
        let mut shapes = HashMap::with_capacity(keys.len());
        let mut ordered = Vec::with_capacity(keys.len());
        for key in keys {
            if shapes.insert(key.name.clone(), key.shape).is_none() {
                ordered.push(key.name.clone());
            }
        }
        Self {
            shapes: Arc::new(shapes),
            ordered: ordered.into(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.shapes.contains_key(key)
    }

    pub fn shape(&self, key: &str) -> Option<KeyShape> {
        self.shapes.get(key).copied()
    }

    /// Default document for `key`, or `None` if the key is not accepted.
    pub fn default_document(&self, key: &str) -> Option<&'static str> {
        self.shape(key).map(KeyShape::default_document)
    }

    /// Keys in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

impl Default for KeySet {
    fn default() -> Self {
        Self::new(&crate::config::schema::default_keys())
    }
}
