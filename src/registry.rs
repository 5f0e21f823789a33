//! Side-table associating published diagnostics with the raw findings that
//! produced them, so quick fixes can recover the suggested replacement text.
//!
//! Diagnostics have no useful value identity once they round-trip through the
//! client, so each one is keyed by an opaque id minted at creation and carried
//! in the diagnostic's `data` field. Entries whose diagnostics are no longer
//! published may linger until the next sweep; removal is advisory cleanup,
//! never required for correctness.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;
use tower_lsp::lsp_types::Diagnostic;

use crate::findings::Finding;

#[derive(Debug, Default)]
pub struct FindingRegistry {
    entries: RwLock<HashMap<u64, Finding>>,
    next_id: AtomicU64,
}

impl FindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a finding and returns the id to embed in its diagnostic.
    pub fn insert(&self, finding: Finding) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .write()
            .expect("Registry: lock poisoned")
            .insert(id, finding);
        id
    }

    pub fn get(&self, id: u64) -> Option<Finding> {
        self.entries
            .read()
            .expect("Registry: lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn remove(&self, id: u64) {
        self.entries
            .write()
            .expect("Registry: lock poisoned")
            .remove(&id);
    }

    /// Sweeps entries whose diagnostics were replaced or dropped.
    pub fn remove_all(&self, ids: &[u64]) {
        if ids.is_empty() {
            return;
        }
        let mut entries = self.entries.write().expect("Registry: lock poisoned");
        for id in ids {
            entries.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("Registry: lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Attaches a registry id to a diagnostic's `data` field.
pub fn tag_diagnostic(diagnostic: &mut Diagnostic, id: u64) {
    diagnostic.data = Some(json!(id));
}

/// Reads the registry id back out of a diagnostic, if it carries one.
/// Clients round-trip `data` untouched, so this survives the trip through
/// the code-action context.
pub fn diagnostic_id(diagnostic: &Diagnostic) -> Option<u64> {
    diagnostic.data.as_ref().and_then(|d| d.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(id: &str) -> Finding {
        serde_json::from_str(&format!(r#"{{"id": "{id}"}}"#)).expect("valid finding")
    }

    #[test]
    fn insert_then_get_round_trips() {
        let registry = FindingRegistry::new();
        let a = registry.insert(finding("a"));
        let b = registry.insert(finding("b"));
        assert_ne!(a, b);
        assert_eq!(registry.get(a).expect("present").id, "a");
        assert_eq!(registry.get(b).expect("present").id, "b");
        assert_eq!(registry.get(9999), None);
    }

    #[test]
    fn remove_all_sweeps_only_named_ids() {
        let registry = FindingRegistry::new();
        let a = registry.insert(finding("a"));
        let b = registry.insert(finding("b"));
        let c = registry.insert(finding("c"));
        registry.remove_all(&[a, c]);
        assert_eq!(registry.get(a), None);
        assert!(registry.get(b).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn diagnostic_id_round_trips_through_data() {
        let mut diagnostic = Diagnostic::default();
        assert_eq!(diagnostic_id(&diagnostic), None);
        tag_diagnostic(&mut diagnostic, 42);
        assert_eq!(diagnostic_id(&diagnostic), Some(42));
    }
}
