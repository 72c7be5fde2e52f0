//! Purpose: Late-bound, append-only registry mapping field names to column indices.
//! Exports: `Field`, `FieldRegistry`, `FieldSnapshot`.
//! Role: Shared schema for every record a table stores; grows as producers add fields.
//! Invariants: A field's index equals its position in assignment order and never changes.
//! Invariants: Concurrent first-time resolution of one name inserts it exactly once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Field {
    name: Arc<str>,
    index: usize,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    by_name: HashMap<Arc<str>, usize>,
    fields: Vec<Field>,
}

#[derive(Debug, Default)]
pub struct FieldRegistry {
    state: RwLock<RegistryState>,
    len: AtomicUsize,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index for `name`, assigning the next free index on first sight.
    pub fn resolve(&self, name: &str) -> usize {
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(index) = state.by_name.get(name) {
                return *index;
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        // Another writer may have inserted between the two locks.
        if let Some(index) = state.by_name.get(name) {
            return *index;
        }
        let index = state.fields.len();
        let name: Arc<str> = Arc::from(name);
        state.by_name.insert(Arc::clone(&name), index);
        state.fields.push(Field { name, index });
        self.len.store(state.fields.len(), Ordering::Release);
        tracing::debug!(field = %state.fields[index].name, index, "registered field");
        index
    }

    pub fn get(&self, name: &str) -> Option<Field> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .by_name
            .get(name)
            .map(|index| state.fields[*index].clone())
    }

    /// Number of registered fields, readable without taking the lock.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        FieldSnapshot {
            fields: state.fields.clone(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|field| field.name().to_string())
            .collect()
    }
}

/// Ordered copy of the registry taken at one instant.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FieldSnapshot {
    fields: Vec<Field>,
}

impl FieldSnapshot {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }
}

impl<'a> IntoIterator for &'a FieldSnapshot {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
