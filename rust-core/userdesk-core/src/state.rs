//! # Application State
//!
//! Type-keyed registry of app-scoped dependencies (database pool, token
//! issuer, ...). The server clones it into every request so handlers can
//! resolve what they need.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe registry keyed by type
///
/// Values are cloned out on `get`, so store cheap handles (`Arc`, pools).
#[derive(Clone, Default)]
pub struct TypeState {
    data: Arc<RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
}

impl TypeState {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous value of the same type
    pub fn set<T: Send + Sync + 'static>(&self, value: T) {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Clone of the value stored for `T`
    #[must_use]
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
    }

    /// Whether a value is stored for `T`
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.contains_key(&TypeId::of::<T>())
    }

    /// Number of stored values
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TypeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeState").field("len", &self.len()).finish()
    }
}
