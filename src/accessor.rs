//! Defaulting key/value access.
//!
//! Two operations are provided over a map:
//! - `get_or_default(key, fallback)` returns the stored value or `fallback`
//!   and never inserts;
//! - `increment_or_insert(key, fallback, delta)` adds `delta` to the stored
//!   value, or stores `fallback + delta` when the key is absent.
//!
//! [`DefaultingMapExt`] adds both to single-owner `HashMap`s.
//! [`InMemoryAccessor`] is the thread-safe store behind the
//! [`DefaultingAccessor`] trait; its read-modify-write runs under one write
//! lock, so concurrent increments never interleave.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::ops::Add;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::trace;

/// Defaulting operations for owned maps.
pub trait DefaultingMapExt<K, V> {
    /// Returns the value for `key`, or `fallback` if absent. Never inserts.
    fn get_or_default(&self, key: &K, fallback: V) -> V;

    /// Increments `key` by `delta`, starting from `fallback` if absent.
    /// Returns the stored result.
    ///
    /// # Panics
    /// Overflow behaves as `V::add` does: integer overflow panics in debug
    /// builds.
    fn increment_or_insert(&mut self, key: K, fallback: V, delta: V) -> V;

    /// Increments `key` by `delta` only if present.
    ///
    /// # Panics
    /// Overflow behaves as `V::add` does: integer overflow panics in debug
    /// builds.
    fn increment_existing(&mut self, key: &K, delta: V) -> Option<V>;
}

impl<K, V, H> DefaultingMapExt<K, V> for HashMap<K, V, H>
where
    K: Eq + Hash,
    V: Clone + Add<Output = V>,
    H: BuildHasher,
{
    fn get_or_default(&self, key: &K, fallback: V) -> V {
        self.get(key).cloned().unwrap_or(fallback)
    }

    fn increment_or_insert(&mut self, key: K, fallback: V, delta: V) -> V {
        match self.entry(key) {
            Entry::Occupied(mut entry) => {
                let next = entry.get().clone() + delta;
                entry.insert(next.clone());
                next
            }
            Entry::Vacant(entry) => {
                trace!("key absent; inserting from fallback");
                entry.insert(fallback + delta).clone()
            }
        }
    }

    fn increment_existing(&mut self, key: &K, delta: V) -> Option<V> {
        let slot = self.get_mut(key)?;
        *slot = slot.clone() + delta;
        Some(slot.clone())
    }
}

/// A shared key/value store with defaulting reads and atomic increments.
///
/// # Safety Considerations
/// - `increment_or_insert` must be atomic per key with respect to every
///   other caller of the same store
/// - `get_or_default` must never insert
pub trait DefaultingAccessor<K, V>: Send + Sync {
    /// Returns the value for `key`, or `fallback` if absent.
    fn get_or_default(&self, key: &K, fallback: V) -> V;

    /// Atomically increments `key` by `delta`, starting from `fallback` if
    /// absent. Returns the stored result.
    ///
    /// # Panics
    /// Overflow behaves as `V::add` does: integer overflow panics in debug
    /// builds.
    fn increment_or_insert(&self, key: K, fallback: V, delta: V) -> V;

    /// Atomically increments `key` by `delta` only if present.
    ///
    /// # Panics
    /// Overflow behaves as `V::add` does: integer overflow panics in debug
    /// builds.
    fn increment_existing(&self, key: &K, delta: V) -> Option<V>;
}

/// Thread-safe in-memory [`DefaultingAccessor`].
///
/// A poisoned lock is recovered rather than reported, because every
/// operation completes its map update before returning control to user code.
#[derive(Debug)]
pub struct InMemoryAccessor<K, V> {
    state: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for InMemoryAccessor<K, V> {
    fn default() -> Self {
        Self {
            state: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> From<HashMap<K, V>> for InMemoryAccessor<K, V> {
    fn from(map: HashMap<K, V>) -> Self {
        Self {
            state: RwLock::new(map),
        }
    }
}

impl<K, V> InMemoryAccessor<K, V> {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, V>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, V>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Consumes the store, returning the underlying map.
    pub fn into_inner(self) -> HashMap<K, V> {
        self.state.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> InMemoryAccessor<K, V>
where
    K: Eq + Hash,
{
    /// Returns the stored value for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.read().get(key).cloned()
    }

    /// True if `key` is stored.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.read().contains_key(key)
    }

    /// Stores `value`, returning the previous value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.write().insert(key, value)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.write().remove(key)
    }

    /// A copy of the whole map.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<K, V>
    where
        K: Clone,
        V: Clone,
    {
        self.read().clone()
    }
}

impl<K, V> DefaultingAccessor<K, V> for InMemoryAccessor<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Add<Output = V> + Send + Sync,
{
    fn get_or_default(&self, key: &K, fallback: V) -> V {
        DefaultingMapExt::get_or_default(&*self.read(), key, fallback)
    }

    fn increment_or_insert(&self, key: K, fallback: V, delta: V) -> V {
        DefaultingMapExt::increment_or_insert(&mut *self.write(), key, fallback, delta)
    }

    fn increment_existing(&self, key: &K, delta: V) -> Option<V> {
        DefaultingMapExt::increment_existing(&mut *self.write(), key, delta)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    // Compile-time test: ensure the trait is object-safe
    fn _assert_accessor_object_safe(_: &dyn DefaultingAccessor<String, i64>) {}

    #[test]
    fn test_get_or_default_never_inserts() {
        let store: InMemoryAccessor<String, i64> = InMemoryAccessor::new();
        for _ in 0..5 {
            assert_eq!(store.get_or_default(&"missing".to_string(), 3), 3);
        }
        assert!(store.is_empty());
        assert!(!store.contains_key(&"missing".to_string()));
    }

    #[test]
    fn test_get_or_default_returns_stored_value() {
        let store = InMemoryAccessor::new();
        store.insert("k", 10);
        assert_eq!(store.get_or_default(&"k", 3), 10);
    }

    #[test]
    fn test_increment_or_insert_missing_then_present() {
        let store = InMemoryAccessor::new();
        assert_eq!(store.increment_or_insert("k", 3, 1), 4);
        assert_eq!(store.get(&"k"), Some(4));
        assert_eq!(store.increment_or_insert("k", 3, 1), 5);
        assert_eq!(store.get(&"k"), Some(5));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_increment_existing_skips_missing() {
        let store = InMemoryAccessor::from(HashMap::from([("a", 1)]));
        assert_eq!(store.increment_existing(&"a", 1), Some(2));
        assert_eq!(store.increment_existing(&"b", 1), None);
        assert!(!store.contains_key(&"b"));
    }

    #[test]
    fn test_float_values() {
        let floats: InMemoryAccessor<u8, f64> = InMemoryAccessor::new();
        floats.increment_or_insert(1u8, 0.5, 0.25);
        assert!((floats.get_or_default(&1, 0.0) - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overflow_follows_add_and_store_stays_usable() {
        let store: Arc<InMemoryAccessor<u8, u8>> =
            Arc::new(InMemoryAccessor::from(HashMap::from([(1, u8::MAX)])));
        let wrapping: InMemoryAccessor<u8, std::num::Wrapping<u8>> = InMemoryAccessor::new();
        assert_eq!(
            wrapping.increment_or_insert(1, std::num::Wrapping(u8::MAX), std::num::Wrapping(1)),
            std::num::Wrapping(0)
        );

        let worker = Arc::clone(&store);
        let outcome = std::thread::spawn(move || worker.increment_or_insert(1, 0, 1)).join();
        if cfg!(debug_assertions) {
            assert!(outcome.is_err());
            assert_eq!(store.get(&1), Some(u8::MAX));
        }
        assert_eq!(store.increment_or_insert(2, 0, 1), 1);
    }

    #[test]
    fn test_concurrent_increments_are_atomic() {
        let store: Arc<InMemoryAccessor<&'static str, u64>> = Arc::new(InMemoryAccessor::new());
        let threads = 8;
        let per_thread = 250;

        std::thread::scope(|scope| {
            for _ in 0..threads {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for _ in 0..per_thread {
                        store.increment_or_insert("hits", 100, 1);
                    }
                });
            }
        });

        assert_eq!(store.get(&"hits"), Some(100 + threads * per_thread));
    }

    #[test]
    fn test_remove_and_snapshot() {
        let store = InMemoryAccessor::new();
        store.insert(1, 1);
        store.insert(2, 2);
        assert_eq!(store.remove(&1), Some(1));
        assert_eq!(store.snapshot(), HashMap::from([(2, 2)]));
        assert_eq!(store.into_inner(), HashMap::from([(2, 2)]));
    }

    #[test]
    fn test_hashmap_extension() {
        let mut dict: HashMap<String, i32> = HashMap::from([("1".to_string(), 1)]);

        assert_eq!(dict.increment_existing(&"1".to_string(), 1), Some(2));
        assert_eq!(dict.increment_existing(&"missing".to_string(), 1), None);

        assert_eq!(dict.get_or_default(&"2".to_string(), 3), 3);
        assert!(!dict.contains_key("2"));

        assert_eq!(dict.increment_or_insert("2".to_string(), 3, 1), 4);
        assert_eq!(dict, HashMap::from([("1".to_string(), 2), ("2".to_string(), 4)]));
    }
}
