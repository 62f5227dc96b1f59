//! Keyed single-flight cache.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;

/// Cache where each key is computed at most once, even under contention
///
/// The map lock is held only long enough to fetch (or create) the key's
/// cell. The computation itself runs inside [`OnceCell::get_or_init`], so
/// concurrent first callers for one key block on that cell and all receive
/// the single result, while callers for other keys proceed independently.
///
/// ## Example
///
/// ```rust
/// use coroner_core::model::SingleFlight;
///
/// let cache: SingleFlight<u64, String> = SingleFlight::new();
/// assert_eq!(cache.get_or_init(7, || "seven".to_string()), "seven");
/// // Already computed: the closure is not run again
/// assert_eq!(cache.get_or_init(7, || unreachable!()), "seven");
/// ```
#[derive(Debug)]
pub struct SingleFlight<K, V>
{
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V>
{
    fn default() -> Self
    {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    fn cell(&self, key: K) -> Arc<OnceCell<V>>
    {
        let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cells.entry(key).or_default())
    }

    /// Value for `key`, computing it with `init` if no caller has yet.
    pub fn get_or_init(&self, key: K, init: impl FnOnce() -> V) -> V
    {
        self.cell(key).get_or_init(init).clone()
    }

    /// Value for `key` if it has already been computed.
    pub fn get(&self, key: &K) -> Option<V>
    {
        let cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        cells.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Number of keys requested so far (computed or in flight).
    pub fn len(&self) -> usize
    {
        self.cells.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// `true` if no key has been requested.
    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }
}
