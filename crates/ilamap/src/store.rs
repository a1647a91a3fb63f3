//! The key/value backend interface the mapping tables run on.
//!
//! The tables do not own a backend; the caller composes a store and injects
//! it. The store is reachable over a network connection that may fail, so
//! every operation is fallible: connection failures surface as
//! [`Error::Connection`](crate::Error::Connection), distinct from a key
//! simply being absent.

use std::collections::HashMap;

use crate::error::Result;

/// Default backend port for the map table.
pub const DEFAULT_MAP_PORT: u16 = 6379;
/// Default backend port for the identifier table.
pub const DEFAULT_IDENT_PORT: u16 = 6380;
/// Default backend port for the locator table.
pub const DEFAULT_LOC_PORT: u16 = 6381;

/// A key/value backend with per-key get/set/delete/enumerate semantics.
///
/// No transactional guarantees hold across keys: `keys()` snapshots the
/// currently enumerable keyset, and anything created or deleted while a
/// caller walks that snapshot is the caller's race to own.
pub trait MappingStore {
    /// Read the value at `key`, or `None` if the key is absent.
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Write `value` at `key`, creating or overwriting.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete `key`. Deleting an absent key is not an error.
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Enumerate the keys currently in the store.
    fn keys(&mut self) -> Result<Vec<Vec<u8>>>;
}

/// In-memory store backed by a `HashMap`.
///
/// Useful for tests and for embedding a node-local table without a backend
/// process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MappingStore for MemoryStore {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

impl<S: MappingStore + ?Sized> MappingStore for &mut S {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }

    fn keys(&mut self) -> Result<Vec<Vec<u8>>> {
        (**self).keys()
    }
}
