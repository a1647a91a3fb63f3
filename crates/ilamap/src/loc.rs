//! Locator table: administrative locator numbers and their values.

use std::fmt;

use tracing::warn;

use crate::addr::Addr64;
use crate::error::Result;
use crate::record::{LocRecord, num_from_key, num_key};
use crate::store::MappingStore;

/// A locator table row: one administrative number's locator value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct LocEntry {
    /// The locator value.
    pub locator: Addr64,
}

impl LocEntry {
    /// Create an entry for `locator`.
    pub fn new(locator: Addr64) -> Self {
        Self { locator }
    }

    /// Build the wire record.
    pub fn to_record(&self) -> LocRecord {
        LocRecord {
            locator: self.locator.octets(),
        }
    }

    /// View a wire record as an entry.
    pub fn from_record(record: &LocRecord) -> Self {
        Self {
            locator: Addr64::from_octets(record.locator),
        }
    }
}

impl fmt::Display for LocEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.locator.fmt(f)
    }
}

/// The locator table over an injected store.
pub struct LocTable<S> {
    store: S,
}

impl<S: MappingStore> LocTable<S> {
    /// Create a table over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Give the store back to the caller.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Read the entry for locator number `num`, or `None` if it was never
    /// made.
    pub fn get(&mut self, num: u64) -> Result<Option<LocEntry>> {
        match self.store.get(&num_key(num))? {
            Some(data) => Ok(Some(LocEntry::from_record(&LocRecord::from_bytes(&data)?))),
            None => Ok(None),
        }
    }

    /// Create or overwrite locator number `num` with `locator`.
    pub fn make(&mut self, num: u64, locator: Addr64) -> Result<()> {
        self.store
            .set(&num_key(num), LocEntry::new(locator).to_record().as_bytes())
    }

    /// Delete locator number `num`. Deleting an absent row is not an error.
    ///
    /// Identifiers attached to `num` keep their attachment; the reference
    /// is administrative and may dangle.
    pub fn destroy(&mut self, num: u64) -> Result<()> {
        self.store.delete(&num_key(num))
    }

    /// Delete every locator row currently enumerable, returning the count.
    pub fn flush(&mut self) -> Result<usize> {
        let keys = self.store.keys()?;
        let count = keys.len();
        for key in keys {
            self.store.delete(&key)?;
        }
        Ok(count)
    }

    /// Iterate the table lazily; see [`MapTable::list`] for the skip and
    /// error-yield rules.
    ///
    /// [`MapTable::list`]: crate::MapTable::list
    pub fn list(&mut self) -> Result<LocIter<'_, S>> {
        let keys = self.store.keys()?;
        Ok(LocIter {
            store: &mut self.store,
            keys: keys.into_iter(),
        })
    }
}

/// Lazy iterator over locator table rows.
pub struct LocIter<'a, S> {
    store: &'a mut S,
    keys: std::vec::IntoIter<Vec<u8>>,
}

impl<S: MappingStore> Iterator for LocIter<'_, S> {
    type Item = Result<(u64, LocEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.keys.next()?;
            let num = match num_from_key(&key) {
                Ok(num) => num,
                Err(_) => {
                    warn!(len = key.len(), "skipping locator key of unexpected width");
                    continue;
                }
            };

            let data = match self.store.get(&key) {
                Ok(Some(data)) => data,
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            };

            match LocRecord::from_bytes(&data) {
                Ok(record) => return Some(Ok((num, LocEntry::from_record(&record)))),
                Err(err) => {
                    warn!(num, error = %err, "skipping undecodable locator record");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn loc(s: &str) -> Addr64 {
        s.parse().unwrap()
    }

    #[test]
    fn test_make_get_destroy() {
        let mut locs = LocTable::new(MemoryStore::new());
        locs.make(2, loc("2001:db8:0:2")).unwrap();

        assert_eq!(
            locs.get(2).unwrap().unwrap().locator,
            loc("2001:db8:0:2")
        );
        assert_eq!(locs.get(3).unwrap(), None);

        locs.destroy(2).unwrap();
        assert_eq!(locs.get(2).unwrap(), None);
    }

    #[test]
    fn test_one_to_one_overwrite() {
        let mut locs = LocTable::new(MemoryStore::new());
        locs.make(2, loc("0:0:0:1")).unwrap();
        locs.make(2, loc("0:0:0:2")).unwrap();
        assert_eq!(locs.get(2).unwrap().unwrap().locator, loc("0:0:0:2"));
    }

    #[test]
    fn test_flush_then_list_is_empty() {
        let mut locs = LocTable::new(MemoryStore::new());
        locs.make(1, loc("0:0:0:1")).unwrap();
        locs.make(2, loc("0:0:0:2")).unwrap();

        assert_eq!(locs.flush().unwrap(), 2);
        assert_eq!(locs.list().unwrap().count(), 0);
    }
}
