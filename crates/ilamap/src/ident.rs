//! Identifier table: identifier numbers, their addresses, and attachment.
//!
//! An identifier names an end host independent of where it sits; attaching
//! it to a locator number records which location currently serves it. The
//! attached locator number is an administrative reference, not a pointer:
//! it may name a locator row that no longer exists, and that is accepted.
//!
//! `attach`/`unattach` are read-modify-write with no locking; concurrent
//! writers to the same identifier race and the last writer wins. Callers
//! needing atomic attachment must serialize writes per identifier
//! themselves.

use std::fmt;
use std::net::Ipv6Addr;
use std::num::NonZeroU64;

use tracing::warn;
use zerocopy::little_endian::U64;

use crate::error::{Error, Result};
use crate::record::{IdentRecord, num_from_key, num_key};
use crate::store::MappingStore;

/// An identifier table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct IdentEntry {
    /// The identifier's full address.
    pub addr: Ipv6Addr,
    /// The locator number currently serving the identifier, if attached.
    pub loc_num: Option<NonZeroU64>,
}

impl IdentEntry {
    /// Create an unattached entry for `addr`.
    pub fn new(addr: Ipv6Addr) -> Self {
        Self {
            addr,
            loc_num: None,
        }
    }

    /// Build the wire record; `None` encodes as the 0 sentinel.
    pub fn to_record(&self) -> IdentRecord {
        IdentRecord {
            addr: self.addr.octets(),
            loc_num: U64::new(self.loc_num.map_or(0, NonZeroU64::get)),
        }
    }

    /// View a wire record as an entry; the 0 sentinel decodes as `None`.
    pub fn from_record(record: &IdentRecord) -> Self {
        Self {
            addr: Ipv6Addr::from(record.addr),
            loc_num: NonZeroU64::new(record.loc_num.get()),
        }
    }
}

impl fmt::Display for IdentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.loc_num {
            Some(num) => write!(f, "{} {}", self.addr, num),
            None => write!(f, "{} unattached", self.addr),
        }
    }
}

/// The identifier table over an injected store.
pub struct IdentTable<S> {
    store: S,
}

impl<S: MappingStore> IdentTable<S> {
    /// Create a table over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Give the store back to the caller.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Read the entry for identifier `num`, or `None` if it was never made.
    pub fn get(&mut self, num: u64) -> Result<Option<IdentEntry>> {
        match self.store.get(&num_key(num))? {
            Some(data) => Ok(Some(IdentEntry::from_record(&IdentRecord::from_bytes(
                &data,
            )?))),
            None => Ok(None),
        }
    }

    /// Create or overwrite identifier `num` with `addr`, unattached.
    pub fn make(&mut self, num: u64, addr: Ipv6Addr) -> Result<()> {
        self.store
            .set(&num_key(num), IdentEntry::new(addr).to_record().as_bytes())
    }

    /// Delete identifier `num`. Deleting an absent identifier is not an
    /// error.
    pub fn destroy(&mut self, num: u64) -> Result<()> {
        self.store.delete(&num_key(num))
    }

    /// Attach identifier `num` to `loc_num`.
    ///
    /// Rewrites only the attached-locator field; the address words are left
    /// untouched. Fails with [`Error::NotFound`] if the identifier was
    /// never made.
    pub fn attach(&mut self, num: u64, loc_num: NonZeroU64) -> Result<()> {
        self.set_loc_num(num, loc_num.get())
    }

    /// Clear identifier `num`'s attachment.
    ///
    /// Fails with [`Error::NotFound`] if the identifier was never made.
    pub fn unattach(&mut self, num: u64) -> Result<()> {
        self.set_loc_num(num, 0)
    }

    fn set_loc_num(&mut self, num: u64, loc_num: u64) -> Result<()> {
        let key = num_key(num);
        let data = self.store.get(&key)?.ok_or_else(|| Error::NotFound {
            kind: "identifier",
            key: num.to_string(),
        })?;

        let mut record = IdentRecord::from_bytes(&data)?;
        record.loc_num = U64::new(loc_num);
        self.store.set(&key, record.as_bytes())
    }

    /// Delete every identifier currently enumerable, returning the count.
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
    pub fn list(&mut self) -> Result<IdentIter<'_, S>> {
        let keys = self.store.keys()?;
        Ok(IdentIter {
            store: &mut self.store,
            keys: keys.into_iter(),
        })
    }
}

/// Lazy iterator over identifier table rows.
pub struct IdentIter<'a, S> {
    store: &'a mut S,
    keys: std::vec::IntoIter<Vec<u8>>,
}

impl<S: MappingStore> Iterator for IdentIter<'_, S> {
    type Item = Result<(u64, IdentEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.keys.next()?;
            let num = match num_from_key(&key) {
                Ok(num) => num,
                Err(_) => {
                    warn!(len = key.len(), "skipping identifier key of unexpected width");
                    continue;
                }
            };

            let data = match self.store.get(&key) {
                Ok(Some(data)) => data,
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            };

            match IdentRecord::from_bytes(&data) {
                Ok(record) => return Some(Ok((num, IdentEntry::from_record(&record)))),
                Err(err) => {
                    warn!(num, error = %err, "skipping undecodable identifier record");
                }
            }
        }
    }
}
