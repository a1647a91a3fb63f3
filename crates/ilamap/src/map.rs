//! Map table: full-address to locator bindings.
//!
//! Each row binds a 128-bit address to the locator and metadata needed to
//! forward traffic for it. Rows live in the injected [`MappingStore`]; the
//! table owns only the record semantics.
//!
//! # Example
//!
//! ```ignore
//! use ilamap::{Addr64, MapEntry, MapTable, MemoryStore};
//!
//! let mut map = MapTable::new(MemoryStore::new());
//! let addr = "2001:db8::1".parse()?;
//! let loc: Addr64 = "2001:db8:0:1".parse()?;
//!
//! map.make(addr, MapEntry::new(loc))?;
//! for row in map.list()? {
//!     let (addr, entry) = row?;
//!     println!("{addr} {entry}");
//! }
//! ```

use std::fmt;
use std::net::Ipv6Addr;

use tracing::warn;

use crate::addr::{Addr64, ifindex_name};
use crate::error::Result;
use crate::record::{CsumMode, HookType, IdentType, MapRecord};
use crate::store::MappingStore;

/// A map table row: the locator and processing metadata for one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct MapEntry {
    /// Locator routing to the address's current location.
    pub locator: Addr64,
    /// Interface index restriction, 0 = any.
    pub ifindex: i32,
    /// Checksum handling mode.
    pub csum_mode: CsumMode,
    /// Identifier type of the mapped address.
    pub ident_type: IdentType,
    /// Routing hook the mapping applies at.
    pub hook_type: HookType,
}

impl MapEntry {
    /// Create an entry for `locator` with the default metadata:
    /// any interface, `neutral-map-auto`, `luid`, `output`.
    pub fn new(locator: Addr64) -> Self {
        Self {
            locator,
            ifindex: 0,
            csum_mode: CsumMode::NeutralMapAuto,
            ident_type: IdentType::Luid,
            hook_type: HookType::Output,
        }
    }

    /// Set the interface index restriction.
    pub fn with_ifindex(mut self, ifindex: i32) -> Self {
        self.ifindex = ifindex;
        self
    }

    /// Set the checksum mode.
    pub fn with_csum_mode(mut self, csum_mode: CsumMode) -> Self {
        self.csum_mode = csum_mode;
        self
    }

    /// Set the identifier type.
    pub fn with_ident_type(mut self, ident_type: IdentType) -> Self {
        self.ident_type = ident_type;
        self
    }

    /// Set the hook type.
    pub fn with_hook_type(mut self, hook_type: HookType) -> Self {
        self.hook_type = hook_type;
        self
    }

    /// Build the wire record. The reserved trailer byte is always zero.
    pub fn to_record(&self) -> MapRecord {
        MapRecord {
            locator: self.locator.octets(),
            ifindex: zerocopy::little_endian::I32::new(self.ifindex),
            csum_mode: self.csum_mode.value(),
            ident_type: self.ident_type.value(),
            hook_type: self.hook_type.value(),
            rsvd: 0,
        }
    }

    /// View a wire record as an entry.
    pub fn from_record(record: &MapRecord) -> Self {
        Self {
            locator: Addr64::from_octets(record.locator),
            ifindex: record.ifindex.get(),
            csum_mode: record.csum_mode.into(),
            ident_type: record.ident_type.into(),
            hook_type: record.hook_type.into(),
        }
    }
}

impl fmt::Display for MapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.locator,
            ifindex_name(self.ifindex),
            self.csum_mode,
            self.ident_type,
            self.hook_type
        )
    }
}

/// The map table over an injected store.
pub struct MapTable<S> {
    store: S,
}

impl<S: MappingStore> MapTable<S> {
    /// Create a table over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Give the store back to the caller.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Read the entry for `addr`, or `None` if no mapping exists.
    pub fn get(&mut self, addr: Ipv6Addr) -> Result<Option<MapEntry>> {
        match self.store.get(&addr.octets())? {
            Some(data) => Ok(Some(MapEntry::from_record(&MapRecord::from_bytes(&data)?))),
            None => Ok(None),
        }
    }

    /// Create or overwrite the mapping for `addr`.
    pub fn make(&mut self, addr: Ipv6Addr, entry: MapEntry) -> Result<()> {
        self.store.set(&addr.octets(), entry.to_record().as_bytes())
    }

    /// Delete the mapping for `addr`. Deleting an absent mapping is not an
    /// error.
    pub fn destroy(&mut self, addr: Ipv6Addr) -> Result<()> {
        self.store.delete(&addr.octets())
    }

    /// Delete every mapping currently enumerable, returning the count.
    ///
    /// Rows created after enumeration began may survive; there is no
    /// cross-key atomicity in the backend.
    pub fn flush(&mut self) -> Result<usize> {
        let keys = self.store.keys()?;
        let count = keys.len();
        for key in keys {
            self.store.delete(&key)?;
        }
        Ok(count)
    }

    /// Iterate the table lazily, decoding each row as it is reached.
    ///
    /// Keys of the wrong width and rows that fail record decoding are
    /// skipped with a logged diagnostic; rows deleted since enumeration
    /// began are skipped silently. Connection failures are yielded as
    /// per-item errors so best-effort callers can skip them too.
    pub fn list(&mut self) -> Result<MapIter<'_, S>> {
        let keys = self.store.keys()?;
        Ok(MapIter {
            store: &mut self.store,
            keys: keys.into_iter(),
        })
    }
}

/// Lazy iterator over map table rows.
pub struct MapIter<'a, S> {
    store: &'a mut S,
    keys: std::vec::IntoIter<Vec<u8>>,
}

impl<S: MappingStore> Iterator for MapIter<'_, S> {
    type Item = Result<(Ipv6Addr, MapEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.keys.next()?;
            let octets: [u8; 16] = match key.as_slice().try_into() {
                Ok(octets) => octets,
                Err(_) => {
                    warn!(len = key.len(), "skipping map key of unexpected width");
                    continue;
                }
            };
            let addr = Ipv6Addr::from(octets);

            let data = match self.store.get(&key) {
                Ok(Some(data)) => data,
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            };

            match MapRecord::from_bytes(&data) {
                Ok(record) => return Some(Ok((addr, MapEntry::from_record(&record)))),
                Err(err) => {
                    warn!(%addr, error = %err, "skipping undecodable map record");
                }
            }
        }
    }
}
