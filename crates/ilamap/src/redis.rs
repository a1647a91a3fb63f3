//! Redis-backed mapping store.
//!
//! The deployed backend runs one Redis instance per table (map, identifier,
//! locator), each holding binary keys and fixed-width record values in
//! database 0. A [`RedisStore`] addresses exactly one instance; compose
//! three of them to drive all three tables.
//!
//! # Example
//!
//! ```ignore
//! use ilamap::redis::RedisStore;
//! use ilamap::store::DEFAULT_MAP_PORT;
//! use ilamap::MapTable;
//!
//! let store = RedisStore::connect("::1", DEFAULT_MAP_PORT)?;
//! let mut table = MapTable::new(store);
//! ```

use redis::Commands;

use crate::error::Result;
use crate::store::MappingStore;

/// Mapping store backed by a single Redis instance.
pub struct RedisStore {
    conn: redis::Connection,
}

impl RedisStore {
    /// Connect to the Redis instance at `host:port` (database 0).
    ///
    /// `host` may be a hostname, an IPv4 address, or an IPv6 address.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        // IPv6 literals need brackets in the connection URL.
        let url = if host.contains(':') {
            format!("redis://[{host}]:{port}/")
        } else {
            format!("redis://{host}:{port}/")
        };
        let client = redis::Client::open(url.as_str())?;
        let conn = client.get_connection()?;
        Ok(Self { conn })
    }
}

impl MappingStore for RedisStore {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.conn.get(key)?)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let _: () = self.conn.set(key, value)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        let _: () = self.conn.del(key)?;
        Ok(())
    }

    fn keys(&mut self) -> Result<Vec<Vec<u8>>> {
        let keys = self.conn.scan_match::<_, Vec<u8>>("*")?.collect();
        Ok(keys)
    }
}
