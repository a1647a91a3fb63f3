//! Control-plane library for identifier/locator network addressing.
//!
//! An identifier names an end host independent of its topological location;
//! a 64-bit locator names the location that currently routes to it. This
//! crate maintains the mapping state between the two (three fixed-width
//! record formats over a key/value backend) and speaks the two wire
//! protocols that distribute it: the 22-byte ticket option and the AMFP
//! bulk resolution protocol.
//!
//! All operations are synchronous and blocking; connections to the backend
//! and to resolution peers are scoped to a single call.
//!
//! # Features
//!
//! - `redis-store` - Redis-backed mapping store
//! - `output` - JSON serialization of table entries
//! - `full` - All features enabled
//!
//! # Example
//!
//! ```ignore
//! use std::num::NonZeroU64;
//! use ilamap::{Addr64, IdentTable, LocTable, MapEntry, MapTable, MemoryStore};
//!
//! let mut idents = IdentTable::new(MemoryStore::new());
//! let mut locs = LocTable::new(MemoryStore::new());
//!
//! // Register locator 2, make identifier 5, attach one to the other.
//! locs.make(2, "2001:db8:0:1".parse()?)?;
//! idents.make(5, "2001:db8::5".parse()?)?;
//! idents.attach(5, NonZeroU64::new(2).unwrap())?;
//!
//! for row in idents.list()? {
//!     let (num, entry) = row?;
//!     println!("{num} {entry}");
//! }
//! ```
//!
//! # Bulk resolution
//!
//! ```ignore
//! use ilamap::amfp;
//!
//! let idents = vec!["2001:db8::5".parse()?, "2001:db8::6".parse()?];
//! for (ident, target) in amfp::resolve(("::1", amfp::DEFAULT_PORT), &idents)? {
//!     println!("{ident} -> {target}");
//! }
//! ```

pub mod addr;
pub mod amfp;
mod error;
pub mod ident;
pub mod loc;
pub mod map;
pub mod record;
pub mod store;
pub mod ticket;

#[cfg(feature = "output")]
pub mod output;

#[cfg(feature = "redis-store")]
pub mod redis;

// Re-export common types at crate root for convenience
pub use addr::{Addr64, parse_address};
pub use error::{Error, Result};
pub use ident::{IdentEntry, IdentTable};
pub use loc::{LocEntry, LocTable};
pub use map::{MapEntry, MapTable};
pub use record::{CsumMode, HookType, IdentType};
pub use store::{MappingStore, MemoryStore};
pub use ticket::Ticket;
