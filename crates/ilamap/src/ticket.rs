//! The 22-byte ticket option.
//!
//! A ticket carries a locator plus expiration/service metadata inside a
//! hop-by-hop extension-header option. The codec is transport-agnostic; in
//! the deployed system the front-end service hands tickets out over HTTP
//! and clients splice them into outgoing extension headers.
//!
//! Wire layout, 22 bytes total, integer fields big-endian except the
//! locator (carried verbatim in its stored form):
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ opt_type (1)  opt_len (1)  fast_type<<4 (1)│
//! │ rsvd (1)      rsvd2 (2)                    │
//! ├────────────────────────────────────────────┤
//! │ expiration (4, BE)   service_profile (4,BE)│
//! ├────────────────────────────────────────────┤
//! │ locator (8, verbatim)                      │
//! └────────────────────────────────────────────┘
//! ```

use tracing::warn;
use zerocopy::big_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::addr::Addr64;
use crate::error::{Error, Result};
use crate::map::MapEntry;

/// Option type identifying a ticket in an option list.
pub const OPT_TYPE: u8 = 0x3e;

/// Wire-visible option length: total size minus the 4-byte common header.
pub const OPT_LEN: u8 = 20;

/// Total encoded size of a ticket.
pub const WIRE_LEN: usize = 22;

/// Default ticket type used by the ticket agent.
pub const DEFAULT_FAST_TYPE: u8 = 1;

/// Pad1 option type in an option list.
const IPV6_TLV_PAD1: u8 = 0;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct RawTicket {
    opt_type: u8,
    opt_len: u8,
    /// Ticket type in the high nibble; low nibble reserved-zero.
    fast_type: u8,
    rsvd: u8,
    rsvd2: [u8; 2],
    expiration: U32,
    service_profile: U32,
    locator: [u8; 8],
}

/// A decoded ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct Ticket {
    /// Option type byte as carried on the wire.
    pub opt_type: u8,
    /// Option length byte as carried on the wire.
    pub opt_len: u8,
    /// Ticket type (already shifted down from the high nibble).
    pub fast_type: u8,
    /// Expiration, host order.
    pub expiration: u32,
    /// Service profile, host order.
    pub service_profile: u32,
    /// Locator, verbatim stored form.
    pub locator: Addr64,
}

impl Ticket {
    /// Create a ticket with the standard option type and length.
    ///
    /// `fast_type` occupies 4 bits; values above 0xf are truncated on
    /// encode.
    pub fn new(fast_type: u8, expiration: u32, service_profile: u32, locator: Addr64) -> Self {
        Self {
            opt_type: OPT_TYPE,
            opt_len: OPT_LEN,
            fast_type,
            expiration,
            service_profile,
            locator,
        }
    }

    /// Build a ticket for a map entry's locator.
    pub fn for_map_entry(entry: &MapEntry, expiration: u32, service_profile: u32) -> Self {
        Self::new(DEFAULT_FAST_TYPE, expiration, service_profile, entry.locator)
    }

    /// Encode to the fixed 22-byte wire form.
    pub fn encode(&self) -> [u8; WIRE_LEN] {
        let raw = RawTicket {
            opt_type: self.opt_type,
            opt_len: self.opt_len,
            fast_type: (self.fast_type & 0x0f) << 4,
            rsvd: 0,
            rsvd2: [0; 2],
            expiration: U32::new(self.expiration),
            service_profile: U32::new(self.service_profile),
            locator: self.locator.octets(),
        };
        let mut buf = [0u8; WIRE_LEN];
        buf.copy_from_slice(raw.as_bytes());
        buf
    }

    /// Decode a ticket from exactly 22 bytes.
    ///
    /// Any other length is a protocol violation reported as
    /// [`Error::BadTicket`] carrying the observed bytes; no partial decode
    /// is attempted.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let raw = RawTicket::read_from_bytes(data).map_err(|_| Error::BadTicket {
            raw: data.to_vec(),
        })?;

        Ok(Self {
            opt_type: raw.opt_type,
            opt_len: raw.opt_len,
            fast_type: raw.fast_type >> 4,
            expiration: raw.expiration.get(),
            service_profile: raw.service_profile.get(),
            locator: Addr64::from_octets(raw.locator),
        })
    }
}

/// Walk an option list and decode every ticket in it.
///
/// Pad1 options are stepped over; other options are skipped by their
/// declared length. A ticket option whose size is not the fixed 22 bytes is
/// skipped with a logged diagnostic. Option framing that runs off the end
/// of the buffer fails with a length error.
pub fn scan_options(mut data: &[u8]) -> Result<Vec<Ticket>> {
    let mut tickets = Vec::new();

    while !data.is_empty() {
        if data[0] == IPV6_TLV_PAD1 {
            data = &data[1..];
            continue;
        }

        if data.len() < 2 {
            return Err(Error::BadLength {
                kind: "option header",
                expected: 2,
                actual: data.len(),
            });
        }

        let opt_len = data[1] as usize + 2;
        if data.len() < opt_len {
            return Err(Error::BadLength {
                kind: "option",
                expected: opt_len,
                actual: data.len(),
            });
        }

        if data[0] == OPT_TYPE {
            match Ticket::decode(&data[..opt_len]) {
                Ok(ticket) => tickets.push(ticket),
                Err(err) => warn!(error = %err, "skipping malformed ticket option"),
            }
        }

        data = &data[opt_len..];
    }

    Ok(tickets)
}
