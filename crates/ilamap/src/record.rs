//! Fixed-width database record layouts.
//!
//! Three record formats persist identifier/locator state in the key/value
//! backend: the map record (keyed by a full 128-bit address), the identifier
//! record (keyed by a 64-bit identifier number), and the locator record
//! (keyed by a 64-bit locator number).
//!
//! Integer fields are pinned little-endian to stay interoperable with the
//! deployed record format. Locator fields are opaque network-ordered bytes
//! carried verbatim; they round-trip through the store without conversion.
//! Decoding a buffer of the wrong length is a format error, never a
//! truncation.

use std::fmt;

use zerocopy::little_endian::{I32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{Error, Result};

/// Encode a 64-bit identifier or locator number as a store key.
pub fn num_key(num: u64) -> [u8; 8] {
    num.to_le_bytes()
}

/// Decode a store key produced by [`num_key`].
pub fn num_from_key(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| Error::BadLength {
        kind: "numeric key",
        expected: 8,
        actual: key.len(),
    })?;
    Ok(u64::from_le_bytes(bytes))
}

// ============================================================================
// Record layouts
// ============================================================================

/// Map record value: binds a full address to its locator and metadata.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct MapRecord {
    /// Locator value, network-ordered bytes carried verbatim.
    pub locator: [u8; 8],
    /// Interface index, 0 = any.
    pub ifindex: I32,
    /// Checksum mode (CsumMode discriminant).
    pub csum_mode: u8,
    /// Identifier type (IdentType discriminant).
    pub ident_type: u8,
    /// Hook type (HookType discriminant).
    pub hook_type: u8,
    /// Reserved trailer, always written as zero.
    pub rsvd: u8,
}

/// Identifier record value: the identifier's address and attached locator
/// number (0 = unattached).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct IdentRecord {
    /// The identifier's full 128-bit address.
    pub addr: [u8; 16],
    /// Attached locator number; 0 is the unattached sentinel.
    pub loc_num: U64,
}

/// Locator record value: an administrative locator number's locator value.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct LocRecord {
    /// Locator value, network-ordered bytes carried verbatim.
    pub locator: [u8; 8],
}

macro_rules! record_codec {
    ($ty:ty, $kind:literal) => {
        impl $ty {
            /// Size of this record on the wire.
            pub const SIZE: usize = std::mem::size_of::<Self>();

            /// Convert the record to bytes.
            pub fn as_bytes(&self) -> &[u8] {
                <Self as IntoBytes>::as_bytes(self)
            }

            /// Decode a record from a buffer of exactly [`Self::SIZE`] bytes.
            pub fn from_bytes(data: &[u8]) -> Result<Self> {
                Self::read_from_bytes(data).map_err(|_| Error::BadLength {
                    kind: $kind,
                    expected: Self::SIZE,
                    actual: data.len(),
                })
            }
        }
    };
}

record_codec!(MapRecord, "map record");
record_codec!(IdentRecord, "identifier record");
record_codec!(LocRecord, "locator record");

// ============================================================================
// Field enums
// ============================================================================

/// Checksum handling modes for a map entry.
///
/// Discriminant values are fixed by the data plane's uapi.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsumMode {
    /// Adjust the transport checksum across the rewrite.
    AdjustTransport,
    /// Use a checksum-neutral mapping.
    NeutralMap,
    /// Leave checksums alone.
    NoAction,
    /// Checksum-neutral mapping, negotiated automatically.
    NeutralMapAuto,
    /// Value not understood by this build; preserved on re-encode.
    Unknown(u8),
}

impl CsumMode {
    /// The wire discriminant.
    pub fn value(self) -> u8 {
        match self {
            Self::AdjustTransport => 0,
            Self::NeutralMap => 1,
            Self::NoAction => 2,
            Self::NeutralMapAuto => 3,
            Self::Unknown(v) => v,
        }
    }

    /// Get the name of this mode.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AdjustTransport => "adj-transport",
            Self::NeutralMap => "neutral-map",
            Self::NoAction => "no-action",
            Self::NeutralMapAuto => "neutral-map-auto",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Parse a mode from its name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "adj-transport" => Some(Self::AdjustTransport),
            "neutral-map" => Some(Self::NeutralMap),
            "no-action" => Some(Self::NoAction),
            "neutral-map-auto" => Some(Self::NeutralMapAuto),
            _ => None,
        }
    }
}

impl From<u8> for CsumMode {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::AdjustTransport,
            1 => Self::NeutralMap,
            2 => Self::NoAction,
            3 => Self::NeutralMapAuto,
            v => Self::Unknown(v),
        }
    }
}

/// Identifier types for a map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentType {
    /// Plain interface identifier.
    Iid,
    /// Locally unique identifier.
    Luid,
    /// Virtual IPv4 address.
    VirtV4,
    /// Virtual unicast IPv6 address.
    VirtUniV6,
    /// Virtual multicast IPv6 address.
    VirtMultiV6,
    /// Non-local address.
    NonlocalAddr,
    /// Defer to the address format field.
    UseFormat,
    /// Value not understood by this build; preserved on re-encode.
    Unknown(u8),
}

impl IdentType {
    /// The wire discriminant.
    pub fn value(self) -> u8 {
        match self {
            Self::Iid => 0,
            Self::Luid => 1,
            Self::VirtV4 => 2,
            Self::VirtUniV6 => 3,
            Self::VirtMultiV6 => 4,
            Self::NonlocalAddr => 5,
            Self::UseFormat => 32,
            Self::Unknown(v) => v,
        }
    }

    /// Get the name of this identifier type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Iid => "iid",
            Self::Luid => "luid",
            Self::VirtV4 => "virt-v4",
            Self::VirtUniV6 => "virt-uni-v6",
            Self::VirtMultiV6 => "virt-multi-v6",
            Self::NonlocalAddr => "nonlocal-addr",
            Self::UseFormat => "use-format",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Parse an identifier type from its name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "iid" => Some(Self::Iid),
            "luid" => Some(Self::Luid),
            "virt-v4" => Some(Self::VirtV4),
            "virt-uni-v6" => Some(Self::VirtUniV6),
            "virt-multi-v6" => Some(Self::VirtMultiV6),
            "nonlocal-addr" => Some(Self::NonlocalAddr),
            "use-format" => Some(Self::UseFormat),
            _ => None,
        }
    }
}

impl From<u8> for IdentType {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::Iid,
            1 => Self::Luid,
            2 => Self::VirtV4,
            3 => Self::VirtUniV6,
            4 => Self::VirtMultiV6,
            5 => Self::NonlocalAddr,
            32 => Self::UseFormat,
            v => Self::Unknown(v),
        }
    }
}

/// Routing hooks a map entry can apply at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookType {
    /// Translate on route output.
    Output,
    /// Translate on route input.
    Input,
    /// Value not understood by this build; preserved on re-encode.
    Unknown(u8),
}

impl HookType {
    /// The wire discriminant.
    pub fn value(self) -> u8 {
        match self {
            Self::Output => 0,
            Self::Input => 1,
            Self::Unknown(v) => v,
        }
    }

    /// Get the name of this hook.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Output => "output",
            Self::Input => "input",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Parse a hook from its name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "output" => Some(Self::Output),
            "input" => Some(Self::Input),
            _ => None,
        }
    }
}

impl From<u8> for HookType {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::Output,
            1 => Self::Input,
            v => Self::Unknown(v),
        }
    }
}

macro_rules! enum_display {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.name())
                }
            }

            #[cfg(feature = "output")]
            impl serde::Serialize for $ty {
                fn serialize<S: serde::Serializer>(
                    &self,
                    serializer: S,
                ) -> std::result::Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }
        )*
    };
}

enum_display!(CsumMode, IdentType, HookType);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes() {
        assert_eq!(MapRecord::SIZE, 16);
        assert_eq!(IdentRecord::SIZE, 24);
        assert_eq!(LocRecord::SIZE, 8);
    }

    #[test]
    fn test_map_record_roundtrip() {
        let mut buf = [0u8; 16];
        buf[..8].copy_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 1]);
        buf[8..12].copy_from_slice(&3i32.to_le_bytes());
        buf[12] = 3; // neutral-map-auto
        buf[13] = 1; // luid
        buf[14] = 0; // output

        let rec = MapRecord::from_bytes(&buf).unwrap();
        assert_eq!(rec.ifindex.get(), 3);
        assert_eq!(rec.csum_mode, 3);
        assert_eq!(rec.as_bytes(), &buf);
    }

    #[test]
    fn test_ident_record_roundtrip() {
        let mut buf = [0u8; 24];
        buf[..16].copy_from_slice(&std::net::Ipv6Addr::LOCALHOST.octets());
        buf[16..].copy_from_slice(&7u64.to_le_bytes());

        let rec = IdentRecord::from_bytes(&buf).unwrap();
        assert_eq!(rec.loc_num.get(), 7);
        assert_eq!(rec.as_bytes(), &buf);
    }

    #[test]
    fn test_decode_wrong_length_reports_observed() {
        let err = MapRecord::from_bytes(&[0u8; 15]).unwrap_err();
        match err {
            Error::BadLength {
                expected, actual, ..
            } => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 15);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(IdentRecord::from_bytes(&[0u8; 25]).is_err());
        assert!(LocRecord::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_num_key_roundtrip() {
        let key = num_key(0xdead_beef_0bad_f00d);
        assert_eq!(num_from_key(&key).unwrap(), 0xdead_beef_0bad_f00d);
        assert!(num_from_key(&key[..7]).is_err());
    }

    #[test]
    fn test_enum_values() {
        assert_eq!(CsumMode::from(3), CsumMode::NeutralMapAuto);
        assert_eq!(CsumMode::from(9), CsumMode::Unknown(9));
        assert_eq!(CsumMode::Unknown(9).value(), 9);
        assert_eq!(IdentType::from(32), IdentType::UseFormat);
        assert_eq!(IdentType::UseFormat.value(), 32);
        assert_eq!(HookType::from(1), HookType::Input);
    }

    #[test]
    fn test_enum_names() {
        assert_eq!(CsumMode::NeutralMapAuto.name(), "neutral-map-auto");
        assert_eq!(CsumMode::from_name("adj-transport"), Some(CsumMode::AdjustTransport));
        assert_eq!(CsumMode::from_name("bogus"), None);
        assert_eq!(IdentType::from_name("virt-uni-v6"), Some(IdentType::VirtUniV6));
        assert_eq!(HookType::Output.to_string(), "output");
        assert_eq!(HookType::Unknown(7).name(), "unknown");
    }
}
