//! Address parsing and formatting.
//!
//! Two textual forms live here: the full 128-bit address (standard IPv6
//! notation) and the 64-bit locator written as four colon-separated hex
//! groups (`W:X:Y:Z`, no `::` compression).

use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Parse the textual form of a full 128-bit address.
///
/// Any string that is not a valid IPv6 address fails with [`Error::Parse`].
pub fn parse_address(s: &str) -> Result<Ipv6Addr> {
    s.parse()
        .map_err(|_| Error::Parse(format!("unable to parse address {s}")))
}

/// Render an interface index, with `0` meaning "any".
pub fn ifindex_name(ifindex: i32) -> String {
    if ifindex == 0 {
        "*".to_string()
    } else {
        ifindex.to_string()
    }
}

/// A 64-bit locator value, held in its network-ordered wire form.
///
/// The bytes are carried verbatim through records and tickets; byte-order
/// conversion happens only when rendering to text. The textual form is four
/// `:`-separated hex groups, each a big-endian read of two consecutive
/// bytes, with leading zeros suppressed per group:
///
/// ```ignore
/// let loc: Addr64 = "2001:db8:0:1".parse()?;
/// assert_eq!(loc.to_string(), "2001:db8:0:1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Addr64([u8; 8]);

impl Addr64 {
    /// The all-zero locator.
    pub const ZERO: Self = Self([0; 8]);

    /// Build from wire-order bytes.
    pub const fn from_octets(octets: [u8; 8]) -> Self {
        Self(octets)
    }

    /// The wire-order bytes.
    pub const fn octets(&self) -> [u8; 8] {
        self.0
    }

    /// Borrow the wire-order bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check for the all-zero locator.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 8]
    }

    /// The hex group at position `i` (0..4), byte-order-corrected.
    fn group(&self, i: usize) -> u16 {
        u16::from_be_bytes([self.0[i * 2], self.0[i * 2 + 1]])
    }
}

impl fmt::Display for Addr64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:x}:{:x}:{:x}:{:x}",
            self.group(0),
            self.group(1),
            self.group(2),
            self.group(3)
        )
    }
}

impl FromStr for Addr64 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split(':').collect();
        if fields.len() != 4 {
            return Err(Error::Parse(format!("bad fields count in locator {s}")));
        }

        let mut octets = [0u8; 8];
        for (i, field) in fields.iter().enumerate() {
            if field.is_empty()
                || field.len() > 4
                || !field.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(Error::Parse(format!("error converting {s} to addr64")));
            }
            let group = u16::from_str_radix(field, 16)
                .map_err(|_| Error::Parse(format!("error converting {s} to addr64")))?;
            octets[i * 2..i * 2 + 2].copy_from_slice(&group.to_be_bytes());
        }

        Ok(Self(octets))
    }
}

#[cfg(feature = "output")]
impl serde::Serialize for Addr64 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("::1").unwrap(), Ipv6Addr::LOCALHOST);
        assert_eq!(
            parse_address("2001:db8::8000:0:0:1").unwrap().octets()[0..4],
            [0x20, 0x01, 0x0d, 0xb8]
        );
        assert!(parse_address("not-an-address").is_err());
        assert!(parse_address("10.0.0.1").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_addr64_display() {
        let loc = Addr64::from_octets([0x20, 0x01, 0x0d, 0xb8, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(loc.to_string(), "2001:db8:0:1");
        assert_eq!(Addr64::ZERO.to_string(), "0:0:0:0");
    }

    #[test]
    fn test_addr64_parse() {
        let loc: Addr64 = "2001:db8:0:1".parse().unwrap();
        assert_eq!(
            loc.octets(),
            [0x20, 0x01, 0x0d, 0xb8, 0x00, 0x00, 0x00, 0x01]
        );

        // Leading zeros and uppercase are accepted on input.
        let padded: Addr64 = "2001:0DB8:0000:0001".parse().unwrap();
        assert_eq!(padded, loc);
    }

    #[test]
    fn test_addr64_roundtrip() {
        for text in ["0:0:0:0", "1:2:3:4", "ffff:ffff:ffff:ffff", "2001:db8:0:1"] {
            let loc: Addr64 = text.parse().unwrap();
            assert_eq!(loc.to_string(), text);
        }
    }

    #[test]
    fn test_addr64_rejects_bad_shapes() {
        for text in [
            "",
            "1:2:3",
            "1:2:3:4:5",
            "1::4",
            "1:2:3:",
            ":2:3:4",
            "1:2:3:g",
            "1:2:3:00001",
            "1:2:3:+4",
        ] {
            assert!(text.parse::<Addr64>().is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn test_ifindex_name() {
        assert_eq!(ifindex_name(0), "*");
        assert_eq!(ifindex_name(3), "3");
    }
}
