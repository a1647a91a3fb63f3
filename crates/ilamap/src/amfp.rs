//! AMFP: the bulk address-resolution request/reply protocol.
//!
//! A client sends one request naming many identifier addresses and gets one
//! reply pairing each with the address that routes to it. Messages are
//! framed by a 4-byte header packed as two big-endian 16-bit words:
//!
//! ```text
//! word 0: type:4 | length:12          length counts header + payload
//! word 1: rsvd:4 | sub_type:4 | loc_type:4 | id_type:4
//! ```
//!
//! A request carries `sub_type` in the final nibble with the middle 12 bits
//! reserved; the payload is the concatenated 16-byte identifier addresses.
//! A reply's payload is consecutive 32-byte pairs of (identifier, resolved)
//! addresses.
//!
//! The connection to the resolution peer is scoped per call: connected,
//! used for exactly one exchange, and closed on every exit path. No timeout
//! is imposed here; bound latency at the transport if you need it.

use std::io::{Read, Write};
use std::net::{Ipv6Addr, TcpStream, ToSocketAddrs};

use bytes::BufMut;
use tracing::warn;
use winnow::Parser;
use winnow::binary::be_u16;
use winnow::error::{ContextError, ErrMode};
use winnow::token::take;

use crate::error::{Error, Result};
use crate::map::MapTable;
use crate::store::MappingStore;

type PResult<T> = std::result::Result<T, ErrMode<ContextError>>;

/// Default port the resolution service listens on.
pub const DEFAULT_PORT: u16 = 5555;

/// Message type: map request.
pub const MSG_MAP_REQUEST: u8 = 1;
/// Message type: map info (reply).
pub const MSG_MAP_INFO: u8 = 2;
/// Sub-type: get / map reply.
pub const SUBTYPE_GET: u8 = 1;
/// Sub-type: unsolicited redirect.
pub const SUBTYPE_REDIRECT: u8 = 2;
/// Identifier/locator type: 128-bit address.
pub const IDLOC_TYPE_IPV6_ADDR: u8 = 1;

const HDR_LEN: usize = 4;
const ADDR_LEN: usize = 16;
const PAIR_LEN: usize = 2 * ADDR_LEN;

/// Maximum value of the 12-bit length field.
const MAX_LENGTH: usize = 0x0fff;

/// A parsed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    sub_type: u8,
    pairs: Vec<(Ipv6Addr, Ipv6Addr)>,
}

impl Reply {
    /// The reply's sub-type nibble.
    pub fn sub_type(&self) -> u8 {
        self.sub_type
    }

    /// Whether the peer answered with a sub-type other than a map reply.
    ///
    /// Such replies parse normally; the flag lets callers notice.
    pub fn unexpected_sub_type(&self) -> bool {
        self.sub_type != SUBTYPE_GET
    }

    /// The resolved (identifier, target) address pairs.
    pub fn pairs(&self) -> &[(Ipv6Addr, Ipv6Addr)] {
        &self.pairs
    }

    /// Consume the reply, keeping only the pairs.
    pub fn into_pairs(self) -> Vec<(Ipv6Addr, Ipv6Addr)> {
        self.pairs
    }
}

fn header_words(input: &mut &[u8]) -> PResult<(u16, u16)> {
    let word0 = be_u16.parse_next(input)?;
    let word1 = be_u16.parse_next(input)?;
    Ok((word0, word1))
}

fn pair_bytes<'a>(input: &mut &'a [u8]) -> PResult<&'a [u8]> {
    take(PAIR_LEN).parse_next(input)
}

/// Build a resolution request for `identifiers`.
///
/// The 12-bit length field caps a single request at 255 identifiers;
/// larger batches must be split by the caller.
pub fn build_request(identifiers: &[Ipv6Addr]) -> Result<Vec<u8>> {
    let length = HDR_LEN + ADDR_LEN * identifiers.len();
    if length > MAX_LENGTH {
        return Err(Error::UnexpectedField {
            field: "request length",
            value: length as u64,
        });
    }

    let mut buf = Vec::with_capacity(length);
    buf.put_u16(((MSG_MAP_REQUEST as u16) << 12) | length as u16);
    buf.put_u16(SUBTYPE_GET as u16);
    for ident in identifiers {
        buf.put_slice(&ident.octets());
    }

    Ok(buf)
}

/// Parse one reply buffer.
///
/// A reply whose type is not map-info, or whose identifier or locator type
/// is not the 128-bit address type, is rejected. An unexpected sub-type is
/// tolerated and flagged on the returned [`Reply`]. A truncated trailing
/// pair is skipped with a logged diagnostic rather than failing the whole
/// reply.
pub fn parse_reply(data: &[u8]) -> Result<Reply> {
    let mut input = data;
    let (word0, word1) = header_words(&mut input).map_err(|_| Error::BadLength {
        kind: "reply header",
        expected: HDR_LEN,
        actual: data.len(),
    })?;

    let msg_type = (word0 >> 12) as u8;
    let length = (word0 & 0x0fff) as usize;
    let sub_type = ((word1 >> 8) & 0xf) as u8;
    let loc_type = ((word1 >> 4) & 0xf) as u8;
    let id_type = (word1 & 0xf) as u8;

    if msg_type != MSG_MAP_INFO {
        return Err(Error::UnexpectedField {
            field: "reply type",
            value: msg_type as u64,
        });
    }

    if sub_type != SUBTYPE_GET {
        warn!(sub_type, "unexpected reply sub-type");
    }

    if id_type != IDLOC_TYPE_IPV6_ADDR {
        return Err(Error::UnexpectedField {
            field: "reply identifier type",
            value: id_type as u64,
        });
    }
    if loc_type != IDLOC_TYPE_IPV6_ADDR {
        return Err(Error::UnexpectedField {
            field: "reply locator type",
            value: loc_type as u64,
        });
    }

    if length < HDR_LEN {
        return Err(Error::UnexpectedField {
            field: "reply length",
            value: length as u64,
        });
    }

    let num_pairs = (length - HDR_LEN) / PAIR_LEN;
    let mut pairs = Vec::with_capacity(num_pairs);

    for parsed in 0..num_pairs {
        let pair = match pair_bytes(&mut input) {
            Ok(pair) => pair,
            Err(_) => {
                warn!(
                    declared = num_pairs,
                    parsed, "reply shorter than its declared pair count"
                );
                break;
            }
        };

        let mut source = [0u8; ADDR_LEN];
        let mut target = [0u8; ADDR_LEN];
        source.copy_from_slice(&pair[..ADDR_LEN]);
        target.copy_from_slice(&pair[ADDR_LEN..]);
        pairs.push((Ipv6Addr::from(source), Ipv6Addr::from(target)));
    }

    Ok(Reply { sub_type, pairs })
}

/// Run one request/reply exchange over an established byte stream.
///
/// Writes the request, reads exactly one reply (header, then the payload
/// the header declares), and parses it. This is the transport-agnostic
/// core behind [`resolve`].
pub fn exchange<S: Read + Write>(stream: &mut S, identifiers: &[Ipv6Addr]) -> Result<Reply> {
    let request = build_request(identifiers)?;
    stream.write_all(&request)?;
    stream.flush()?;

    let mut reply = vec![0u8; HDR_LEN];
    stream.read_exact(&mut reply)?;

    let length = (u16::from_be_bytes([reply[0], reply[1]]) & 0x0fff) as usize;
    if length > HDR_LEN {
        let mut payload = vec![0u8; length - HDR_LEN];
        stream.read_exact(&mut payload)?;
        reply.extend_from_slice(&payload);
    }

    parse_reply(&reply)
}

/// Resolve `identifiers` through the resolution service at `peer`.
///
/// Connects a TCP stream, performs one [`exchange`], and closes the
/// connection before returning, on success and on every error path.
pub fn resolve<A: ToSocketAddrs>(
    peer: A,
    identifiers: &[Ipv6Addr],
) -> Result<Vec<(Ipv6Addr, Ipv6Addr)>> {
    let mut stream = TcpStream::connect(peer)?;
    let reply = exchange(&mut stream, identifiers)?;
    Ok(reply.into_pairs())
}

/// Serve one request from the map table, producing the reply buffer.
///
/// Each requested identifier yields a pair: the identifier itself, and the
/// identifier with its top 8 bytes replaced by the mapped locator. Unknown
/// identifiers resolve to the all-zero address; a store read failure is
/// logged and resolves the same way so one bad row cannot fail the batch.
pub fn respond<S: MappingStore>(table: &mut MapTable<S>, request: &[u8]) -> Result<Vec<u8>> {
    let mut input = request;
    let (word0, word1) = header_words(&mut input).map_err(|_| Error::BadLength {
        kind: "request header",
        expected: HDR_LEN,
        actual: request.len(),
    })?;

    let msg_type = (word0 >> 12) as u8;
    let sub_type = (word1 & 0xf) as u8;

    if msg_type != MSG_MAP_REQUEST {
        return Err(Error::UnexpectedField {
            field: "request type",
            value: msg_type as u64,
        });
    }
    if sub_type != SUBTYPE_GET {
        return Err(Error::UnexpectedField {
            field: "request sub-type",
            value: sub_type as u64,
        });
    }
    if input.len() % ADDR_LEN != 0 {
        return Err(Error::UnexpectedField {
            field: "request payload length",
            value: input.len() as u64,
        });
    }

    let count = input.len() / ADDR_LEN;
    let length = HDR_LEN + PAIR_LEN * count;
    if length > MAX_LENGTH {
        return Err(Error::UnexpectedField {
            field: "reply length",
            value: length as u64,
        });
    }

    let mut buf = Vec::with_capacity(length);
    buf.put_u16(((MSG_MAP_INFO as u16) << 12) | length as u16);
    buf.put_u16(
        ((SUBTYPE_GET as u16) << 8)
            | ((IDLOC_TYPE_IPV6_ADDR as u16) << 4)
            | IDLOC_TYPE_IPV6_ADDR as u16,
    );

    for chunk in input.chunks_exact(ADDR_LEN) {
        let mut octets = [0u8; ADDR_LEN];
        octets.copy_from_slice(chunk);
        let ident = Ipv6Addr::from(octets);
        buf.put_slice(&octets);

        let resolved = match table.get(ident) {
            Ok(Some(entry)) => {
                let mut out = octets;
                out[..8].copy_from_slice(entry.locator.as_bytes());
                out
            }
            Ok(None) => [0u8; ADDR_LEN],
            Err(err) => {
                warn!(%ident, error = %err, "map lookup failed while serving request");
                [0u8; ADDR_LEN]
            }
        };
        buf.put_slice(&resolved);
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Addr64;
    use crate::map::MapEntry;
    use crate::store::MemoryStore;
    use std::io::{self, Cursor};

    fn addr(s: &str) -> Ipv6Addr {
        s.parse().unwrap()
    }

    fn loc(s: &str) -> Addr64 {
        s.parse().unwrap()
    }

    fn reply_header(msg_type: u8, length: u16, sub: u8, loc: u8, id: u8) -> Vec<u8> {
        let word0 = ((msg_type as u16) << 12) | length;
        let word1 = ((sub as u16) << 8) | ((loc as u16) << 4) | id as u16;
        let mut buf = Vec::new();
        buf.extend_from_slice(&word0.to_be_bytes());
        buf.extend_from_slice(&word1.to_be_bytes());
        buf
    }

    #[test]
    fn test_request_framing() {
        let req = build_request(&[addr("2001:db8::1"), addr("2001:db8::2")]).unwrap();
        assert_eq!(req.len(), 36);
        // type=1, length=36 -> 0x1024; sub_type=1 in the final nibble.
        assert_eq!(&req[..4], &[0x10, 0x24, 0x00, 0x01]);
        assert_eq!(&req[4..20], &addr("2001:db8::1").octets());
        assert_eq!(&req[20..36], &addr("2001:db8::2").octets());
    }

    #[test]
    fn test_request_empty_batch() {
        let req = build_request(&[]).unwrap();
        assert_eq!(req, vec![0x10, 0x04, 0x00, 0x01]);
    }

    #[test]
    fn test_request_batch_too_large() {
        let idents = vec![addr("::1"); 256];
        assert!(build_request(&idents).is_err());
        assert!(build_request(&idents[..255]).is_ok());
    }

    #[test]
    fn test_reply_single_pair() {
        let mut buf = reply_header(MSG_MAP_INFO, 36, SUBTYPE_GET, 1, 1);
        buf.extend_from_slice(&addr("2001:db8::1").octets());
        buf.extend_from_slice(&addr("2001:db8:aaaa::1").octets());

        let reply = parse_reply(&buf).unwrap();
        assert!(!reply.unexpected_sub_type());
        assert_eq!(
            reply.pairs(),
            &[(addr("2001:db8::1"), addr("2001:db8:aaaa::1"))]
        );
    }

    #[test]
    fn test_reply_wrong_type_rejected() {
        let buf = reply_header(MSG_MAP_REQUEST, 4, SUBTYPE_GET, 1, 1);
        let err = parse_reply(&buf).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_reply_unexpected_sub_type_is_parsed_and_flagged() {
        let mut buf = reply_header(MSG_MAP_INFO, 36, SUBTYPE_REDIRECT, 1, 1);
        buf.extend_from_slice(&addr("::1").octets());
        buf.extend_from_slice(&addr("::2").octets());

        let reply = parse_reply(&buf).unwrap();
        assert!(reply.unexpected_sub_type());
        assert_eq!(reply.sub_type(), SUBTYPE_REDIRECT);
        assert_eq!(reply.pairs().len(), 1);
    }

    #[test]
    fn test_reply_rejects_zero_loc_type() {
        // loc_type 0 with id_type 1 must be rejected, even though a
        // bitwise reading of the validity check would let it through.
        let buf = reply_header(MSG_MAP_INFO, 4, SUBTYPE_GET, 0, 1);
        let err = parse_reply(&buf).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedField {
                field: "reply locator type",
                value: 0
            }
        ));
    }

    #[test]
    fn test_reply_rejects_bad_id_type_even_with_good_loc_type() {
        // id_type 2 with loc_type 1: the other combination a bitwise
        // reading of the check would accept.
        let buf = reply_header(MSG_MAP_INFO, 4, SUBTYPE_GET, 1, 2);
        let err = parse_reply(&buf).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedField {
                field: "reply identifier type",
                value: 2
            }
        ));
    }

    #[test]
    fn test_reply_truncated_pair_skipped() {
        // Declares two pairs but carries one and a half.
        let mut buf = reply_header(MSG_MAP_INFO, 4 + 64, SUBTYPE_GET, 1, 1);
        buf.extend_from_slice(&addr("::1").octets());
        buf.extend_from_slice(&addr("::2").octets());
        buf.extend_from_slice(&[0u8; 16]);

        let reply = parse_reply(&buf).unwrap();
        assert_eq!(reply.pairs(), &[(addr("::1"), addr("::2"))]);
    }

    #[test]
    fn test_reply_short_header() {
        let err = parse_reply(&[0x20]).unwrap_err();
        assert!(matches!(err, Error::BadLength { actual: 1, .. }));
    }

    #[test]
    fn test_respond_resolves_known_and_unknown() {
        let mut table = MapTable::new(MemoryStore::new());
        let known = addr("2001:db8::5");
        table.make(known, MapEntry::new(loc("aaaa:bbbb:cccc:dddd"))).unwrap();

        let request = build_request(&[known, addr("2001:db8::6")]).unwrap();
        let reply = respond(&mut table, &request).unwrap();
        let reply = parse_reply(&reply).unwrap();

        assert_eq!(reply.pairs().len(), 2);
        assert_eq!(reply.pairs()[0].0, known);
        // Top 8 bytes replaced by the locator, identifier half kept.
        assert_eq!(
            reply.pairs()[0].1,
            addr("aaaa:bbbb:cccc:dddd:0:0:0:5")
        );
        // Unknown identifiers resolve to the all-zero address.
        assert_eq!(reply.pairs()[1].1, Ipv6Addr::UNSPECIFIED);
    }

    #[test]
    fn test_respond_rejects_bad_requests() {
        let mut table = MapTable::new(MemoryStore::new());

        // Reply-typed message is not a request.
        let not_request = reply_header(MSG_MAP_INFO, 4, SUBTYPE_GET, 1, 1);
        assert!(respond(&mut table, &not_request).is_err());

        // Ragged address block.
        let mut ragged = build_request(&[addr("::1")]).unwrap();
        ragged.push(0xff);
        assert!(respond(&mut table, &ragged).is_err());
    }

    /// One-shot in-memory stream: sinks the request, serves a canned reply.
    struct CannedStream {
        reply: Cursor<Vec<u8>>,
    }

    impl io::Read for CannedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reply.read(buf)
        }
    }

    impl io::Write for CannedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_exchange_reads_one_framed_reply() {
        let mut table = MapTable::new(MemoryStore::new());
        let ident = addr("2001:db8::9");
        table.make(ident, MapEntry::new(loc("1:2:3:4"))).unwrap();

        let request = build_request(&[ident]).unwrap();
        let mut canned = respond(&mut table, &request).unwrap();
        // Trailing bytes past the declared length must be left unread.
        canned.extend_from_slice(&[0xde, 0xad]);

        let mut stream = CannedStream {
            reply: Cursor::new(canned),
        };
        let reply = exchange(&mut stream, &[ident]).unwrap();
        assert_eq!(reply.pairs().len(), 1);
        assert_eq!(reply.pairs()[0].1, addr("1:2:3:4:0:0:0:9"));
    }

    #[test]
    fn test_exchange_connection_drop_is_connection_error() {
        let mut stream = CannedStream {
            reply: Cursor::new(vec![0x20]),
        };
        let err = exchange(&mut stream, &[addr("::1")]).unwrap_err();
        assert!(err.is_connection());
    }
}
