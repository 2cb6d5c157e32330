//! Wire codec for the SNMPv2c subset this crate speaks.
//!
//! Covers exactly what GET needs: BER TLVs with definite lengths,
//! two's-complement integers, base-128 OID arcs, the SNMPv2
//! application types and the varbind exception markers. Anything
//! outside that subset is rejected with [SnmpError::Malformed].

use crate::error::SnmpError;
use crate::value::{Value, VarBind};
use mibfs_types::Oid;
use std::net::Ipv4Addr;

/// Version field value for SNMPv2c, the only version spoken here.
pub const VERSION_2C: i64 = 1;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_IPADDRESS: u8 = 0x40;
const TAG_COUNTER32: u8 = 0x41;
const TAG_GAUGE32: u8 = 0x42;
const TAG_TIMETICKS: u8 = 0x43;
const TAG_OPAQUE: u8 = 0x44;
const TAG_COUNTER64: u8 = 0x46;
const TAG_NO_SUCH_OBJECT: u8 = 0x80;
const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
const TAG_END_OF_MIB_VIEW: u8 = 0x82;
const TAG_GET_REQUEST: u8 = 0xa0;
const TAG_RESPONSE: u8 = 0xa2;

/// A decoded SNMP message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub version: i64,
    pub community: Vec<u8>,
    pub pdu: Pdu,
}

/// The PDU part of a [Message].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pdu {
    pub kind: PduKind,
    pub request_id: i32,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<VarBind>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PduKind {
    GetRequest,
    Response,
}

/// Encode a GetRequest asking for a single OID.
pub fn encode_get(community: &[u8], request_id: i32, oid: &Oid) -> Result<Vec<u8>, SnmpError> {
    let mut vb = Vec::new();
    push_tlv(&mut vb, TAG_OID, &encode_oid(oid)?);
    push_tlv(&mut vb, TAG_NULL, &[]);

    let mut vbl = Vec::new();
    push_tlv(&mut vbl, TAG_SEQUENCE, &vb);

    Ok(encode_message(
        community,
        TAG_GET_REQUEST,
        request_id,
        0,
        0,
        &vbl,
    ))
}

/// Encode a Response carrying the given varbinds.
///
/// This is the agent side of the exchange; in this crate it serves
/// the test agent.
pub fn encode_response(
    community: &[u8],
    request_id: i32,
    error_status: i64,
    error_index: i64,
    varbinds: &[VarBind],
) -> Result<Vec<u8>, SnmpError> {
    let mut vbl = Vec::new();
    for varbind in varbinds {
        let mut vb = Vec::new();
        push_tlv(&mut vb, TAG_OID, &encode_oid(&varbind.oid)?);
        push_value(&mut vb, &varbind.value)?;
        push_tlv(&mut vbl, TAG_SEQUENCE, &vb);
    }

    Ok(encode_message(
        community,
        TAG_RESPONSE,
        request_id,
        error_status,
        error_index,
        &vbl,
    ))
}

/// Decode an SNMP message from a single datagram.
///
/// The whole buffer must be one message; trailing bytes are rejected.
pub fn decode_message(buf: &[u8]) -> Result<Message, SnmpError> {
    let mut outer = Cursor::new(buf);
    let msg = outer.expect_tlv(TAG_SEQUENCE)?;
    outer.expect_end()?;

    let mut msg = Cursor::new(msg);
    let version = decode_integer(msg.expect_tlv(TAG_INTEGER)?)?;
    let community = msg.expect_tlv(TAG_OCTET_STRING)?.to_vec();
    let (pdu_tag, pdu) = msg.read_tlv()?;
    msg.expect_end()?;

    let kind = match pdu_tag {
        TAG_GET_REQUEST => PduKind::GetRequest,
        TAG_RESPONSE => PduKind::Response,
        _ => return Err(SnmpError::Malformed("unsupported PDU type")),
    };

    let mut pdu = Cursor::new(pdu);
    let request_id = i32::try_from(decode_integer(pdu.expect_tlv(TAG_INTEGER)?)?)
        .map_err(|_| SnmpError::Malformed("request-id out of range"))?;
    let error_status = decode_integer(pdu.expect_tlv(TAG_INTEGER)?)?;
    let error_index = decode_integer(pdu.expect_tlv(TAG_INTEGER)?)?;

    let mut vbl = Cursor::new(pdu.expect_tlv(TAG_SEQUENCE)?);
    pdu.expect_end()?;
    let mut varbinds = Vec::new();
    while !vbl.is_empty() {
        let mut vb = Cursor::new(vbl.expect_tlv(TAG_SEQUENCE)?);
        let oid = decode_oid(vb.expect_tlv(TAG_OID)?)?;
        let (tag, contents) = vb.read_tlv()?;
        vb.expect_end()?;
        varbinds.push(VarBind {
            oid,
            value: decode_value(tag, contents)?,
        });
    }

    Ok(Message {
        version,
        community,
        pdu: Pdu {
            kind,
            request_id,
            error_status,
            error_index,
            varbinds,
        },
    })
}

fn encode_message(
    community: &[u8],
    pdu_tag: u8,
    request_id: i32,
    error_status: i64,
    error_index: i64,
    varbind_list: &[u8],
) -> Vec<u8> {
    let mut pdu = Vec::new();
    push_tlv(&mut pdu, TAG_INTEGER, &encode_integer(request_id as i64));
    push_tlv(&mut pdu, TAG_INTEGER, &encode_integer(error_status));
    push_tlv(&mut pdu, TAG_INTEGER, &encode_integer(error_index));
    push_tlv(&mut pdu, TAG_SEQUENCE, varbind_list);

    let mut msg = Vec::new();
    push_tlv(&mut msg, TAG_INTEGER, &encode_integer(VERSION_2C));
    push_tlv(&mut msg, TAG_OCTET_STRING, community);
    push_tlv(&mut msg, pdu_tag, &pdu);

    let mut out = Vec::new();
    push_tlv(&mut out, TAG_SEQUENCE, &msg);

    out
}

fn push_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), SnmpError> {
    match value {
        Value::Integer(v) => push_tlv(buf, TAG_INTEGER, &encode_integer(*v)),
        Value::OctetString(bytes) => push_tlv(buf, TAG_OCTET_STRING, bytes),
        Value::Null => push_tlv(buf, TAG_NULL, &[]),
        Value::Oid(oid) => push_tlv(buf, TAG_OID, &encode_oid(oid)?),
        Value::IpAddress(addr) => push_tlv(buf, TAG_IPADDRESS, &addr.octets()),
        Value::Counter32(v) => push_tlv(buf, TAG_COUNTER32, &encode_unsigned(*v as u64)),
        Value::Gauge32(v) => push_tlv(buf, TAG_GAUGE32, &encode_unsigned(*v as u64)),
        Value::TimeTicks(v) => push_tlv(buf, TAG_TIMETICKS, &encode_unsigned(*v as u64)),
        Value::Opaque(bytes) => push_tlv(buf, TAG_OPAQUE, bytes),
        Value::Counter64(v) => push_tlv(buf, TAG_COUNTER64, &encode_unsigned(*v)),
        Value::NoSuchObject => push_tlv(buf, TAG_NO_SUCH_OBJECT, &[]),
        Value::NoSuchInstance => push_tlv(buf, TAG_NO_SUCH_INSTANCE, &[]),
        Value::EndOfMibView => push_tlv(buf, TAG_END_OF_MIB_VIEW, &[]),
    }

    Ok(())
}

fn decode_value(tag: u8, contents: &[u8]) -> Result<Value, SnmpError> {
    Ok(match tag {
        TAG_INTEGER => Value::Integer(decode_integer(contents)?),
        TAG_OCTET_STRING => Value::OctetString(contents.to_vec()),
        TAG_NULL => {
            if !contents.is_empty() {
                return Err(SnmpError::Malformed("NULL with content"));
            }
            Value::Null
        }
        TAG_OID => Value::Oid(decode_oid(contents)?),
        TAG_IPADDRESS => {
            let octets: [u8; 4] = contents
                .try_into()
                .map_err(|_| SnmpError::Malformed("IpAddress must be 4 bytes"))?;
            Value::IpAddress(Ipv4Addr::from(octets))
        }
        TAG_COUNTER32 => Value::Counter32(decode_unsigned32(contents)?),
        TAG_GAUGE32 => Value::Gauge32(decode_unsigned32(contents)?),
        TAG_TIMETICKS => Value::TimeTicks(decode_unsigned32(contents)?),
        TAG_OPAQUE => Value::Opaque(contents.to_vec()),
        TAG_COUNTER64 => Value::Counter64(decode_unsigned(contents)?),
        TAG_NO_SUCH_OBJECT => Value::NoSuchObject,
        TAG_NO_SUCH_INSTANCE => Value::NoSuchInstance,
        TAG_END_OF_MIB_VIEW => Value::EndOfMibView,
        _ => return Err(SnmpError::Malformed("unsupported value type")),
    })
}

fn push_tlv(buf: &mut Vec<u8>, tag: u8, contents: &[u8]) {
    buf.push(tag);
    push_len(buf, contents.len());
    buf.extend_from_slice(contents);
}

fn push_len(buf: &mut Vec<u8>, len: usize) {
    if len < 128 {
        buf.push(len as u8);
        return;
    }
    let bytes = (len as u64).to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    buf.push(0x80 | (bytes.len() - skip) as u8);
    buf.extend_from_slice(&bytes[skip..]);
}

/// Encode an integer as its shortest two's-complement form.
fn encode_integer(v: i64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = match bytes[start] {
            0x00 => bytes[start + 1] & 0x80 == 0,
            0xff => bytes[start + 1] & 0x80 != 0,
            _ => false,
        };
        if !redundant {
            break;
        }
        start += 1;
    }

    bytes[start..].to_vec()
}

/// Encode an unsigned value, adding a leading zero byte when the top
/// bit would otherwise read as a sign.
fn encode_unsigned(v: u64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 && bytes[start] == 0 && bytes[start + 1] & 0x80 == 0 {
        start += 1;
    }
    let mut out = Vec::with_capacity(bytes.len() - start + 1);
    if bytes[start] & 0x80 != 0 {
        out.push(0x00);
    }
    out.extend_from_slice(&bytes[start..]);

    out
}

fn decode_integer(contents: &[u8]) -> Result<i64, SnmpError> {
    if contents.is_empty() || contents.len() > 8 {
        return Err(SnmpError::Malformed("bad INTEGER length"));
    }
    let mut v: i64 = if contents[0] & 0x80 != 0 { -1 } else { 0 };
    for b in contents {
        v = (v << 8) | (*b as i64);
    }

    Ok(v)
}

fn decode_unsigned(contents: &[u8]) -> Result<u64, SnmpError> {
    let contents = match contents {
        [0x00, rest @ ..] if !rest.is_empty() => rest,
        _ => contents,
    };
    if contents.is_empty() || contents.len() > 8 {
        return Err(SnmpError::Malformed("bad unsigned length"));
    }
    let mut v = 0u64;
    for b in contents {
        v = (v << 8) | (*b as u64);
    }

    Ok(v)
}

fn decode_unsigned32(contents: &[u8]) -> Result<u32, SnmpError> {
    u32::try_from(decode_unsigned(contents)?)
        .map_err(|_| SnmpError::Malformed("32-bit value out of range"))
}

/// Encode the arcs of an OID.
///
/// The first two arcs share a byte, per X.690, which limits what can
/// be expressed: at least two arcs, the first at most 2, the second
/// at most 39 under arc 0 and 1.
fn encode_oid(oid: &Oid) -> Result<Vec<u8>, SnmpError> {
    let arcs = oid.arcs();
    if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] > 39) {
        return Err(SnmpError::UnencodableOid(oid.clone()));
    }

    let mut out = Vec::new();
    push_subid(&mut out, 40 * arcs[0] as u64 + arcs[1] as u64);
    for arc in &arcs[2..] {
        push_subid(&mut out, *arc as u64);
    }

    Ok(out)
}

fn push_subid(buf: &mut Vec<u8>, subid: u64) {
    let mut groups = [0u8; 10];
    let mut n = 0;
    let mut rest = subid;
    loop {
        groups[n] = (rest & 0x7f) as u8;
        n += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    while n > 1 {
        n -= 1;
        buf.push(groups[n] | 0x80);
    }
    buf.push(groups[0]);
}

fn decode_oid(contents: &[u8]) -> Result<Oid, SnmpError> {
    let mut subids = Vec::new();
    let mut subid = 0u64;
    let mut partial = false;
    for b in contents {
        if subid > (u64::MAX >> 7) {
            return Err(SnmpError::Malformed("OID arc overflow"));
        }
        subid = (subid << 7) | (*b & 0x7f) as u64;
        partial = true;
        if b & 0x80 == 0 {
            subids.push(subid);
            subid = 0;
            partial = false;
        }
    }
    if partial {
        return Err(SnmpError::Malformed("truncated OID arc"));
    }
    let first = *subids.first().ok_or(SnmpError::Malformed("empty OID"))?;
    let (a, b) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };
    let mut arcs = Vec::with_capacity(subids.len() + 1);
    arcs.push(a);
    arcs.push(oid_arc(b)?);
    for subid in &subids[1..] {
        arcs.push(oid_arc(*subid)?);
    }

    Oid::from_arcs(arcs).map_err(|_| SnmpError::Malformed("empty OID"))
}

fn oid_arc(subid: u64) -> Result<u32, SnmpError> {
    u32::try_from(subid).map_err(|_| SnmpError::Malformed("OID arc overflow"))
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Cursor<'a> {
        Cursor { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_u8(&mut self) -> Result<u8, SnmpError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or(SnmpError::Malformed("truncated message"))?;
        self.pos += 1;

        Ok(b)
    }

    fn read_len(&mut self) -> Result<usize, SnmpError> {
        let first = self.read_u8()?;
        if first & 0x80 == 0 {
            return Ok(first as usize);
        }
        let n = (first & 0x7f) as usize;
        if n == 0 || n > 4 {
            // No indefinite lengths and nothing a datagram can hold.
            return Err(SnmpError::Malformed("unsupported length encoding"));
        }
        let mut len = 0usize;
        for _ in 0..n {
            len = (len << 8) | self.read_u8()? as usize;
        }

        Ok(len)
    }

    fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), SnmpError> {
        let tag = self.read_u8()?;
        let len = self.read_len()?;
        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(SnmpError::Malformed("element overruns message"))?;
        self.pos = end;

        Ok((tag, &self.buf[start..end]))
    }

    fn expect_tlv(&mut self, tag: u8) -> Result<&'a [u8], SnmpError> {
        let (actual, contents) = self.read_tlv()?;
        if actual != tag {
            return Err(SnmpError::Malformed("unexpected element tag"));
        }

        Ok(contents)
    }

    fn expect_end(&self) -> Result<(), SnmpError> {
        if !self.is_empty() {
            return Err(SnmpError::Malformed("trailing bytes"));
        }

        Ok(())
    }
}
