use mibfs_types::Oid;
use std::fmt;
use std::net::Ipv4Addr;

/// A decoded variable binding: an OID and the value bound to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: Value,
}

/// An SNMP value, as reported by an agent.
///
/// The last three variants are the SNMPv2 exception markers. They are
/// delivered in an otherwise successful response; test for them with
/// [Value::is_exception].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    Oid(Oid),
    IpAddress(Ipv4Addr),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl Value {
    /// Return true if this value is an exception marker rather than
    /// actual data.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }
}

/// The textual form of a value, used verbatim as file content.
///
/// Octet strings render as text when they hold clean UTF-8, as
/// colon-separated hex pairs otherwise. TimeTicks render as
/// "Nd HH:MM:SS.CC". Null renders as the empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::OctetString(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) if s.chars().all(|c| !c.is_control() || c.is_whitespace()) => {
                    f.write_str(s)
                }
                _ => write_hex(f, bytes),
            },
            Value::Null => Ok(()),
            Value::Oid(oid) => write!(f, "{oid}"),
            Value::IpAddress(addr) => write!(f, "{addr}"),
            Value::Counter32(v) => write!(f, "{v}"),
            Value::Gauge32(v) => write!(f, "{v}"),
            Value::TimeTicks(v) => {
                let days = v / 8_640_000;
                let hours = v / 360_000 % 24;
                let minutes = v / 6_000 % 60;
                let seconds = v / 100 % 60;
                let centis = v % 100;
                write!(f, "{days}d {hours:02}:{minutes:02}:{seconds:02}.{centis:02}")
            }
            Value::Opaque(bytes) => write_hex(f, bytes),
            Value::Counter64(v) => write!(f, "{v}"),
            Value::NoSuchObject => f.write_str("noSuchObject"),
            Value::NoSuchInstance => f.write_str("noSuchInstance"),
            Value::EndOfMibView => f.write_str("endOfMibView"),
        }
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    let mut first = true;
    for b in bytes {
        if !first {
            f.write_str(":")?;
        }
        write!(f, "{b:02x}")?;
        first = false;
    }

    Ok(())
}
