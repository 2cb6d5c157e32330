use mibfs_types::Oid;
use std::io::ErrorKind;

/// Error while talking to an SNMP agent.
///
/// This type exists mainly so that errors can be converted when
/// needed to OS I/O errors.
#[derive(Debug, thiserror::Error)]
pub enum SnmpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no response from agent after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("malformed SNMP message: {0}")]
    Malformed(&'static str),

    #[error("agent reported error status {status}, index {index}")]
    ErrorStatus { status: i64, index: i64 },

    #[error("OID {0} cannot be encoded")]
    UnencodableOid(Oid),
}

impl SnmpError {
    /// Return the [ErrorKind] that best describes this error.
    pub fn io_kind(&self) -> ErrorKind {
        match self {
            SnmpError::Io(err) => err.kind(),
            SnmpError::Timeout { .. } => ErrorKind::TimedOut,
            SnmpError::Malformed(_) => ErrorKind::InvalidData,
            SnmpError::ErrorStatus { .. } => ErrorKind::Other,
            SnmpError::UnencodableOid(_) => ErrorKind::InvalidInput,
        }
    }
}
