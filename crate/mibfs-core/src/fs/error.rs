use mibfs_snmp::{SnmpError, Value};
use mibfs_types::Oid;

/// Error returned by node and tree operations.
///
/// This type exists mainly so that errors can be converted, when
/// needed, to OS I/O errors, to be reported to the kernel.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// Every modification is rejected with this error.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// Talking to the agent failed.
    #[error(transparent)]
    Snmp(#[from] SnmpError),

    /// The agent answered, but with an exception marker instead of a
    /// value.
    #[error("{oid}: agent answered {value}")]
    Exception { oid: Oid, value: Value },

    #[error("not found")]
    NotFound,

    #[error("not a directory")]
    NotADirectory,

    #[error("is a directory")]
    IsADirectory,
}
