use crate::fs::error::FsError;
use libc::c_int;

/// Intermediate error type to catch and convert to libc error codes,
/// to report errors to fuser.
#[derive(Debug, thiserror::Error)]
pub(crate) enum FuseError {
    #[error(transparent)]
    Fs(#[from] FsError),

    /// The kernel sent a name that is not valid UTF-8; nothing in
    /// the tree can match it.
    #[error("invalid UTF-8 in name")]
    Utf8,
}

impl FuseError {
    /// Return a libc error code to represent this error, fuse-side.
    pub(crate) fn errno(&self) -> c_int {
        match self {
            FuseError::Fs(FsError::ReadOnly) => libc::EROFS,
            FuseError::Fs(FsError::Snmp(err)) => io_errno(err.io_kind()),
            FuseError::Fs(FsError::Exception { .. }) => libc::EIO,
            FuseError::Fs(FsError::NotFound) => libc::ENOENT,
            FuseError::Fs(FsError::NotADirectory) => libc::ENOTDIR,
            FuseError::Fs(FsError::IsADirectory) => libc::EISDIR,
            FuseError::Utf8 => libc::EINVAL,
        }
    }

    /// Convert into a libc error code, logging it.
    pub(crate) fn log_and_convert(self) -> c_int {
        let errno = self.errno();

        log::debug!("FUSE operation error: {self:?} -> {errno}");

        errno
    }
}

/// Convert a Rust [std::io::ErrorKind] into a libc error code.
fn io_errno(kind: std::io::ErrorKind) -> c_int {
    match kind {
        std::io::ErrorKind::NotFound => libc::ENOENT,
        std::io::ErrorKind::PermissionDenied => libc::EACCES,
        std::io::ErrorKind::ConnectionRefused => libc::ECONNREFUSED,
        std::io::ErrorKind::ConnectionReset => libc::ECONNRESET,
        std::io::ErrorKind::ConnectionAborted => libc::ECONNABORTED,
        std::io::ErrorKind::NotConnected => libc::ENOTCONN,
        std::io::ErrorKind::AddrInUse => libc::EADDRINUSE,
        std::io::ErrorKind::AddrNotAvailable => libc::EADDRNOTAVAIL,
        std::io::ErrorKind::NetworkDown => libc::ENETDOWN,
        std::io::ErrorKind::NetworkUnreachable => libc::ENETUNREACH,
        std::io::ErrorKind::HostUnreachable => libc::EHOSTUNREACH,
        std::io::ErrorKind::WouldBlock => libc::EAGAIN,
        std::io::ErrorKind::TimedOut => libc::ETIMEDOUT,
        std::io::ErrorKind::InvalidInput => libc::EINVAL,
        std::io::ErrorKind::InvalidData => libc::EINVAL,
        std::io::ErrorKind::Interrupted => libc::EINTR,
        std::io::ErrorKind::Unsupported => libc::ENOSYS,
        std::io::ErrorKind::OutOfMemory => libc::ENOMEM,
        _ => libc::EIO,
    }
}
