//! Common error types for transport operations

use core::fmt;

/// A common error type for transport operations.
///
/// This enum defines the faults a transport adapter can hit while reading
/// commands or writing acknowledgments. It is designed to be simple and
/// portable for `no_std` environments.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// A read timed out (idle peer).
    Timeout,
    /// The connection was closed.
    ConnectionClosed,
    /// The peer reset or aborted the connection.
    ConnectionReset,
    /// An invalid address was provided.
    InvalidAddress,
    /// The listening socket could not be bound.
    BindError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotOpen => write!(f, "connection not open"),
            Error::WriteError => write!(f, "write failed"),
            Error::ReadError => write!(f, "read failed"),
            Error::Timeout => write!(f, "timed out"),
            Error::ConnectionClosed => write!(f, "connection closed"),
            Error::ConnectionReset => write!(f, "connection reset by peer"),
            Error::InvalidAddress => write!(f, "invalid address"),
            Error::BindError => write!(f, "cannot bind listening socket"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::ConnectionReset => defmt::write!(f, "ConnectionReset"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
            Error::BindError => defmt::write!(f, "BindError"),
        }
    }
}
