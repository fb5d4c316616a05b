//! Error types for ndforge

use std::io;
use thiserror::Error;

/// Result type alias for ndforge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], reported next to its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A layer could not be serialized into a valid frame
    Encoding,
    /// A raw socket could not be opened for an interface
    Interface,
    /// A frame could not be (completely) written to the wire
    Transmit,
    /// A caller-supplied value was rejected
    InvalidParameter,
    /// Unclassified I/O failure
    Io,
    /// Task or worker lifecycle failure
    Execution,
    /// A looked-up resource does not exist
    NotFound,
}

impl ErrorCode {
    /// Short stable name, suitable for log fields
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Encoding => "encoding",
            ErrorCode::Interface => "interface",
            ErrorCode::Transmit => "transmit",
            ErrorCode::InvalidParameter => "invalid-parameter",
            ErrorCode::Io => "io",
            ErrorCode::Execution => "execution",
            ErrorCode::NotFound => "not-found",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for ndforge
#[derive(Error, Debug)]
pub enum Error {
    /// Network I/O error
    #[error("Network I/O error: {0}")]
    Io(#[from] io::Error),

    /// Frame encoding error
    #[error("Packet encoding error: {0}")]
    Encoding(String),

    /// Invalid parameter error
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Interface not found
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Insufficient privileges to open a raw socket
    #[error("Insufficient privileges: {0}")]
    InsufficientPrivileges(String),

    /// Interface error
    #[error("Interface error on '{name}': {reason}")]
    Interface { name: String, reason: String },

    /// Transmit failure, including short writes
    #[error("Transmit error on '{interface}': {reason}")]
    Transmit { interface: String, reason: String },

    /// Frame does not fit the interface MTU
    #[error("Frame of {len} bytes exceeds the {max} byte limit of '{interface}'")]
    FrameTooLarge {
        interface: String,
        len: usize,
        max: usize,
    },

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Execution failed
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Operation interrupted
    #[error("Operation interrupted: {0}")]
    Interrupted(String),
}

impl Error {
    /// Create an encoding error with a custom message
    pub fn encoding<S: Into<String>>(msg: S) -> Self {
        Error::Encoding(msg.into())
    }

    /// Create an interface error for the named interface
    pub fn interface<N: Into<String>, S: Into<String>>(name: N, reason: S) -> Self {
        Error::Interface {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a transmit error for the named interface
    pub fn transmit<N: Into<String>, S: Into<String>>(interface: N, reason: S) -> Self {
        Error::Transmit {
            interface: interface.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Classify an OS error raised while opening a socket on `name`.
    pub fn from_open_error(name: &str, err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EPERM) | Some(libc::EACCES) => Error::InsufficientPrivileges(format!(
                "raw socket on '{}' requires CAP_NET_RAW: {}",
                name, err
            )),
            Some(libc::ENODEV) | Some(libc::ENXIO) | Some(libc::ENOENT) => {
                Error::InterfaceNotFound(name.to_string())
            }
            _ => Error::interface(name, err.to_string()),
        }
    }

    /// Tagged code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Io(_) => ErrorCode::Io,
            Error::Encoding(_) => ErrorCode::Encoding,
            Error::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            Error::InterfaceNotFound(_)
            | Error::InsufficientPrivileges(_)
            | Error::Interface { .. } => ErrorCode::Interface,
            Error::Transmit { .. } | Error::FrameTooLarge { .. } => ErrorCode::Transmit,
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::ExecutionFailed(_) | Error::Interrupted(_) => ErrorCode::Execution,
        }
    }

    /// True for errors raised while opening or resolving an interface
    pub fn is_interface_error(&self) -> bool {
        self.code() == ErrorCode::Interface
    }
}
