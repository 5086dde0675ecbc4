use std::fmt;

use crate::types::Field;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Timeout,
    Status(u16),
    Protocol(String),
    Json(serde_json::Error),
    UnsupportedTargetMode(u8),
    OutOfRange { field: Field, value: f64 },
    InvalidCharacteristicValue { characteristic: &'static str, value: String },
    Io(std::io::Error),
}

/// Coarse classification used by callers to decide how a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Device unreachable or too slow to answer.
    Transport,
    /// Device answered, but not with a successful envelope.
    Protocol,
    /// Command value rejected before reaching the network.
    Validation,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(e) if e.is_decode() => ErrorKind::Protocol,
            Error::Http(_) | Error::Timeout => ErrorKind::Transport,
            Error::Status(_) | Error::Protocol(_) | Error::Json(_) => ErrorKind::Protocol,
            Error::UnsupportedTargetMode(_)
            | Error::OutOfRange { .. }
            | Error::InvalidCharacteristicValue { .. } => ErrorKind::Validation,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Timeout => write!(f, "request timed out"),
            Error::Status(code) => write!(f, "unexpected HTTP status: {code}"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::Json(e) => write!(f, "malformed response body: {e}"),
            Error::UnsupportedTargetMode(v) => write!(f, "unsupported target mode: {v}"),
            Error::OutOfRange { field, value } => {
                write!(f, "value {value} out of range for {field}")
            }
            Error::InvalidCharacteristicValue {
                characteristic,
                value,
            } => write!(f, "invalid value for {characteristic}: {value}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(e)
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
