use std::fmt;
use std::io;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// A contract violation by the caller or the plan builder: use before
    /// `initialize`, a non-monotonic `move_to`, or a missing evaluation
    /// context. Never retryable; continuing would corrupt result ordering.
    IllegalState(String),
    /// A start/stop key or a physical entry that does not decode into a
    /// structured posting key.
    MalformedKey(String),
    UnsupportedOperation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{}", e),
            Error::IllegalState(reason) => write!(f, "{}", reason),
            Error::MalformedKey(reason) => write!(f, "Malformed posting key: {}", reason),
            Error::UnsupportedOperation(reason) => write!(f, "{}", reason),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
