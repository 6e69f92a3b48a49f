//! Error handling for treecli.

use std::fmt;

/// The main error type for treecli operations.
#[derive(Debug)]
pub enum Error {
    /// A command tree was reached without a sub-command being selected.
    InvalidUsage(String),
    /// A command rejected its parsed arguments before running.
    Validation { command: String, message: String },
    /// The argument bag selected a name that the tree does not own.
    UnknownCommand { tree: String, name: String },
    /// The command tree itself is malformed.
    Config(String),
    /// IO error wrapper.
    Io(std::io::Error),
}

impl Error {
    /// Whether this error is the user's fault and should be answered with help text.
    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::InvalidUsage(_) | Error::Validation { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidUsage(msg) => write!(f, "Invalid usage: {}", msg),
            Error::Validation { command, message } => {
                write!(f, "Invalid arguments for '{}': {}", command, message)
            }
            Error::UnknownCommand { tree, name } => {
                write!(f, "'{}' has no sub-command named '{}'", tree, name)
            }
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// A Result type alias for treecli operations.
pub type Result<T> = std::result::Result<T, Error>;
