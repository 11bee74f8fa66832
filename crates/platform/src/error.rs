//! Error types for Skein

use std::fmt;

/// Unified error type for all Skein operations
#[derive(Debug)]
pub enum SkeinError {
    /// I/O error on the underlying transport
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// Malformed or unexpected protocol traffic
    Protocol(String),

    /// The remote side refused a request
    Remote {
        /// Status code reported by the remote side
        code: u32,
        /// Human readable message from the remote side
        message: String,
    },

    /// The session no longer reports itself as open
    SessionClosed,

    /// A local argument violated the operation's contract
    InvalidArgument(String),

    /// The operation is not permitted on this object
    NotSupported(String),

    /// The stream has already been closed
    StreamClosed,

    /// Other error
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl SkeinError {
    /// Returns `true` for failures that originate in the session or transport.
    ///
    /// These are surfaced to callers verbatim and never retried internally.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            SkeinError::Io(_)
                | SkeinError::Protocol(_)
                | SkeinError::Remote { .. }
                | SkeinError::SessionClosed
        )
    }
}

impl fmt::Display for SkeinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkeinError::Io(e) => write!(f, "IO error: {}", e),
            SkeinError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SkeinError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            SkeinError::Remote { code, message } => {
                write!(f, "Remote error {}: {}", code, message)
            }
            SkeinError::SessionClosed => write!(f, "Session is not open"),
            SkeinError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            SkeinError::NotSupported(msg) => write!(f, "Not supported: {}", msg),
            SkeinError::StreamClosed => write!(f, "Stream is closed"),
            SkeinError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for SkeinError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SkeinError::Io(e) => Some(e),
            SkeinError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SkeinError {
    fn from(err: std::io::Error) -> Self {
        SkeinError::Io(err)
    }
}

/// Result type for Skein operations
pub type SkeinResult<T> = Result<T, SkeinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SkeinError::Config("buffer_size must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: buffer_size must be positive"
        );

        let err = SkeinError::Remote {
            code: 2,
            message: "No such file".to_string(),
        };
        assert_eq!(err.to_string(), "Remote error 2: No such file");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: SkeinError = io_err.into();
        assert!(matches!(err, SkeinError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_protocol_error_family() {
        assert!(SkeinError::SessionClosed.is_protocol_error());
        assert!(SkeinError::Protocol("bad id".into()).is_protocol_error());
        assert!(!SkeinError::StreamClosed.is_protocol_error());
        assert!(!SkeinError::InvalidArgument("offset".into()).is_protocol_error());
        assert!(!SkeinError::NotSupported("write".into()).is_protocol_error());
    }
}
