use std::fmt;

/// Custom error types for the MUD client
#[derive(Debug)]
pub enum ClientError {
    /// I/O related errors (network, file operations, terminal)
    Io(std::io::Error),

    /// The server closed the connection
    ServerClosed,

    /// Configuration error
    Configuration(String),

    /// A configured tag or speech pattern failed to compile
    Pattern(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Io(err) => write!(f, "I/O error: {}", err),
            ClientError::ServerClosed => write!(f, "Server closed the connection"),
            ClientError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ClientError::Pattern(msg) => write!(f, "Invalid pattern: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                ClientError::ServerClosed
            }
            _ => ClientError::Io(err),
        }
    }
}

impl From<crate::config::ConfigError> for ClientError {
    fn from(err: crate::config::ConfigError) -> Self {
        ClientError::Configuration(err.to_string())
    }
}

impl From<regex::Error> for ClientError {
    fn from(err: regex::Error) -> Self {
        ClientError::Pattern(err.to_string())
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
