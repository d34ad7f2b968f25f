use std::io::Error as IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Handshake error: {0}")]
    Handshake(String),

    #[error("AMF decode error: {0}")]
    AmfDecode(String),

    #[error("AMF encode error: {0}")]
    AmfEncode(String),

    #[error("Chunk error: {0}")]
    Chunk(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Server rejected {command}: {description}")]
    Rejected { command: String, description: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a handshake error
    pub fn handshake(msg: impl Into<String>) -> Self {
        Error::Handshake(msg.into())
    }

    /// Create an AMF decode error
    pub fn amf_decode(msg: impl Into<String>) -> Self {
        Error::AmfDecode(msg.into())
    }

    /// Create an AMF encode error
    pub fn amf_encode(msg: impl Into<String>) -> Self {
        Error::AmfEncode(msg.into())
    }

    /// Create a chunk error
    pub fn chunk(msg: impl Into<String>) -> Self {
        Error::Chunk(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    /// Create a rejection raised by an `_error` response
    pub fn rejected(command: impl Into<String>, description: impl Into<String>) -> Self {
        Error::Rejected {
            command: command.into(),
            description: description.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Stable numeric code reported with failure events
    pub fn code(&self) -> i32 {
        match self {
            Error::Io(_) => 1,
            Error::Protocol(_) => 2,
            Error::Handshake(_) => 3,
            Error::AmfDecode(_) => 4,
            Error::AmfEncode(_) => 5,
            Error::Chunk(_) => 6,
            Error::Connection(_) => 7,
            Error::Rejected { .. } => 8,
            Error::InvalidState(_) => 9,
            Error::Timeout(_) => 10,
            Error::Configuration(_) => 11,
        }
    }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
