//! Error types
//!
//! The hub itself cannot fail; these errors come from the network
//! collaborators (frame codec, feed server, ingest client).

use std::time::Duration;

use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError};

/// Result alias for fallible operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket or stream I/O failure
    Io(std::io::Error),
    /// Malformed frame on the wire
    Frame(FrameError),
    /// WebSocket handshake or protocol failure
    WebSocket(WsError),
    /// Operation did not complete in time
    Timeout(Duration),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Frame(e) => write!(f, "Frame error: {}", e),
            Error::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            Error::Timeout(d) => write!(f, "Timed out after {:?}", d),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Frame(e) => Some(e),
            Error::WebSocket(e) => Some(e),
            Error::Timeout(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<WsError> for Error {
    fn from(e: WsError) -> Self {
        Error::WebSocket(e)
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Error::Frame(e)
    }
}

/// Framing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Declared length exceeds the configured maximum
    TooLarge { size: usize, max: usize },
    /// Stream ended in the middle of a frame
    Truncated { expected: usize, received: usize },
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::TooLarge { size, max } => {
                write!(f, "Frame of {} bytes exceeds maximum of {}", size, max)
            }
            FrameError::Truncated { expected, received } => write!(
                f,
                "Stream closed mid-frame: expected {} bytes, received {}",
                expected, received
            ),
        }
    }
}

impl std::error::Error for FrameError {}

impl Error {
    /// Whether the error is the peer going away rather than a protocol problem
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Io(e) => is_disconnect_kind(e.kind()),
            Error::Frame(FrameError::Truncated { .. }) => true,
            Error::WebSocket(WsError::Io(e)) => is_disconnect_kind(e.kind()),
            Error::WebSocket(
                WsError::ConnectionClosed
                | WsError::AlreadyClosed
                | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake),
            ) => true,
            _ => false,
        }
    }
}

fn is_disconnect_kind(kind: std::io::ErrorKind) -> bool {
    matches!(
        kind,
        std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof
    )
}
