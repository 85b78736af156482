//! Transport selection

/// How messages are carried between the relay and its peers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transport {
    /// One WebSocket data message per payload
    #[default]
    WebSocket,

    /// Plain TCP, one length-prefixed frame per payload
    Framed,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::WebSocket => write!(f, "websocket"),
            Transport::Framed => write!(f, "framed"),
        }
    }
}
