//! WebSocket message mapping
//!
//! Every payload travels as exactly one data message. Control frames never
//! reach the hub.

use bytes::Bytes;
use tokio_tungstenite::tungstenite::protocol::Message;

/// Request path consumers upgrade on
pub const DEFAULT_FEED_PATH: &str = "/feed";

/// Wrap a payload in a data message
///
/// UTF-8 payloads (JSON documents, typically) go out as text so browser
/// consumers receive strings. Anything else is sent as binary.
pub fn to_message(payload: &[u8]) -> Message {
    match std::str::from_utf8(payload) {
        Ok(text) => Message::Text(text.to_owned().into()),
        Err(_) => Message::Binary(payload.to_vec().into()),
    }
}

/// Payload of a data message, `None` for control frames
pub fn into_payload(msg: Message) -> Option<Bytes> {
    match msg {
        Message::Text(text) => Some(Bytes::from(text)),
        Message::Binary(data) => Some(Bytes::from(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_payload_is_text() {
        let msg = to_message(br#"{"uri":"at://example"}"#);
        assert!(msg.is_text());
        assert_eq!(
            into_payload(msg).unwrap(),
            Bytes::from_static(br#"{"uri":"at://example"}"#)
        );
    }

    #[test]
    fn test_non_utf8_payload_is_binary() {
        let msg = to_message(&[0xff, 0x00, 0xfe]);
        assert!(msg.is_binary());
        assert_eq!(into_payload(msg).unwrap(), Bytes::from_static(&[0xff, 0x00, 0xfe]));
    }

    #[test]
    fn test_control_frames_carry_no_payload() {
        assert_eq!(into_payload(Message::Ping(vec![1u8, 2].into())), None);
        assert_eq!(into_payload(Message::Pong(Vec::<u8>::new().into())), None);
        assert_eq!(into_payload(Message::Close(None)), None);
    }
}
