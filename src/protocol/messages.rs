// ABOUTME: Control message definitions and parsing
// ABOUTME: Supports the "request" literal, rate-info JSON and granted/rejected replies

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Literal text a client sends to ask for the floor
pub const REQUEST: &str = "request";

/// Lowest sample rate a client may announce, in Hz
pub const MIN_RATE: u32 = 1_000;

/// Highest sample rate a client may announce, in Hz
pub const MAX_RATE: u32 = 384_000;

/// Inbound text control message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Ask to become the active speaker
    Request,
    /// Declare the sample rate of subsequent audio chunks
    RateInfo(RateInfo),
}

/// Rate-info payload, e.g. `{"rate": 24000}`
///
/// Unknown fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateInfo {
    /// Sample rate in Hz
    pub rate: u32,
}

impl ControlMessage {
    /// Parse a text frame.
    ///
    /// Anything other than the `request` literal is read as JSON; a payload
    /// without an integer `rate` in `MIN_RATE..=MAX_RATE` is a protocol error.
    pub fn parse(text: &str) -> Result<Self, Error> {
        if text == REQUEST {
            return Ok(ControlMessage::Request);
        }

        let info: RateInfo = serde_json::from_str(text)
            .map_err(|e| Error::Protocol(format!("invalid control payload: {}", e)))?;

        if !(MIN_RATE..=MAX_RATE).contains(&info.rate) {
            return Err(Error::Protocol(format!(
                "rate {} outside {}..={} Hz",
                info.rate, MIN_RATE, MAX_RATE
            )));
        }

        Ok(ControlMessage::RateInfo(info))
    }

    /// Encode as the text frame a client sends
    pub fn to_text(&self) -> Result<String, Error> {
        match self {
            ControlMessage::Request => Ok(REQUEST.to_string()),
            ControlMessage::RateInfo(info) => serde_json::to_string(info)
                .map_err(|e| Error::Protocol(format!("failed to encode rate info: {}", e))),
        }
    }
}

/// Server reply to a speaker request or an admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerReply {
    /// The connection now holds the floor
    Granted,
    /// Someone else holds the floor; the server closes the connection
    Rejected,
}

impl ServerReply {
    /// Convert to protocol string
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerReply::Granted => "granted",
            ServerReply::Rejected => "rejected",
        }
    }

    /// Parse a reply text frame
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "granted" => Some(ServerReply::Granted),
            "rejected" => Some(ServerReply::Rejected),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        assert_eq!(ControlMessage::parse("request").unwrap(), ControlMessage::Request);
    }

    #[test]
    fn test_request_is_exact() {
        assert!(ControlMessage::parse("Request").is_err());
        assert!(ControlMessage::parse(" request").is_err());
    }

    #[test]
    fn test_parse_rate_info() {
        let msg = ControlMessage::parse(r#"{"rate": 24000}"#).unwrap();
        assert_eq!(msg, ControlMessage::RateInfo(RateInfo { rate: 24000 }));
    }

    #[test]
    fn test_rate_info_ignores_unknown_fields() {
        let text = r#"{"rate": 44100, "channels": 1, "codec": "pcm"}"#;
        let msg = ControlMessage::parse(text).unwrap();
        assert_eq!(msg, ControlMessage::RateInfo(RateInfo { rate: 44100 }));
    }

    #[test]
    fn test_malformed_payloads_are_errors() {
        for text in [
            "",
            "{",
            "hello",
            "[1, 2]",
            r#"{"channels": 1}"#,
            r#"{"rate": "fast"}"#,
            r#"{"rate": -1}"#,
            r#"{"rate": 0}"#,
            r#"{"rate": 1}"#,
            r#"{"rate": 999}"#,
            r#"{"rate": 384001}"#,
            r#"{"rate": 4294967295}"#,
        ] {
            assert!(
                matches!(ControlMessage::parse(text), Err(Error::Protocol(_))),
                "{text:?} should not parse"
            );
        }
    }

    #[test]
    fn test_rate_bounds_are_inclusive() {
        for rate in [MIN_RATE, 8000, 44100, MAX_RATE] {
            let text = format!(r#"{{"rate": {}}}"#, rate);
            assert_eq!(
                ControlMessage::parse(&text).unwrap(),
                ControlMessage::RateInfo(RateInfo { rate })
            );
        }
    }

    #[test]
    fn test_to_text() {
        assert_eq!(ControlMessage::Request.to_text().unwrap(), "request");
        let text = ControlMessage::RateInfo(RateInfo { rate: 16000 }).to_text().unwrap();
        assert_eq!(text, r#"{"rate":16000}"#);
        assert_eq!(
            ControlMessage::parse(&text).unwrap(),
            ControlMessage::RateInfo(RateInfo { rate: 16000 })
        );
    }

    #[test]
    fn test_reply_strings() {
        assert_eq!(ServerReply::Granted.as_str(), "granted");
        assert_eq!(ServerReply::parse("rejected"), Some(ServerReply::Rejected));
        assert_eq!(ServerReply::parse("maybe"), None);
    }
}
