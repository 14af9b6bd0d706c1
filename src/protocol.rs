use crate::command::Command;
use crate::geometry::{GroundTarget, PointingSolution};
use crate::propagator::GroundPosition;
use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_REQUEST_SIZE: usize = 512;
pub const MAX_RESPONSE_SIZE: usize = 1024;

pub type RequestBuffer = ArrayString<MAX_REQUEST_SIZE>;
pub type ResponseBuffer = ArrayString<MAX_RESPONSE_SIZE>;

/// One JSON line from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Queue a simulation command for the interpreter.
    Queue { command: Command },
    /// Read the latest published ground position.
    Position,
    /// Compute a pointing solution for a ground target.
    Point {
        longitude_deg: f64,
        latitude_deg: f64,
    },
    /// Switch this connection to the telemetry stream.
    Subscribe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Ack {
        accepted: bool,
        message: Option<String>,
    },
    Position {
        position: Option<GroundPosition>,
    },
    Pointing {
        target: GroundTarget,
        solution: PointingSolution,
    },
    NotVisible {
        elevation_deg: f64,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("invalid JSON format")]
    InvalidJson,
    #[error("message exceeds buffer size")]
    MessageTooLarge,
    #[error("serialization failed")]
    SerializationError,
}

/// Line codec with preallocated, size-checked buffers.
#[derive(Debug)]
pub struct WireCodec {
    request_buffer: RequestBuffer,
    response_buffer: ResponseBuffer,
}

impl WireCodec {
    pub fn new() -> Self {
        Self {
            request_buffer: ArrayString::new(),
            response_buffer: ArrayString::new(),
        }
    }

    pub fn parse_request(&mut self, line: &str) -> Result<Request, ProtocolError> {
        if line.len() > MAX_REQUEST_SIZE {
            return Err(ProtocolError::MessageTooLarge);
        }
        self.request_buffer.clear();
        self.request_buffer.push_str(line);

        serde_json::from_str(line).map_err(|_| ProtocolError::InvalidJson)
    }

    pub fn serialize_response(&mut self, response: &Response) -> Result<&str, ProtocolError> {
        self.response_buffer.clear();

        let json = serde_json::to_string(response)
            .map_err(|_| ProtocolError::SerializationError)?;
        if json.len() > MAX_RESPONSE_SIZE {
            return Err(ProtocolError::MessageTooLarge);
        }
        self.response_buffer.push_str(&json);

        Ok(&self.response_buffer)
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_round_trip() {
        let mut codec = WireCodec::new();
        let request = Request::Queue {
            command: Command::SetSpeed { speed: 2.0 },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(codec.parse_request(&json).unwrap(), request);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let mut codec = WireCodec::new();
        assert_eq!(
            codec.parse_request("{not json"),
            Err(ProtocolError::InvalidJson)
        );
        // An unknown request kind is a parse error, not a panic.
        assert_eq!(
            codec.parse_request(r#"{"Warp":{"factor":9}}"#),
            Err(ProtocolError::InvalidJson)
        );
    }

    #[test]
    fn test_oversized_request_is_rejected() {
        let mut codec = WireCodec::new();
        let oversized = "x".repeat(MAX_REQUEST_SIZE + 1);
        assert_eq!(
            codec.parse_request(&oversized),
            Err(ProtocolError::MessageTooLarge)
        );
    }

    #[test]
    fn test_response_serialization_reuses_buffer() {
        let mut codec = WireCodec::new();
        let ack = Response::Ack {
            accepted: true,
            message: None,
        };
        let first = codec.serialize_response(&ack).unwrap().to_owned();
        let second = codec.serialize_response(&ack).unwrap();
        assert_eq!(first, second);
    }
}
