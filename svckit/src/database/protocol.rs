// svckit/src/database/protocol.rs
//
// RethinkDB wire protocol (V0_4 handshake, JSON query encoding)
// Frames are a 12-byte little-endian header followed by a JSON body
//

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::errors::ThinkerError;

/// Handshake magic numbers
pub const VERSION_V0_4: u32 = 0x400c_2d20;
pub const PROTOCOL_JSON: u32 = 0x7e69_70c7;
pub const HANDSHAKE_SUCCESS: &str = "SUCCESS";

/// Upper bound on a handshake reply, which is a short NUL-terminated string
const MAX_HANDSHAKE_REPLY: usize = 4096;

pub const FRAME_HEADER_LEN: usize = 12;

/// Largest response body accepted from the server
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Query types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryType {
    Start = 1,
    Continue = 2,
    Stop = 3,
    NoreplyWait = 4,
}

/// Response types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseType {
    SuccessAtom,
    SuccessSequence,
    SuccessPartial,
    WaitComplete,
    ServerInfo,
    ClientError,
    CompileError,
    RuntimeError,
}

impl ResponseType {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(ResponseType::SuccessAtom),
            2 => Some(ResponseType::SuccessSequence),
            3 => Some(ResponseType::SuccessPartial),
            4 => Some(ResponseType::WaitComplete),
            5 => Some(ResponseType::ServerInfo),
            16 => Some(ResponseType::ClientError),
            17 => Some(ResponseType::CompileError),
            18 => Some(ResponseType::RuntimeError),
            _ => None,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            ResponseType::ClientError | ResponseType::CompileError | ResponseType::RuntimeError
        )
    }
}

/// Response notes (`n` field); only the feed markers matter here
pub const NOTE_SEQUENCE_FEED: i64 = 1;
pub const NOTE_ATOM_FEED: i64 = 2;

/// Frame header: query token and body length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHeader {
    pub token: u64,
    pub length: u32,
}

impl FrameHeader {
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, ThinkerError> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        reader
            .read_exact(&mut header)
            .await
            .map_err(|e| ThinkerError::ConnectionError(format!("Failed to read frame: {}", e)))?;

        let mut token = [0u8; 8];
        token.copy_from_slice(&header[0..8]);
        let mut length = [0u8; 4];
        length.copy_from_slice(&header[8..12]);
        let length = u32::from_le_bytes(length);

        if length > MAX_FRAME_LEN {
            return Err(ThinkerError::ConnectionError(format!(
                "Frame of {} bytes exceeds the {} byte limit",
                length, MAX_FRAME_LEN
            )));
        }

        Ok(Self {
            token: u64::from_le_bytes(token),
            length,
        })
    }

    pub fn to_bytes(self) -> [u8; FRAME_HEADER_LEN] {
        let mut bytes = [0u8; FRAME_HEADER_LEN];
        bytes[0..8].copy_from_slice(&self.token.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.length.to_le_bytes());
        bytes
    }
}

/// Bytes the client sends to open a V0_4 session
pub fn handshake_bytes(auth_key: &str) -> Vec<u8> {
    let key = auth_key.as_bytes();
    let mut bytes = Vec::with_capacity(12 + key.len());
    bytes.extend_from_slice(&VERSION_V0_4.to_le_bytes());
    bytes.extend_from_slice(&(key.len() as u32).to_le_bytes());
    bytes.extend_from_slice(key);
    bytes.extend_from_slice(&PROTOCOL_JSON.to_le_bytes());
    bytes
}

/// Read the NUL-terminated handshake reply and check it is `SUCCESS`
pub async fn read_handshake_reply<R: AsyncRead + Unpin>(reader: &mut R) -> Result<(), ThinkerError> {
    let mut reply = Vec::new();
    loop {
        let byte = reader.read_u8().await.map_err(|e| {
            ThinkerError::ConnectionError(format!("Failed to read handshake reply: {}", e))
        })?;
        if byte == 0 {
            break;
        }
        if reply.len() >= MAX_HANDSHAKE_REPLY {
            return Err(ThinkerError::ConnectionError(
                "Handshake reply is not terminated".to_string(),
            ));
        }
        reply.push(byte);
    }

    let reply = String::from_utf8_lossy(&reply);
    if reply == HANDSHAKE_SUCCESS {
        Ok(())
    } else {
        Err(ThinkerError::ConnectionError(format!(
            "Server rejected handshake: {}",
            reply.trim()
        )))
    }
}

/// Encode a full frame (header + JSON body)
pub fn encode_frame(token: u64, body: &Value) -> Result<Vec<u8>, ThinkerError> {
    let body = serde_json::to_vec(body)
        .map_err(|e| ThinkerError::QueryError(format!("Failed to encode query: {}", e)))?;

    let header = FrameHeader {
        token,
        length: body.len() as u32,
    };

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// `[START, term, global optargs]`
pub fn start_query(term: Value, global_optargs: serde_json::Map<String, Value>) -> Value {
    if global_optargs.is_empty() {
        json!([QueryType::Start as u8, term])
    } else {
        json!([QueryType::Start as u8, term, global_optargs])
    }
}

/// `[CONTINUE]`, `[STOP]`, `[NOREPLY_WAIT]`
pub fn control_query(query_type: QueryType) -> Value {
    json!([query_type as u8])
}

/// Decoded response body
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(rename = "t")]
    pub kind: i64,
    #[serde(rename = "r", default)]
    pub results: Vec<Value>,
    #[serde(rename = "n", default)]
    pub notes: Vec<i64>,
    #[serde(rename = "b", default)]
    pub backtrace: Option<Value>,
}

impl Response {
    pub fn parse(body: &[u8]) -> Result<Self, ThinkerError> {
        serde_json::from_slice(body)
            .map_err(|e| ThinkerError::QueryError(format!("Malformed response: {}", e)))
    }

    pub fn response_type(&self) -> Option<ResponseType> {
        ResponseType::from_i64(self.kind)
    }

    pub fn is_feed(&self) -> bool {
        self.notes
            .iter()
            .any(|n| *n == NOTE_SEQUENCE_FEED || *n == NOTE_ATOM_FEED)
    }

    /// Turn error responses into `QueryError`, pass everything else through
    pub fn check(self) -> Result<(ResponseType, Self), ThinkerError> {
        let kind = self.response_type().ok_or_else(|| {
            ThinkerError::QueryError(format!("Unknown response type: {}", self.kind))
        })?;

        if kind.is_error() {
            let message = self
                .results
                .first()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "unknown error".to_string());
            let label = match kind {
                ResponseType::ClientError => "client error",
                ResponseType::CompileError => "compile error",
                _ => "runtime error",
            };
            return Err(ThinkerError::QueryError(format!("{}: {}", label, message)));
        }

        Ok((kind, self))
    }
}
