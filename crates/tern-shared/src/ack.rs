use serde::{Deserialize, Serialize};

use crate::error::{CodecError, ErrKind};
use crate::frame::FrameType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckError {
    pub code: i32,
    pub msg: String,
}

impl From<ErrKind> for AckError {
    fn from(kind: ErrKind) -> Self {
        Self {
            code: kind.code(),
            msg: kind.to_string(),
        }
    }
}

/// Structured reply to any frame. Carries the original type tag so the
/// client can correlate; handlers for one connection complete in any order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(rename = "type")]
    pub frame_type: i8,
    pub node: Option<String>,
    pub token: Option<String>,
    pub error: Option<AckError>,
}

impl Ack {
    pub fn success(t: FrameType) -> Self {
        Self {
            ok: true,
            frame_type: t.tag() as i8,
            node: None,
            token: None,
            error: None,
        }
    }

    pub fn failure(tag: i8, kind: ErrKind) -> Self {
        Self {
            ok: false,
            frame_type: tag,
            node: None,
            token: None,
            error: Some(kind.into()),
        }
    }

    pub fn with_node(mut self, node: String) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    /// Serialises into a frame: the ACK tag byte (MSB clear) followed by the
    /// text-oriented or binary-packed body. The originating frame's encoding
    /// flag decides which; the server never re-encodes across formats.
    pub fn encode(&self, text: bool) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(64);
        out.push(FrameType::Ack.tag());
        if text {
            out.extend(serde_json::to_vec(self)?);
        } else {
            out.extend(bincode::serialize(self)?);
        }
        Ok(out)
    }

    /// Inverse of [`Ack::encode`]; the caller knows which encoding it asked
    /// for, since the tag byte never carries the flag on the way out.
    pub fn decode(bs: &[u8], text: bool) -> Result<Self, CodecError> {
        if bs.len() < 2 {
            return Err(CodecError::Truncated);
        }
        if text {
            Ok(serde_json::from_slice(&bs[1..])?)
        } else {
            Ok(bincode::deserialize(&bs[1..])?)
        }
    }
}
