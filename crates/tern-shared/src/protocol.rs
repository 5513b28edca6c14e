use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::frame::{jtp, FrameType};

fn decode_body<'a, T: Deserialize<'a>>(bs: &'a [u8]) -> Result<T, CodecError> {
    if bs.len() < 2 {
        return Err(CodecError::Truncated);
    }
    if jtp(bs[0]) {
        Ok(serde_json::from_slice(&bs[1..])?)
    } else {
        Ok(bincode::deserialize(&bs[1..])?)
    }
}

fn encode_frame<T: Serialize>(t: FrameType, text: bool, body: &T) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(64);
    out.push(if text { t.tag() | 0x80 } else { t.tag() });
    if text {
        out.extend(serde_json::to_vec(body)?);
    } else {
        out.extend(bincode::serialize(body)?);
    }
    Ok(out)
}

/// Syntactic envelope of an AUTH frame. A credential is either a token or a
/// (node, pwd) pair; frames naming neither are protocol misuse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthEnvelope {
    pub node: Option<String>,
    pub domain: Option<String>,
    pub token: Option<String>,
    pub pwd: Option<String>,
}

impl AuthEnvelope {
    pub fn decode(bs: &[u8]) -> Result<Self, CodecError> {
        decode_body(bs)
    }

    pub fn encode(&self, text: bool) -> Result<Vec<u8>, CodecError> {
        encode_frame(FrameType::Auth, text, self)
    }

    pub fn has_credentials(&self) -> bool {
        self.token.is_some() || (self.node.is_some() && self.pwd.is_some())
    }
}

/// Body of REGISTER and TOKEN frames on the provisioning transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterEnvelope {
    pub name: String,
    pub pwd: String,
    pub domain: Option<String>,
}

impl RegisterEnvelope {
    pub fn decode(bs: &[u8]) -> Result<Self, CodecError> {
        decode_body(bs)
    }

    pub fn encode(&self, t: FrameType, text: bool) -> Result<Vec<u8>, CodecError> {
        encode_frame(t, text, self)
    }
}
