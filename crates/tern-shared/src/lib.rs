// Identity primitives and wire codec shared by the tern server and clients.

pub mod ack;
pub mod constants;
pub mod error;
pub mod frame;
pub mod identity;
pub mod protocol;

pub use ack::{Ack, AckError};
pub use error::{CodecError, ErrKind};
pub use frame::{jtp, FrameType};
pub use protocol::{AuthEnvelope, RegisterEnvelope};
