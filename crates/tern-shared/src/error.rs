use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("text encoding error: {0}")]
    Text(#[from] serde_json::Error),

    #[error("binary encoding error: {0}")]
    Binary(#[from] bincode::Error),

    #[error("frame too short")]
    Truncated,
}

/// Wire error kinds carried in acks. The core produces `BadParams`,
/// `Overload` and `OverHertz`; backends report the rest.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrKind {
    #[error("bad parameters")]
    BadParams,

    #[error("server overloaded")]
    Overload,

    #[error("request frequency exceeded")]
    OverHertz,

    #[error("authentication failed")]
    AuthFailed,

    #[error("account already exists")]
    AccountExists,

    #[error("account not found")]
    NoAccount,

    #[error("token invalid or expired")]
    TokenInvalid,
}

impl ErrKind {
    pub fn code(&self) -> i32 {
        match self {
            ErrKind::BadParams => 4101,
            ErrKind::Overload => 4102,
            ErrKind::OverHertz => 4103,
            ErrKind::AuthFailed => 4104,
            ErrKind::AccountExists => 4105,
            ErrKind::NoAccount => 4106,
            ErrKind::TokenInvalid => 4107,
        }
    }
}
