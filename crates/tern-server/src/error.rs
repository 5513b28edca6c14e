use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("tls setup failed: {0}")]
    Tls(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
