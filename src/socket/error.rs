use thiserror::Error;

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("host resolution failed: {0}")]
    HostUnresolved(std::io::Error),
    #[error("socket is closed")]
    Closed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SocketError>;
