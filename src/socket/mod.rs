pub mod error;
pub mod line_socket;

pub use error::{Result, SocketError};
pub use line_socket::{LineReader, LineSocket, ReadOutcome};
