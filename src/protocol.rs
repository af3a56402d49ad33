//! Line codec for the control-server protocol: newline-delimited UTF-8,
//! one command per line, no further framing.

use crate::types::events::CallerImage;

/// Queue entry name the server's `shutdown` command enqueues. When it
/// reaches the head of the playback queue the connection is closed before
/// the entry is skipped.
pub const SHUTDOWN_CLIP: &str = "shutdown";

/// Commands this client sends. Each encodes to exactly one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Hello { party: String, target: String },
    ButtonPress(char),
    Shake,
    QueueEmpty,
}

impl ClientCommand {
    pub fn to_line(&self) -> String {
        match self {
            ClientCommand::Hello { party, target } => {
                format!("druzinka {party} {target}")
            }
            ClientCommand::ButtonPress(c) => format!("button {c}"),
            ClientCommand::Shake => "shake".to_string(),
            ClientCommand::QueueEmpty => "empty".to_string(),
        }
    }
}

/// Commands the server sends. Anything that does not parse is ignored by
/// the session; there is no protocol-error path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    Start,
    Play(String),
    Clear,
    Image(CallerImage),
    Name(String),
    Shutdown,
}

impl ServerCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let (keyword, rest) = match line.split_once(' ') {
            Some((k, r)) => (k, Some(r)),
            None => (line, None),
        };
        match (keyword, rest) {
            ("start", None) => Some(ServerCommand::Start),
            ("clear", None) => Some(ServerCommand::Clear),
            ("shutdown", None) => Some(ServerCommand::Shutdown),
            // Only the first token names the clip.
            ("play", Some(rest)) => rest
                .split_whitespace()
                .next()
                .map(|clip| ServerCommand::Play(clip.to_string())),
            ("image", Some("old")) => Some(ServerCommand::Image(CallerImage::Old)),
            ("image", Some("child")) => Some(ServerCommand::Image(CallerImage::Child)),
            ("image", Some("alf")) => Some(ServerCommand::Image(CallerImage::Alf)),
            // The name is the whole remainder of the line.
            ("name", Some(rest)) => Some(ServerCommand::Name(rest.to_string())),
            _ => None,
        }
    }
}
