use std::time::Duration;

use punter::{DecodeError, FramingError, ProtocolViolation};
use thiserror::Error;

/// Which side of the adapter a message came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Peer {
    Server,
    Bot,
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Peer::Server => write!(f, "server"),
            Peer::Bot => write!(f, "bot"),
        }
    }
}

/// Everything that ends a session early. None of these are retried: once a
/// turn is lost, the bot's carried state no longer matches the game.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not read a frame from the {peer}")]
    Framing {
        peer: Peer,
        #[source]
        source: FramingError,
    },
    #[error("could not start bot `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bot process I/O failed")]
    ProcessIo(#[source] std::io::Error),
    #[error("network error")]
    Network(#[source] std::io::Error),
    #[error("protocol violation by the {peer}")]
    Protocol {
        peer: Peer,
        #[source]
        source: ProtocolViolation,
    },
    #[error("bot sent a {kind} message without state")]
    MissingState { kind: &'static str },
    #[error("bot did not answer within {0:?}")]
    BotTimedOut(Duration),
    #[error("shutdown requested")]
    Cancelled,
}

impl SessionError {
    pub fn decode(peer: Peer, err: DecodeError) -> Self {
        match err {
            DecodeError::Framing(source) => SessionError::Framing { peer, source },
            DecodeError::Protocol(source) => SessionError::Protocol { peer, source },
        }
    }

    pub fn unexpected(peer: Peer, expected: &'static str, got: &'static str) -> Self {
        SessionError::Protocol {
            peer,
            source: ProtocolViolation::Unexpected { expected, got },
        }
    }
}
