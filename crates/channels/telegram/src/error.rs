use std::fmt;

use thiserror::Error;

/// Failure of a single send attempt.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("message has no destination chat")]
    NoDestination,

    #[error("attachment was already released")]
    Released,

    #[error("http client error: {0}")]
    Client(String),

    #[error(transparent)]
    Api(#[from] teloxide::RequestError),
}

/// How the dispatch loop came to a stop. `Display` gives the status line
/// reported to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shutdown {
    /// The shared cancellation fired while the loop was idle.
    Cancelled { runtime: String },
    /// A send was being retried when cancellation fired; the send was dropped.
    Interrupted { runtime: String },
}

impl Shutdown {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl fmt::Display for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled { runtime } => write!(f, "{} context cancelled", runtime),
            Self::Interrupted { runtime } => write!(f, "{} was cancelled", runtime),
        }
    }
}
