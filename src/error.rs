// Error types for the framing engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    /// Connection construction got a role string other than "client"/"server".
    #[error("invalid role {0:?}, expected \"client\" or \"server\"")]
    InvalidRole(String),

    /// Observable violation of the protocol contract: illegal state
    /// transition, header emitted twice, body overrun, premature message
    /// end, or an operation invoked from an incompatible state.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Internal misuse of a collaborator, e.g. appending body bytes before a
    /// length was declared. Indicates a caller bug rather than peer
    /// misbehavior.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Header block that cannot be parsed: non-ASCII bytes, a line without
    /// the `": "` separator, or an unusable Content-Length value.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// JSON body could not be encoded or decoded.
    #[error("JSON body error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
