use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

/// Domain failure taxonomy. Every error is returned synchronously to the
/// acting caller only, never broadcast to a room.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    #[error("conflict: {0}")]
    Conflict(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("authentication failed")]
    Auth,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
