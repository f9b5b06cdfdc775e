use osal::OsError;
use thiserror::Error;

/// Manager-level failure taxonomy.
///
/// Firmware-reported failures are data (a status code in the connect
/// indication record), never variants here; they always resolve to a defined
/// state transition. Only `Config` is fatal, and only during initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MgmrError {
    /// The OS services layer rejected installation or misbehaved in a way
    /// that can only be a wiring mistake.
    #[error("adapter misconfiguration: {0}")]
    Config(OsError),
    /// A caller-supplied value is out of contract (oversized field, bad
    /// index); nothing was mutated.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The event queue has no free slot; the producer decides whether to
    /// drop, retry or back off.
    #[error("event queue is full")]
    QueueFull,
    /// A bounded wait elapsed.
    #[error("operation timed out")]
    Timeout,
    /// A bounded store has no free slot and nothing evictable.
    #[error("bounded store exhausted")]
    ResourceExhausted,
}

impl From<OsError> for MgmrError {
    fn from(err: OsError) -> Self {
        match err {
            OsError::QueueFull => Self::QueueFull,
            OsError::Timeout | OsError::QueueEmpty => Self::Timeout,
            other => Self::Config(other),
        }
    }
}

pub type MgmrResult<T> = Result<T, MgmrError>;
