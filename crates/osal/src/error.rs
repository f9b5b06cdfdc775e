use thiserror::Error;

/// Failures surfaced by the OS services layer.
///
/// `VersionMismatch` is fatal at installation time; everything else is a
/// recoverable runtime condition reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OsError {
    /// The installed backend does not speak the expected adapter version.
    #[error("adapter version mismatch: expected {expected:#010x}, found {found:#010x}")]
    VersionMismatch { expected: u32, found: u32 },
    /// A bounded wait elapsed without the condition becoming true.
    #[error("operation timed out")]
    Timeout,
    /// The bounded queue has no free slot.
    #[error("message queue is full")]
    QueueFull,
    /// The queue has nothing to deliver.
    #[error("message queue is empty")]
    QueueEmpty,
    /// A semaphore give would exceed its maximum count.
    #[error("semaphore count overflow")]
    Overflow,
    /// The backend could not create the requested task.
    #[error("task creation failed")]
    SpawnFailed,
}

pub type OsResult<T> = Result<T, OsError>;
