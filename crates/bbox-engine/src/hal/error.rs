/// Failure reported by a backend.
///
/// `Clone` so a removed device can hand the same reason to every later caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HalError {
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("out of memory")]
    OutOfMemory,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid call: {0}")]
    InvalidCall(String),

    #[error("device removed: {0}")]
    DeviceRemoved(String),

    #[error("no such object: {0}")]
    NotFound(String),

    #[error("backend error: {0}")]
    Backend(String),
}

pub type HalResult<T> = std::result::Result<T, HalError>;
