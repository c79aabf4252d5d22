use alloc::string::String;
use enough::StopReason;

/// Errors from LERC1 decoding and encoding.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LercError {
    #[error("unrecognized format magic bytes")]
    UnrecognizedFormat,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid stream data: {0}")]
    InvalidData(String),

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: usize, height: usize },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("encoded size mismatch: planned {expected} bytes, wrote {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("operation cancelled")]
    Cancelled(StopReason),
}

impl From<StopReason> for LercError {
    fn from(r: StopReason) -> Self {
        LercError::Cancelled(r)
    }
}
