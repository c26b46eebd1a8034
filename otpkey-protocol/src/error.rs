//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding requests or decoding device replies.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid key: {0}")]
    InvalidKeyEncoding(String),

    #[error("invalid key name {0:?}: must not contain line breaks")]
    InvalidKeyName(String),

    #[error("invalid integer: {0:?}")]
    InvalidInteger(String),

    #[error("invalid key count from device: {0:?}")]
    InvalidCount(String),

    #[error("invalid UTF-8 in device reply")]
    InvalidUtf8,

    #[error("line too long: {len} bytes without newline (max {max})")]
    LineTooLong { len: usize, max: usize },
}

impl ProtocolError {
    /// Returns whether the error was caused by operator input rather than
    /// the device or the link.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidKeyEncoding(_)
                | ProtocolError::InvalidKeyName(_)
                | ProtocolError::InvalidInteger(_)
        )
    }
}
