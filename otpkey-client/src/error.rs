//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] otpkey_protocol::ProtocolError),

    #[error("no serial ports available")]
    NoPortsAvailable,

    #[error("failed to open {port} after {attempts} attempt(s): {source}")]
    OpenFailed {
        port: String,
        attempts: u32,
        #[source]
        source: serialport::Error,
    },

    #[error("not connected")]
    NotConnected,

    #[error("device not time-synced yet")]
    NotReady,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timed out waiting for device")]
    Timeout,
}

impl ClientError {
    /// Returns whether the error came from operator input, so nothing was
    /// sent to the device.
    pub fn is_input_error(&self) -> bool {
        matches!(self, ClientError::Protocol(e) if e.is_input_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otpkey_protocol::ProtocolError;

    #[test]
    fn test_input_error() {
        let err = ClientError::from(ProtocolError::InvalidKeyEncoding("bad symbol".into()));
        assert!(err.is_input_error());
        assert!(err.to_string().contains("bad symbol"));

        let err = ClientError::from(ProtocolError::InvalidCount("x".into()));
        assert!(!err.is_input_error());
    }
}
