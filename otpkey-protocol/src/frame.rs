//! Newline framing.
//!
//! Every protocol message is one newline-terminated unit. Text fields are
//! written as UTF-8; binary key material is written untouched and followed
//! by a single `\n` byte.
//!
//! Received lines are returned with the trailing `\n` (and an optional
//! `\r` before it) removed.

use crate::error::ProtocolError;
use crate::MAX_LINE_LEN;
use bytes::BytesMut;

/// A single framed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text field, UTF-8 encoded.
    Line(String),
    /// Binary field, written as-is.
    Raw(Vec<u8>),
}

impl Frame {
    pub fn line(text: impl Into<String>) -> Self {
        Frame::Line(text.into())
    }

    /// Returns the bytes to put on the wire, including the newline.
    pub fn encode(&self) -> Vec<u8> {
        let body: &[u8] = match self {
            Frame::Line(text) => text.as_bytes(),
            Frame::Raw(bytes) => bytes,
        };
        let mut out = Vec::with_capacity(body.len() + 1);
        out.extend_from_slice(body);
        out.push(b'\n');
        out
    }
}

/// Accumulates inbound bytes and splits them into lines.
pub struct LineDecoder {
    buffer: BytesMut,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to take the next complete line from the buffer.
    pub fn decode_line(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let line = self.buffer.split_to(pos + 1);
                let mut body = &line[..pos];
                if let Some(stripped) = body.strip_suffix(b"\r") {
                    body = stripped;
                }
                let text = std::str::from_utf8(body).map_err(|_| ProtocolError::InvalidUtf8)?;
                Ok(Some(text.to_string()))
            }
            None if self.buffer.len() > MAX_LINE_LEN => Err(ProtocolError::LineTooLong {
                len: self.buffer.len(),
                max: MAX_LINE_LEN,
            }),
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}
