//! # otpkey-protocol
//!
//! Line-oriented serial protocol spoken by otpkey hardware tokens.
//!
//! This crate provides:
//! - Newline framing for text and raw binary fields
//! - Key name and base32 secret encoding
//! - Typed request/response pairs for every device command
//! - Protocol error types and constants

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{encode_integer, pad_base32, parse_count, parse_integer, KeyName, Secret};
pub use error::ProtocolError;
pub use frame::{Frame, LineDecoder};
pub use message::{
    AddRequest, Command, DeleteRequest, ListRequest, ReplyShape, Request, Response, SyncRequest,
    WipeRequest,
};

use std::time::Duration;

/// Fixed serial baud rate of the device.
pub const BAUD_RATE: u32 = 115_200;

/// Length of a key name on the wire.
pub const KEY_NAME_LEN: usize = 3;

/// Base32 input is padded to a multiple of this many characters.
pub const BASE32_BLOCK_LEN: usize = 8;

/// Maximum length of a single inbound line (4 KiB).
pub const MAX_LINE_LEN: usize = 4 * 1024;

/// Pause between attempts to open the serial port.
pub const DEFAULT_OPEN_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Pause after opening the port so the device can finish its reset.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);
