//! # otpkey-client
//!
//! Host side of the otpkey serial protocol.
//!
//! This crate provides:
//! - Serial port discovery
//! - Blocking line transport with bounded open retry
//! - A session that performs the time-sync handshake and runs key
//!   administration commands one exchange at a time

pub mod connection;
pub mod error;
pub mod ports;
pub mod retry;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
pub use ports::{list_ports, PortInfo};
pub use retry::RetryPolicy;
pub use session::{Session, SessionState, TimeSync};
