//! Protocol session.
//!
//! A session owns the connection for its whole life and walks through a
//! fixed sequence of states:
//!
//! ```text
//! Disconnected --open--> Connected --sync--> Ready --close--> Closed
//! ```
//!
//! Only `sync` is accepted while `Connected`; every other command needs the
//! device clock to be set first. Exchanges are strictly half-duplex: all
//! writes for a request go out, then exactly the number of reply lines the
//! request declares is read back.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use otpkey_protocol::message::*;
use otpkey_protocol::{parse_count, KeyName, Secret};
use serialport::SerialPort;
use std::io::{Read, Write};

/// Upper bound on up-front allocation for a key listing.
const MAX_PREALLOCATED_KEYS: usize = 64;

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Port not opened yet.
    Disconnected,
    /// Port open, device clock not yet synced.
    Connected,
    /// Handshake complete, ready for commands.
    Ready,
    /// Connection closed; no further commands.
    Closed,
}

/// Outcome of a clock sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSync {
    /// Seconds since the Unix epoch, as sent to the device.
    pub timestamp: i64,
    /// The device's reply line.
    pub reply: String,
}

/// A session with one device.
pub struct Session<S> {
    config: ConnectionConfig,
    conn: Option<Connection<S>>,
    state: SessionState,
}

impl Session<Box<dyn SerialPort>> {
    /// Opens the serial port and performs the time-sync handshake.
    pub fn connect(config: ConnectionConfig) -> Result<(Self, TimeSync), ClientError> {
        Self::connect_with(config, Connection::open)
    }
}

impl<S: Read + Write> Session<S> {
    /// Creates a session for the configured port without opening it.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            conn: None,
            state: SessionState::Disconnected,
        }
    }

    /// Creates a session over an already open stream, in the `Connected`
    /// state.
    pub fn from_stream(name: impl Into<String>, stream: S) -> Self {
        let name = name.into();
        Self {
            conn: Some(Connection::new(name.clone(), stream)),
            config: ConnectionConfig::new(name),
            state: SessionState::Connected,
        }
    }

    /// Opens the connection with `open`, then waits out the settle delay.
    /// Nothing is written before the delay has passed.
    pub fn open_with<F>(&mut self, open: F) -> Result<(), ClientError>
    where
        F: FnOnce(&ConnectionConfig) -> Result<Connection<S>, ClientError>,
    {
        if self.state != SessionState::Disconnected {
            return Err(ClientError::NotConnected);
        }
        tracing::info!("Connecting to serial terminal at {}", self.config.port);
        let conn = open(&self.config)?;
        // Opening the port resets many boards; give the firmware time to boot.
        std::thread::sleep(self.config.settle_delay);
        self.conn = Some(conn);
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Opens the connection with `open` and syncs the device clock once.
    ///
    /// Returns the ready session and the outcome of the sync.
    pub fn connect_with<F>(
        config: ConnectionConfig,
        open: F,
    ) -> Result<(Self, TimeSync), ClientError>
    where
        F: FnOnce(&ConnectionConfig) -> Result<Connection<S>, ClientError>,
    {
        let mut session = Self::new(config);
        session.open_with(open)?;
        let sync = session.handshake()?;
        Ok((session, sync))
    }

    /// Returns the session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sends the current time to the device, moving the session to `Ready`.
    pub fn handshake(&mut self) -> Result<TimeSync, ClientError> {
        self.sync()
    }

    /// Runs one request/response exchange.
    pub fn dispatch(&mut self, request: Request) -> Result<Response, ClientError> {
        let command = request.command();
        match self.state {
            SessionState::Ready => {}
            SessionState::Connected if command == Command::Sync => {}
            SessionState::Connected => return Err(ClientError::NotReady),
            SessionState::Disconnected | SessionState::Closed => {
                return Err(ClientError::NotConnected)
            }
        }
        let conn = self.conn.as_mut().ok_or(ClientError::NotConnected)?;

        tracing::debug!("{}: sending {}", conn.name(), command);
        let response = match exchange(conn, &request) {
            Ok(response) => response,
            Err(e) => {
                // A half-read reply would desynchronise the next exchange.
                conn.discard_input();
                return Err(e);
            }
        };

        let stray = conn.discard_input();
        if stray > 0 {
            tracing::warn!(
                "{}: discarded {} unexpected byte(s) after {}",
                conn.name(),
                stray,
                command
            );
        }

        if command == Command::Sync && self.state == SessionState::Connected {
            tracing::debug!("{}: handshake complete", conn.name());
            self.state = SessionState::Ready;
        }
        Ok(response)
    }

    /// Sets the device clock to the current UTC time.
    pub fn sync(&mut self) -> Result<TimeSync, ClientError> {
        let request = SyncRequest::now();
        let timestamp = request.timestamp;
        tracing::debug!("Sending timestamp: {}", timestamp);
        let reply = self.dispatch(request.into())?.into_text();
        Ok(TimeSync { timestamp, reply })
    }

    /// Lists the keys on the device in device order.
    ///
    /// Position `i` in the returned list is the index [`Session::delete_key`]
    /// expects.
    pub fn list_keys(&mut self) -> Result<Vec<String>, ClientError> {
        Ok(self.dispatch(ListRequest.into())?.into_lines())
    }

    /// Stores a key under a three-character name.
    ///
    /// The name and the base32 secret are validated before anything is sent,
    /// so an invalid secret leaves the device untouched.
    pub fn add_key(&mut self, name: &str, secret_base32: &str) -> Result<String, ClientError> {
        let request = AddRequest {
            name: KeyName::new(name)?,
            secret: Secret::from_base32(secret_base32)?,
        };
        tracing::debug!(
            "Adding key {:?} ({} secret bytes)",
            request.name.as_str(),
            request.secret.len()
        );
        Ok(self.dispatch(request.into())?.into_text())
    }

    /// Deletes the key at a zero-based position. Range checking is left to
    /// the device.
    pub fn delete_key(&mut self, index: u32) -> Result<String, ClientError> {
        Ok(self.dispatch(DeleteRequest { index }.into())?.into_text())
    }

    /// Erases every key on the device.
    pub fn wipe(&mut self) -> Result<String, ClientError> {
        Ok(self.dispatch(WipeRequest.into())?.into_text())
    }

    /// Closes the connection. Later commands fail with `NotConnected`.
    pub fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
        self.state = SessionState::Closed;
    }
}

/// Writes every frame of `request`, then reads back its declared reply.
fn exchange<S: Read + Write>(
    conn: &mut Connection<S>,
    request: &Request,
) -> Result<Response, ClientError> {
    for frame in request.frames() {
        conn.send_frame(&frame)?;
    }

    match request.reply_shape() {
        ReplyShape::Single(build) => Ok(build(conn.receive_line()?)),
        ReplyShape::Counted(build) => {
            let count = parse_count(&conn.receive_line()?)?;
            tracing::debug!("{}: device reports {} key(s)", conn.name(), count);
            let mut lines = Vec::with_capacity(count.min(MAX_PREALLOCATED_KEYS));
            for _ in 0..count {
                lines.push(conn.receive_line()?);
            }
            Ok(build(lines))
        }
    }
}
