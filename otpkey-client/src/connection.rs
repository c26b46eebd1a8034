//! Serial transport.
//!
//! A [`Connection`] owns the byte stream to the device and exchanges
//! newline-terminated frames over it. All I/O is blocking; a read waits at
//! most the configured read timeout before failing with
//! [`ClientError::Timeout`].

use crate::error::ClientError;
use crate::retry::RetryPolicy;
use otpkey_protocol::{Frame, LineDecoder, BAUD_RATE, DEFAULT_SETTLE_DELAY};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Size of the scratch buffer used for each read.
const READ_CHUNK_SIZE: usize = 256;

/// Default time to wait for a reply line.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Serial port name.
    pub port: String,
    /// Line speed.
    pub baud_rate: u32,
    /// Maximum wait for data on each read.
    pub read_timeout: Duration,
    /// Pause after opening, before the first command.
    pub settle_delay: Duration,
    /// Open retry policy.
    pub retry: RetryPolicy,
}

impl ConnectionConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// A line-oriented connection to a device.
pub struct Connection<S> {
    /// Port name, for logging.
    name: String,
    /// The byte stream; `None` once closed.
    stream: Option<S>,
    /// Decoder holding bytes read but not yet returned as lines.
    decoder: LineDecoder,
}

impl Connection<Box<dyn SerialPort>> {
    /// Opens the configured serial port, retrying per the config's policy.
    pub fn open(config: &ConnectionConfig) -> Result<Self, ClientError> {
        let port = config
            .retry
            .run(|attempt| {
                tracing::debug!(
                    "Opening {} at {} baud (attempt {})",
                    config.port,
                    config.baud_rate,
                    attempt
                );
                serialport::new(&config.port, config.baud_rate)
                    .data_bits(DataBits::Eight)
                    .parity(Parity::None)
                    .stop_bits(StopBits::One)
                    .flow_control(FlowControl::None)
                    .timeout(config.read_timeout)
                    .open()
            })
            .map_err(|(attempts, source)| {
                tracing::debug!("Giving up on {} after {} attempt(s)", config.port, attempts);
                ClientError::OpenFailed {
                    port: config.port.clone(),
                    attempts,
                    source,
                }
            })?;

        tracing::debug!("Opened {}", config.port);
        Ok(Self::new(config.port.clone(), port))
    }
}

impl<S: Read + Write> Connection<S> {
    /// Wraps an already open stream.
    pub fn new(name: impl Into<String>, stream: S) -> Self {
        Self {
            name: name.into(),
            stream: Some(stream),
            decoder: LineDecoder::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends a text field followed by a newline.
    pub fn send_line(&mut self, text: &str) -> Result<(), ClientError> {
        self.send_frame(&Frame::line(text))
    }

    /// Sends binary data followed by a newline. The bytes are not re-encoded.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        self.send_frame(&Frame::Raw(bytes.to_vec()))
    }

    /// Writes one frame in a single call.
    pub fn send_frame(&mut self, frame: &Frame) -> Result<(), ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        let bytes = frame.encode();
        stream.write_all(&bytes)?;
        stream.flush()?;
        tracing::trace!("{}: wrote {} bytes", self.name, bytes.len());
        Ok(())
    }

    /// Blocks until one full line has arrived and returns it without the
    /// line terminator.
    pub fn receive_line(&mut self) -> Result<String, ClientError> {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(line) = self.decoder.decode_line()? {
                tracing::trace!("{}: received {:?}", self.name, line);
                return Ok(line);
            }

            let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
            let n = match stream.read(&mut buf) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    tracing::debug!("{}: read timed out", self.name);
                    return Err(ClientError::Timeout);
                }
                Err(e) => return Err(ClientError::Io(e)),
            };

            if n == 0 {
                tracing::debug!("{}: stream closed", self.name);
                return Err(ClientError::ConnectionClosed);
            }
            self.decoder.extend(&buf[..n]);
        }
    }

    /// Drops any received bytes not yet returned as lines.
    pub fn discard_input(&mut self) -> usize {
        let stray = self.decoder.buffered();
        self.decoder.clear();
        stray
    }

    /// Closes the connection. Closing twice is a no-op.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.flush();
            tracing::debug!("Closed {}", self.name);
        }
        self.decoder.clear();
    }
}
