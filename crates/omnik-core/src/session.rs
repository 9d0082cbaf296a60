//! One authenticate-and-read exchange with an Omnik inverter.
//!
//! Every call to [`InverterSession::read`] opens a fresh TCP connection to
//! the inverter's Wi-Fi module, sends the [`AuthCommand`] for its serial,
//! reads the reply up to the first newline and decodes it. The connection
//! is dropped on every exit path; nothing is reused between calls and
//! nothing is retried.
//!
//! ```text
//! Idle -> Connected -> Sent -> AwaitingReply -> Decoded
//!   \________\___________\_________\___________> Failed
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use omnik_types::{InverterInfo, Sample};

use crate::auth::AuthCommand;
use crate::error::{Error, Result};
use crate::traits::{Inverter, OmnikDecoder, SampleDecoder};

/// TCP port the inverter's Wi-Fi module listens on.
pub const SERVICE_PORT: u16 = 8899;

/// Byte terminating the inverter's reply.
pub const REPLY_DELIMITER: u8 = b'\n';

/// Default timeout for establishing the TCP connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for sending the command and receiving the reply.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of the wall-clock instant stamped on decoded samples.
pub type Clock = fn() -> OffsetDateTime;

/// Local wall-clock time, falling back to UTC when the local offset is
/// unavailable (e.g. in multi-threaded processes on some platforms).
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Progress of a single exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Nothing done yet.
    Idle,
    /// TCP connection established.
    Connected,
    /// Auth command written.
    Sent,
    /// Waiting for the newline-terminated reply.
    AwaitingReply,
    /// Reply decoded into a sample.
    Decoded,
    /// The exchange was abandoned.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Connected => "connected",
            SessionState::Sent => "sent",
            SessionState::AwaitingReply => "awaiting reply",
            SessionState::Decoded => "decoded",
            SessionState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Socket options for an [`InverterSession`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use omnik_core::SessionOptions;
///
/// let options = SessionOptions::default()
///     .connect_timeout(Duration::from_secs(3))
///     .read_timeout(Duration::from_secs(5));
/// assert_eq!(options.port, 8899);
/// ```
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// TCP port to dial.
    pub port: u16,
    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
    /// Timeout for writing the command and reading the full reply.
    pub read_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            port: SERVICE_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl SessionOptions {
    /// Set the TCP port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the reply timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::InvalidConfig("port must be > 0".to_string()));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "connect_timeout must be > 0".to_string(),
            ));
        }
        if self.read_timeout.is_zero() {
            return Err(Error::InvalidConfig("read_timeout must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Reads samples from one inverter, one TCP connection per read.
pub struct InverterSession {
    info: InverterInfo,
    command: AuthCommand,
    options: SessionOptions,
    decoder: Arc<dyn SampleDecoder>,
    clock: Clock,
}

impl fmt::Debug for InverterSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InverterSession")
            .field("info", &self.info)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl InverterSession {
    /// Create a session with default options.
    pub fn new(info: InverterInfo) -> Self {
        let command = AuthCommand::for_serial(info.serial);
        Self {
            info,
            command,
            options: SessionOptions::default(),
            decoder: Arc::new(OmnikDecoder),
            clock: local_now,
        }
    }

    /// Create a session with custom options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `options` fail validation.
    pub fn with_options(info: InverterInfo, options: SessionOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            ..Self::new(info)
        })
    }

    /// Replace the reply decoder.
    #[must_use]
    pub fn decoder(mut self, decoder: impl SampleDecoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Replace the clock used to stamp samples.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The auth command sent on every exchange.
    pub fn command(&self) -> &AuthCommand {
        &self.command
    }

    /// The session's socket options.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// `host:port` this session dials.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.info.address, self.options.port)
    }

    /// Perform one exchange and decode the reply.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the inverter cannot be reached.
    /// - [`Error::Read`] if sending fails or the socket closes or times out
    ///   before a newline arrives.
    /// - [`Error::InvalidPayload`] if the decoder rejects the reply.
    pub async fn read(&self) -> Result<Sample> {
        let endpoint = self.endpoint();
        debug!(%endpoint, state = %SessionState::Idle, "Starting exchange");

        let mut stream = self.connect(&endpoint).await?;
        let payload = self.exchange(&mut stream, &endpoint).await?;
        drop(stream);

        let sample = self.decoder.decode(&payload, (self.clock)()).inspect_err(|e| {
            debug!(%endpoint, state = %SessionState::Failed, "Decoding failed: {}", e);
        })?;
        debug!(
            %endpoint,
            state = %SessionState::Decoded,
            "Decoded {} byte reply",
            payload.len()
        );

        Ok(sample)
    }

    async fn connect(&self, endpoint: &str) -> Result<TcpStream> {
        let dial = TcpStream::connect((self.info.address.as_str(), self.options.port));
        let result = match timeout(self.options.connect_timeout, dial).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no connection within {:?}", self.options.connect_timeout),
            )),
        };

        let stream = result.map_err(|source| {
            debug!(%endpoint, state = %SessionState::Failed, "Connect failed: {}", source);
            Error::Connection {
                endpoint: endpoint.to_string(),
                source,
            }
        })?;

        debug!(%endpoint, state = %SessionState::Connected, "Connected");
        Ok(stream)
    }

    async fn exchange(&self, stream: &mut TcpStream, endpoint: &str) -> Result<Vec<u8>> {
        let mut state = SessionState::Connected;

        let outcome = timeout(
            self.options.read_timeout,
            self.send_and_receive(stream, &mut state),
        )
        .await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no reply within {:?}", self.options.read_timeout),
            )),
        };

        result.map_err(|source| {
            debug!(%endpoint, failed_in = %state, "Exchange failed: {}", source);
            Error::Read {
                endpoint: endpoint.to_string(),
                state,
                source,
            }
        })
    }

    async fn send_and_receive(
        &self,
        stream: &mut TcpStream,
        state: &mut SessionState,
    ) -> io::Result<Vec<u8>> {
        stream.write_all(self.command.as_bytes()).await?;
        stream.flush().await?;
        *state = SessionState::Sent;
        debug!(state = %state, "Sent {} byte auth command", self.command.as_bytes().len());

        *state = SessionState::AwaitingReply;
        let mut reader = BufReader::new(stream);
        let mut reply = Vec::new();
        reader.read_until(REPLY_DELIMITER, &mut reply).await?;

        if reply.last() == Some(&REPLY_DELIMITER) {
            reply.pop();
            Ok(reply)
        } else {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "connection closed after {} bytes without a line delimiter",
                    reply.len()
                ),
            ))
        }
    }
}

#[async_trait]
impl Inverter for InverterSession {
    fn info(&self) -> &InverterInfo {
        &self.info
    }

    async fn read_sample(&self) -> Result<Sample> {
        self.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_options_default() {
        let options = SessionOptions::default();
        assert_eq!(options.port, SERVICE_PORT);
        assert_eq!(options.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(options.read_timeout, DEFAULT_READ_TIMEOUT);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_session_options_validate() {
        assert!(SessionOptions::default().port(0).validate().is_err());
        assert!(
            SessionOptions::default()
                .read_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            SessionOptions::default()
                .connect_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_session_rejects_invalid_options() {
        let info = InverterInfo::new("192.168.1.40", 0x601A2B4E);
        let err = InverterSession::with_options(
            info.clone(),
            SessionOptions::default().read_timeout(Duration::ZERO),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(InverterSession::with_options(info, SessionOptions::default().port(0)).is_err());
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::AwaitingReply.to_string(), "awaiting reply");
        assert_eq!(SessionState::Decoded.to_string(), "decoded");
    }

    #[test]
    fn test_session_endpoint_and_command() {
        let session = InverterSession::with_options(
            InverterInfo::new("192.168.1.40", 0x601A2B4E),
            SessionOptions::default().port(9000),
        )
        .unwrap();
        assert_eq!(session.endpoint(), "192.168.1.40:9000");
        assert_eq!(session.command(), &AuthCommand::for_serial(0x601A2B4E));
    }
}
