//! Async telnet client.
//!
//! The client is generic over its transport so the negotiation logic can be
//! driven by mock IO in tests; production code uses [`TcpStream`].

use crate::error::{Result, TelnetError};
use crate::protocol::{self, TelnetEvent, TelnetParser, Verb};
use std::collections::HashSet;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

/// Default timeout for establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Silence after which a response is considered complete.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Default upper bound for collecting a command's output.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Socket read buffer size.
const READ_BUFFER_SIZE: usize = 4096;

/// How output of a command is collected.
#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Stop reading once this text appears (typically the shell prompt).
    pub expect: Option<String>,
    /// Upper bound for the whole exchange.
    pub timeout: Duration,
    /// Without `expect`, stop after this much silence.
    pub quiet: Duration,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            expect: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            quiet: DEFAULT_QUIET_PERIOD,
        }
    }
}

/// Outcome of a single socket read.
enum Fill {
    Data,
    Idle,
    Eof,
}

/// Telnet client over an async byte stream.
pub struct TelnetClient<S = TcpStream> {
    stream: S,
    parser: TelnetParser,
    /// Negotiations already answered; each is answered once to avoid loops.
    answered: HashSet<(Verb, u8)>,
    /// Received application data not yet handed to the caller.
    pending: Vec<u8>,
    peer: String,
    closed: bool,
}

impl TelnetClient<TcpStream> {
    /// Connect to `host:port` over TCP.
    pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let addr = format!("{host}:{port}");
        tracing::debug!(addr = %addr, "Connecting to telnet server");

        let stream = timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| TelnetError::Timeout(connect_timeout))?
            .map_err(|source| TelnetError::Connect {
                addr: addr.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;

        tracing::info!(addr = %addr, "Telnet connection established");
        Ok(Self::new(stream, addr))
    }
}

impl<S> TelnetClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-connected stream.
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream,
            parser: TelnetParser::new(),
            answered: HashSet::new(),
            pending: Vec::new(),
            peer: peer.into(),
            closed: false,
        }
    }

    /// Remote address this client talks to.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Whether the peer has closed the connection.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read once, waiting at most `wait`, and process what arrived.
    ///
    /// Only the socket read is raced against the timer, so a reply to a
    /// negotiation is never cut off half-written.
    async fn fill(&mut self, wait: Duration) -> Result<Fill> {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let n = match timeout(wait, self.stream.read(&mut buf)).await {
            Err(_) => return Ok(Fill::Idle),
            Ok(result) => result?,
        };
        if n == 0 {
            tracing::debug!(peer = %self.peer, "Telnet peer closed connection");
            self.closed = true;
            return Ok(Fill::Eof);
        }

        let mut replies = Vec::new();
        for event in self.parser.feed(&buf[..n]) {
            match event {
                TelnetEvent::Data(bytes) => self.pending.extend_from_slice(&bytes),
                TelnetEvent::Negotiate { verb, option } => {
                    tracing::trace!(peer = %self.peer, ?verb, option, "Negotiation request");
                    if !self.answered.insert((verb, option)) {
                        continue;
                    }
                    if let Some(reply) = protocol::negotiation_reply(verb, option) {
                        replies.extend_from_slice(&reply);
                    }
                }
                TelnetEvent::Command(cmd) => {
                    tracing::trace!(peer = %self.peer, cmd, "Telnet command");
                }
                TelnetEvent::Subnegotiation { option, payload } => {
                    tracing::trace!(peer = %self.peer, option, len = payload.len(), "Ignoring subnegotiation");
                }
            }
        }

        if !replies.is_empty() {
            self.stream.write_all(&replies).await?;
            self.stream.flush().await?;
        }
        Ok(Fill::Data)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(TelnetError::Closed);
        }
        Ok(())
    }

    fn take_pending(&mut self) -> String {
        let text = protocol::decode_text(&self.pending);
        self.pending.clear();
        text
    }

    /// Collect output until the stream is quiet for `quiet` or `total`
    /// has elapsed.
    ///
    /// Returns whatever was received. If the peer closed the connection
    /// before sending anything, returns [`TelnetError::Closed`].
    pub async fn read_available(&mut self, quiet: Duration, total: Duration) -> Result<String> {
        self.ensure_open()?;
        let deadline = Instant::now() + total;

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self.fill(quiet.min(deadline - now)).await? {
                Fill::Data => continue,
                Fill::Idle => break,
                Fill::Eof => {
                    if self.pending.is_empty() {
                        return Err(TelnetError::Closed);
                    }
                    break;
                }
            }
        }

        Ok(self.take_pending())
    }

    /// Read until `pattern` appears in the received data.
    ///
    /// Returns the text up to and including the pattern; anything after it
    /// stays buffered for the next read.
    pub async fn read_until(&mut self, pattern: &str, wait: Duration) -> Result<String> {
        self.ensure_open()?;
        let needle = pattern.as_bytes();
        let deadline = Instant::now() + wait;

        loop {
            if let Some(pos) = find(&self.pending, needle) {
                let rest = self.pending.split_off(pos + needle.len());
                let text = self.take_pending();
                self.pending = rest;
                return Ok(text);
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(peer = %self.peer, pattern = %pattern, "Pattern not seen before timeout");
                return Err(TelnetError::Timeout(wait));
            }
            if let Fill::Eof = self.fill(deadline - now).await? {
                return Err(TelnetError::Closed);
            }
        }
    }

    /// Send a line of text terminated by CRLF.
    pub async fn send_line(&mut self, text: &str) -> Result<()> {
        self.ensure_open()?;
        let mut bytes = protocol::escape_data(text.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Send a command and collect its output.
    ///
    /// A server-side echo of the command line is removed from the output.
    pub async fn send_command(&mut self, command: &str, opts: &CommandOptions) -> Result<String> {
        tracing::debug!(peer = %self.peer, command_len = command.len(), "Sending telnet command");
        self.send_line(command).await?;

        let output = match &opts.expect {
            Some(pattern) => self.read_until(pattern, opts.timeout).await?,
            None => self.read_available(opts.quiet, opts.timeout).await?,
        };

        tracing::debug!(peer = %self.peer, output_len = output.len(), "Telnet command completed");
        Ok(strip_echo(output, command))
    }

    /// Shut down the write side of the connection.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream.shutdown().await?;
        Ok(())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn strip_echo(output: String, command: &str) -> String {
    match output.split_once('\n') {
        Some((first, rest)) if first.trim_end() == command.trim_end() => rest.to_string(),
        _ => output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{option, DO, DONT, IAC, WILL, WONT};
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_refuses_terminal_type_and_reads_banner() {
        let mock = Builder::new()
            .read(&[IAC, DO, option::TERMINAL_TYPE])
            .write(&[IAC, WONT, option::TERMINAL_TYPE])
            .read(b"login: ")
            .build();

        let mut client = TelnetClient::new(mock, "mock:23");
        let text = client
            .read_until("login: ", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(text, "login: ");
    }

    #[tokio::test]
    async fn test_accepts_server_echo() {
        let mock = Builder::new()
            .read(&[IAC, WILL, option::ECHO, IAC, WILL, option::LINEMODE])
            .write(&[IAC, DO, option::ECHO, IAC, DONT, option::LINEMODE])
            .read(b"> ")
            .build();

        let mut client = TelnetClient::new(mock, "mock:23");
        let text = client.read_until("> ", Duration::from_secs(1)).await.unwrap();
        assert_eq!(text, "> ");
    }

    #[tokio::test]
    async fn test_repeated_negotiation_answered_once() {
        let mock = Builder::new()
            .read(&[IAC, DO, option::NAWS])
            .write(&[IAC, WONT, option::NAWS])
            .read(&[IAC, DO, option::NAWS, b'$'])
            .build();

        let mut client = TelnetClient::new(mock, "mock:23");
        let text = client.read_until("$", Duration::from_secs(1)).await.unwrap();
        assert_eq!(text, "$");
    }

    #[tokio::test]
    async fn test_send_command_strips_echo() {
        let mock = Builder::new()
            .write(b"ls\r\n")
            .read(b"ls\r\nfile1\r\n$ ")
            .build();

        let mut client = TelnetClient::new(mock, "mock:23");
        let opts = CommandOptions {
            expect: Some("$ ".into()),
            ..Default::default()
        };
        let output = client.send_command("ls", &opts).await.unwrap();
        assert_eq!(output, "file1\n$ ");
    }

    #[tokio::test]
    async fn test_read_until_keeps_remainder() {
        let mock = Builder::new().read(b"one> two> ").build();
        let mut client = TelnetClient::new(mock, "mock:23");

        let first = client.read_until("> ", Duration::from_secs(1)).await.unwrap();
        assert_eq!(first, "one> ");
        let second = client.read_until("> ", Duration::from_secs(1)).await.unwrap();
        assert_eq!(second, "two> ");
    }

    #[tokio::test]
    async fn test_eof_without_data_is_closed() {
        let mock = Builder::new().build();
        let mut client = TelnetClient::new(mock, "mock:23");
        let err = client
            .read_available(Duration::from_millis(50), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TelnetError::Closed));
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn test_read_available_returns_data_before_eof() {
        let mock = Builder::new().read(b"bye\r\n").build();
        let mut client = TelnetClient::new(mock, "mock:23");
        let text = client
            .read_available(Duration::from_millis(50), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(text, "bye\n");
        assert!(client.send_line("x").await.is_err());
    }

    #[test]
    fn test_strip_echo_only_matching_line() {
        assert_eq!(strip_echo("pwd\n/root\n".into(), "pwd"), "/root\n");
        assert_eq!(strip_echo("/root\n".into(), "pwd"), "/root\n");
    }
}
