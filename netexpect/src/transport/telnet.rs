//! Telnet transport over a plain TCP socket.
//!
//! Option negotiation is handled inline: the server may enable ECHO and
//! SUPPRESS-GO-AHEAD, every other option is refused. Subnegotiations are
//! skipped.

use std::collections::HashSet;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use log::{debug, trace};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use super::Transport;
use super::config::TelnetConfig;
use crate::error::{ChannelError, Result, TransportError};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

/// Telnet transport.
pub struct TelnetTransport {
    stream: TcpStream,
    codec: TelnetCodec,
    closed: bool,
}

impl TelnetTransport {
    /// Open the TCP connection. The login dialog is left to the caller.
    pub async fn connect(config: &TelnetConfig) -> Result<Self> {
        debug!("telnet connecting to {}", config.socket_addr());
        let stream = tokio::time::timeout(
            config.timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|source| TransportError::ConnectionFailed {
            host: config.host.clone(),
            port: config.port,
            source,
        })?;

        stream.set_nodelay(true).map_err(TransportError::Io)?;

        Ok(Self {
            stream,
            codec: TelnetCodec::default(),
            closed: false,
        })
    }
}

#[async_trait]
impl Transport for TelnetTransport {
    async fn read_available(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 4096];

        while !self.closed {
            match self.stream.try_read(&mut chunk) {
                Ok(0) => {
                    debug!("telnet connection closed by remote");
                    self.closed = true;
                }
                Ok(n) => self.codec.decode(&chunk[..n], &mut out),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(TransportError::Io(e).into()),
            }
        }

        let replies = self.codec.take_replies();
        if !replies.is_empty() && !self.closed {
            trace!("telnet negotiation reply: {:?}", replies.as_ref());
            self.stream.write_all(&replies).await.map_err(TransportError::Io)?;
        }

        if out.is_empty() && self.closed {
            return Err(ChannelError::Closed.into());
        }
        Ok(out)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(ChannelError::Closed.into());
        }
        self.stream
            .write_all(&escape_iac(data))
            .await
            .map_err(TransportError::Io)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.stream.shutdown().await.map_err(TransportError::Io)?;
        Ok(())
    }

    fn is_alive(&self) -> bool {
        !self.closed
    }
}

/// Double every IAC byte so data is not mistaken for a command.
fn escape_iac(data: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(data.len());
    for &b in data {
        escaped.push(b);
        if b == IAC {
            escaped.push(IAC);
        }
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Data,
    Cr,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Incremental IAC decoder. State survives across reads.
#[derive(Debug, Default)]
struct TelnetCodec {
    state: State,
    replies: BytesMut,
    answered: HashSet<(u8, u8)>,
}

impl TelnetCodec {
    fn decode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &b in input {
            self.state = match (self.state, b) {
                (State::Data | State::Cr, IAC) => State::Iac,
                (State::Cr, 0) => State::Data,
                (State::Data | State::Cr, b'\r') => {
                    out.push(b'\r');
                    State::Cr
                }
                (State::Data | State::Cr, _) => {
                    out.push(b);
                    State::Data
                }
                (State::Iac, IAC) => {
                    out.push(IAC);
                    State::Data
                }
                (State::Iac, DO | DONT | WILL | WONT) => State::Negotiate(b),
                (State::Iac, SB) => State::Sub,
                (State::Iac, _) => State::Data,
                (State::Negotiate(command), option) => {
                    self.negotiate(command, option);
                    State::Data
                }
                (State::Sub, IAC) => State::SubIac,
                (State::Sub, _) => State::Sub,
                (State::SubIac, SE) => State::Data,
                (State::SubIac, _) => State::Sub,
            };
        }
    }

    fn negotiate(&mut self, command: u8, option: u8) {
        let reply = match (command, option) {
            (WILL, OPT_ECHO | OPT_SGA) => DO,
            (WILL, _) => DONT,
            (DO, OPT_SGA) => WILL,
            (DO, _) => WONT,
            // acknowledgements of our own refusals need no answer
            _ => return,
        };

        // answer each request once to avoid negotiation loops
        if self.answered.insert((command, option)) {
            self.replies.put_slice(&[IAC, reply, option]);
        }
    }

    fn take_replies(&mut self) -> BytesMut {
        self.replies.split()
    }
}
