//! Transport over any caller-supplied byte stream.
//!
//! Useful for serial consoles opened by the caller, SSH sessions managed
//! elsewhere, and in-memory duplex pipes.

use async_trait::async_trait;
use futures_util::FutureExt;
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::Transport;
use crate::error::{ChannelError, Result, TransportError};

/// Transport wrapping an `AsyncRead + AsyncWrite` stream.
pub struct StreamTransport<S> {
    stream: S,
    closed: bool,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-connected stream.
    pub fn new(stream: S) -> Self {
        Self { stream, closed: false }
    }

    /// Recover the inner stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_available(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 4096];

        while !self.closed {
            match self.stream.read(&mut chunk).now_or_never() {
                None => break,
                Some(Ok(0)) => {
                    debug!("stream closed by remote");
                    self.closed = true;
                }
                Some(Ok(n)) => out.extend_from_slice(&chunk[..n]),
                Some(Err(e)) => return Err(TransportError::Io(e).into()),
            }
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
        self.stream.write_all(data).await.map_err(TransportError::Io)?;
        self.stream.flush().await.map_err(TransportError::Io)?;
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
