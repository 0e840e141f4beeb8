//! SCP file channel over a secondary SSH exec channel.
//!
//! Speaks the classic source/sink protocol: `scp -t` to upload, `scp -f` to
//! download. Every control message is acknowledged with a single byte:
//! `0` for success, `1` (warning) or `2` (fatal) followed by a message line.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use log::debug;
use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg};

use super::FileChannel;
use super::ssh::SshHandler;
use crate::error::{Result, TransferError, TransportError};

/// File channel copying over SCP.
pub struct ScpChannel {
    session: Arc<Handle<SshHandler>>,
    timeout: Duration,
}

impl ScpChannel {
    pub(crate) fn new(session: Arc<Handle<SshHandler>>, timeout: Duration) -> Self {
        Self { session, timeout }
    }

    async fn exec(&self, command: &str) -> Result<ScpStream> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;
        debug!("scp exec: {}", command);
        channel.exec(true, command).await.map_err(TransportError::Ssh)?;
        Ok(ScpStream {
            channel,
            buf: BytesMut::with_capacity(8192),
            timeout: self.timeout,
        })
    }
}

#[async_trait]
impl FileChannel for ScpChannel {
    async fn put(&mut self, data: &[u8], remote_path: &str, mode: u32) -> Result<()> {
        let mut stream = self.exec(&format!("scp -t {}", quote(remote_path))).await?;
        stream.expect_ack().await?;

        let header = control_line(mode, data.len() as u64, file_name(remote_path));
        stream.send(header.as_bytes()).await?;
        stream.expect_ack().await?;

        stream.send(data).await?;
        stream.send(&[0]).await?;
        stream.expect_ack().await?;

        stream.finish().await
    }

    async fn get(&mut self, remote_path: &str) -> Result<Vec<u8>> {
        let mut stream = self.exec(&format!("scp -f {}", quote(remote_path))).await?;
        stream.send(&[0]).await?;

        let line = stream.read_line().await?;
        let size = parse_control_line(&line)?;
        stream.send(&[0]).await?;

        let data = stream.read_exact(size).await?;
        stream.expect_ack().await?;
        stream.send(&[0]).await?;

        stream.finish().await?;
        Ok(data)
    }
}

/// One exec channel with a read buffer.
struct ScpStream {
    channel: Channel<Msg>,
    buf: BytesMut,
    timeout: Duration,
}

impl ScpStream {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.channel.data(data).await.map_err(TransportError::Ssh)?;
        Ok(())
    }

    async fn fill(&mut self) -> Result<()> {
        loop {
            let msg = tokio::time::timeout(self.timeout, self.channel.wait())
                .await
                .map_err(|_| TransportError::Timeout(self.timeout))?;
            match msg {
                Some(ChannelMsg::Data { data }) => {
                    self.buf.extend_from_slice(&data);
                    return Ok(());
                }
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    return Err(protocol(String::from_utf8_lossy(&data).trim()));
                }
                Some(ChannelMsg::Eof | ChannelMsg::Close) | None => {
                    return Err(protocol("channel closed by remote"));
                }
                Some(_) => {}
            }
        }
    }

    async fn expect_ack(&mut self) -> Result<()> {
        while self.buf.is_empty() {
            self.fill().await?;
        }
        match self.buf.get_u8() {
            0 => Ok(()),
            code @ (1 | 2) => {
                let message = self.read_line().await?;
                Err(protocol(&format!("remote error {}: {}", code, message.trim())))
            }
            other => Err(protocol(&format!("unexpected ack byte {:#04x}", other))),
        }
    }

    async fn read_line(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = memchr::memchr(b'\n', &self.buf) {
                let line = self.buf.split_to(pos + 1);
                return Ok(String::from_utf8_lossy(&line[..pos]).into_owned());
            }
            self.fill().await?;
        }
    }

    async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        while self.buf.len() < len {
            self.fill().await?;
        }
        Ok(self.buf.split_to(len).to_vec())
    }

    async fn finish(self) -> Result<()> {
        self.channel.eof().await.map_err(TransportError::Ssh)?;
        if let Err(e) = self.channel.close().await {
            debug!("scp channel close: {}", e);
        }
        Ok(())
    }
}

fn protocol(message: &str) -> crate::error::Error {
    TransferError::Protocol {
        message: message.to_string(),
    }
    .into()
}

/// `C<mode> <size> <name>\n`
fn control_line(mode: u32, size: u64, name: &str) -> String {
    format!("C{:04o} {} {}\n", mode & 0o7777, size, name)
}

/// Parse the size out of a `C` control line; `\x01`/`\x02` lines are errors.
fn parse_control_line(line: &str) -> Result<usize> {
    if let Some(message) = line.strip_prefix(['\x01', '\x02']) {
        return Err(protocol(&format!("remote error: {}", message.trim())));
    }
    let rest = line
        .strip_prefix('C')
        .ok_or_else(|| protocol(&format!("unexpected control line {:?}", line)))?;
    let mut fields = rest.splitn(3, ' ');
    let _mode = fields.next();
    fields
        .next()
        .and_then(|size| size.parse().ok())
        .ok_or_else(|| protocol(&format!("bad size in control line {:?}", line)))
}

/// Bare file name: everything after the last `/` or `:`.
fn file_name(path: &str) -> &str {
    path.rsplit(['/', ':']).next().unwrap_or(path)
}

fn quote(path: &str) -> String {
    if path.chars().any(char::is_whitespace) {
        format!("'{}'", path.replace('\'', r"'\''"))
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_line() {
        assert_eq!(control_line(0o644, 1234, "test.cfg"), "C0644 1234 test.cfg\n");
    }

    #[test]
    fn test_parse_control_line() {
        assert_eq!(parse_control_line("C0644 1234 test.cfg").unwrap(), 1234);
        assert!(parse_control_line("\x01scp: flash:/x: No such file").is_err());
        assert!(parse_control_line("T123 0 456 0").is_err());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("flash:/test.cfg"), "test.cfg");
        assert_eq!(file_name("bootflash:image.bin"), "image.bin");
        assert_eq!(file_name("/var/tmp/a.txt"), "a.txt");
        assert_eq!(file_name("plain"), "plain");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("flash:/a.cfg"), "flash:/a.cfg");
        assert_eq!(quote("/tmp/my file"), "'/tmp/my file'");
    }
}
