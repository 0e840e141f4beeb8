//! Transport layer: raw byte streams to the device.
//!
//! A [`Transport`] knows nothing about prompts. It moves bytes, reports
//! whether the stream is still alive and, when the underlying protocol can,
//! opens a secondary [`FileChannel`] for file transfers.

pub mod config;
mod scp;
mod ssh;
mod stream;
mod telnet;

use async_trait::async_trait;

use crate::error::{Result, TransferError};

pub use config::{AuthMethod, HostKeyVerification, Protocol, SshConfig, TelnetConfig};
pub use scp::ScpChannel;
pub use ssh::{SshShell, SshTransport};
pub use stream::StreamTransport;
pub use telnet::TelnetTransport;

/// A live, bidirectional byte stream to a device.
#[async_trait]
pub trait Transport: Send {
    /// Return whatever bytes are already buffered without waiting.
    ///
    /// An empty vector means nothing has arrived yet. Once the remote side
    /// has closed and all data was returned, this fails with
    /// [`ChannelError::Closed`](crate::error::ChannelError::Closed).
    async fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Write raw bytes. No line terminator is appended.
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Close the stream.
    async fn close(&mut self) -> Result<()>;

    /// Whether the stream is still usable.
    fn is_alive(&self) -> bool;

    /// Open a secondary channel for file transfer.
    async fn open_file_channel(&mut self) -> Result<Box<dyn FileChannel>> {
        Err(TransferError::Unsupported.into())
    }
}

/// Secondary channel used for bulk file copies.
#[async_trait]
pub trait FileChannel: Send {
    /// Upload `data` to `remote_path` with the given permission bits.
    async fn put(&mut self, data: &[u8], remote_path: &str, mode: u32) -> Result<()>;

    /// Download `remote_path`.
    async fn get(&mut self, remote_path: &str) -> Result<Vec<u8>>;
}
