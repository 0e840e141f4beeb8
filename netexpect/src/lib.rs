//! # netexpect
//!
//! Async interactive CLI sessions with network devices over SSH or Telnet.
//!
//! netexpect drives a device's command line the way an operator would: it
//! discovers the prompt, moves between user, enable and configuration modes,
//! sends commands and reads until the prompt comes back, and copies files
//! with integrity checks.
//!
//! ## Features
//!
//! - SSH via russh, Telnet with option negotiation, or any async byte stream
//! - Pattern reads with tail search, idle-based timing reads, ANSI stripping
//! - Per-dialect prompt, mode, and error rules (Cisco, Arista, Juniper, Linux, ...)
//! - Config sets with fail-fast error detection
//! - SCP and inline-Tcl file transfer with MD5/SHA-256 verification
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netexpect::ConnectionBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netexpect::Error> {
//!     let mut conn = ConnectionBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .device_type("cisco_ios")
//!         .connect()
//!         .await?;
//!
//!     let response = conn.send_command("show version").await?;
//!     println!("{}", response.result);
//!
//!     conn.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod platform;
pub mod transfer;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use driver::{
    ConfigSetOptions, Connection, ConnectionBuilder, ConnectionParams, InteractiveBuilder, InteractiveEvent,
    InteractiveResult, Response, SendCommandOptions, SessionMode, TimingCommandOptions, TimingPolicy,
};
pub use error::{Error, Result};
pub use platform::{DeviceType, Dialect, DialectRegistry};
pub use transfer::{FileTransfer, FileTransferJob, HashAlgorithm, TransferOutcome, file_transfer};
pub use transport::{AuthMethod, HostKeyVerification, Protocol};
