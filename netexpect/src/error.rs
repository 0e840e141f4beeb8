//! Error types for netexpect.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for netexpect operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors (connect, authenticate, socket state)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel read/write errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session-level errors (prompt, mode, configuration)
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Dialect registry errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// File transfer errors
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),
}

impl Error {
    /// Partial output captured before a read deadline expired, if this is a read timeout.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            Error::Channel(ChannelError::ReadTimeout { buffer, .. }) => Some(buffer),
            _ => None,
        }
    }

    /// Whether the error is a read timeout the caller may retry with a larger budget.
    pub fn is_read_timeout(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::ReadTimeout { .. }))
    }
}

/// Transport layer errors (connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host is not present in known_hosts (strict verification)
    #[error("Host key for {host}:{port} is not known")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the recorded one
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (pattern reads, closed streams).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Pattern or idle-completion deadline exceeded.
    ///
    /// `buffer` holds everything read before the deadline.
    #[error("Pattern '{pattern}' not found within {timeout:?}")]
    ReadTimeout {
        timeout: Duration,
        pattern: String,
        buffer: String,
    },

    /// Channel closed by the remote side
    #[error("Channel closed")]
    Closed,

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Driver layer errors (prompt discovery, mode transitions, commands).
#[derive(Error, Debug)]
pub enum DriverError {
    /// Connection already disconnected
    #[error("Connection not open")]
    NotConnected,

    /// Enable/config transition did not reach the expected state
    #[error("Failed to enter {target} mode (prompt: '{prompt}')")]
    ModeTransitionFailed { target: String, prompt: String },

    /// An error pattern matched configuration output
    #[error("Invalid configuration command '{command}': {output}")]
    ConfigInvalid { command: String, output: String },

    /// No prompt could be read from the device
    #[error("Unable to find prompt")]
    PromptNotFound,

    /// The prompt has no recognized terminator
    #[error("Prompt '{prompt}' has no recognized terminator")]
    InvalidPrompt { prompt: String },

    /// The echo of a sent command was never observed
    #[error("Command echo for '{command}' not found")]
    CommandEchoNotFound { command: String },

    /// Invalid configuration in the builder or options
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Dialect registry errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// No dialect registered for the device type
    #[error("Unknown device type '{name}'")]
    UnknownDeviceType { name: String },

    /// A dialect with this name already exists
    #[error("Dialect '{name}' already registered")]
    AlreadyRegistered { name: String },

    /// Dialect record is inconsistent
    #[error("Invalid dialect definition: {message}")]
    InvalidDefinition { message: String },
}

/// File transfer errors.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The transport cannot open a secondary file channel
    #[error("File transfer not supported by this transport or dialect")]
    Unsupported,

    /// Destination exists with different content and overwrite is disabled
    #[error("Destination file '{path}' already exists")]
    FileExists { path: String },

    /// Not enough free space at the destination
    #[error("Insufficient space: need {needed} bytes, {available} available")]
    InsufficientSpace { needed: u64, available: u64 },

    /// The remote file is absent after an upload
    #[error("Remote file '{path}' not found after transfer")]
    MissingAfterTransfer { path: String },

    /// Local and remote hashes differ
    #[error("Hash mismatch: local {local}, remote {remote}")]
    HashMismatch { local: String, remote: String },

    /// Device output did not contain the expected value
    #[error("Unable to parse output of '{command}': {output}")]
    UnparsableOutput { command: String, output: String },

    /// Secondary channel protocol violation
    #[error("Transfer protocol error: {message}")]
    Protocol { message: String },

    /// Local file I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Channel(ChannelError::InvalidPattern(err))
    }
}

/// Result type alias using netexpect's Error.
pub type Result<T> = std::result::Result<T, Error>;
