//! Raw session transcript sink.
//!
//! A [`SessionLog`] is owned by one connection and receives every byte read
//! from and written to the device. Registered secrets are replaced before
//! anything reaches the sink.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::warn;

const REDACTED: &str = "********";

/// Transcript writer with secret redaction.
pub struct SessionLog {
    sink: Option<Box<dyn Write + Send>>,
    secrets: Vec<String>,
    record_writes: bool,
}

impl SessionLog {
    /// Wrap an arbitrary writer.
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
            secrets: Vec::new(),
            record_writes: true,
        }
    }

    /// Create (truncate) a transcript file.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }

    /// Only record device output, not what was sent.
    ///
    /// Devices echo input, so recording both duplicates every command.
    pub fn without_writes(mut self) -> Self {
        self.record_writes = false;
        self
    }

    /// Register a value that must never appear in the transcript.
    pub fn add_secret(&mut self, secret: impl Into<String>) {
        let secret = secret.into();
        if !secret.is_empty() && !self.secrets.contains(&secret) {
            self.secrets.push(secret);
        }
    }

    /// Record bytes read from the device.
    pub fn record_read(&mut self, data: &[u8]) {
        self.emit(data);
    }

    /// Record bytes written to the device.
    pub fn record_write(&mut self, data: &[u8]) {
        if self.record_writes {
            self.emit(data);
        }
    }

    /// Record a hidden write (a password) as a placeholder.
    pub fn record_hidden_write(&mut self) {
        if self.record_writes {
            self.emit(format!("{REDACTED}\n").as_bytes());
        }
    }

    /// Whether the sink is still open.
    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    /// Flush and release the sink. Later records are dropped.
    pub fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.flush() {
                warn!("Failed to flush session log: {}", e);
            }
        }
    }

    fn emit(&mut self, data: &[u8]) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        let result = if self.secrets.is_empty() {
            sink.write_all(data)
        } else {
            let mut text = String::from_utf8_lossy(data).into_owned();
            for secret in &self.secrets {
                text = text.replace(secret.as_str(), REDACTED);
            }
            sink.write_all(text.as_bytes())
        };

        if let Err(e) = result {
            warn!("Session log write failed: {}", e);
        }
    }
}

impl Drop for SessionLog {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SessionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLog")
            .field("open", &self.is_open())
            .field("secrets", &self.secrets.len())
            .finish()
    }
}
