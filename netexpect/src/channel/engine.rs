//! Polling read engine.
//!
//! There is no framing on an interactive CLI, so every read is a drain of
//! whatever the transport has buffered. Completion is decided either by a
//! regex matching the accumulated output or by the output going idle.

use std::time::Duration;

use log::{debug, trace};
use regex::bytes::Regex;
use tokio::time::{Instant, sleep};

use super::buffer::PatternBuffer;
use super::session_log::SessionLog;
use crate::error::{ChannelError, Result};
use crate::transport::{FileChannel, Transport};

/// Polling constants for the read engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadConfig {
    /// Sleep between drains while waiting for a pattern.
    pub poll_interval: Duration,

    /// First sleep of the idle-completion loop.
    pub timing_poll_start: Duration,

    /// Ceiling of the idle-completion backoff.
    pub timing_poll_max: Duration,

    /// Overlap re-scanned when searching new output.
    pub search_depth: usize,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            timing_poll_start: Duration::from_millis(100),
            timing_poll_max: Duration::from_secs(2),
            search_depth: 1000,
        }
    }
}

/// Why a read finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTermination {
    /// The caller's pattern matched.
    Pattern,

    /// The hard deadline passed with data in the buffer.
    Timeout,

    /// Output stopped growing for the idle period.
    Idle,
}

/// Output of one read operation.
#[derive(Debug, Clone)]
pub struct ReadResult {
    /// Everything read, up to and including the match for pattern reads.
    pub output: String,

    /// How the read ended.
    pub termination: ReadTermination,

    /// Text of the match, for pattern reads.
    pub matched: Option<String>,
}

/// Interactive channel: a transport plus the pattern buffer.
pub struct Channel {
    transport: Box<dyn Transport>,
    config: ReadConfig,
    buffer: PatternBuffer,
    session_log: Option<SessionLog>,
}

impl Channel {
    /// Wrap a connected transport.
    pub fn new(transport: Box<dyn Transport>, config: ReadConfig, ansi_escape_codes: bool) -> Self {
        Self {
            buffer: PatternBuffer::new(config.search_depth).with_ansi_stripping(ansi_escape_codes),
            transport,
            config,
            session_log: None,
        }
    }

    /// Attach a transcript sink.
    pub fn set_session_log(&mut self, log: SessionLog) {
        self.session_log = Some(log);
    }

    /// Access the transcript sink, if any.
    pub fn session_log_mut(&mut self) -> Option<&mut SessionLog> {
        self.session_log.as_mut()
    }

    /// Read engine constants.
    pub fn config(&self) -> &ReadConfig {
        &self.config
    }

    /// Whether the transport is still alive.
    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    /// Write text as-is.
    pub async fn write_channel(&mut self, data: &str) -> Result<()> {
        trace!("write: {:?}", data);
        if let Some(log) = self.session_log.as_mut() {
            log.record_write(data.as_bytes());
        }
        self.transport.write(data.as_bytes()).await
    }

    /// Write a secret; the transcript only sees a placeholder.
    pub async fn write_hidden(&mut self, data: &str) -> Result<()> {
        trace!("write: <hidden>");
        if let Some(log) = self.session_log.as_mut() {
            log.record_hidden_write();
        }
        self.transport.write(data.as_bytes()).await
    }

    /// Drain the transport once and return everything pending.
    pub async fn read_channel(&mut self) -> Result<String> {
        self.fill().await?;
        Ok(lossy(self.buffer.take()))
    }

    /// Read until `pattern` matches or `timeout` elapses.
    ///
    /// Output after the match stays buffered for the next read. On timeout
    /// the partial output is carried by the error.
    pub async fn read_until_pattern(&mut self, pattern: &Regex, timeout: Duration) -> Result<ReadResult> {
        // a timeout too large to represent never expires
        let deadline = Instant::now().checked_add(timeout);

        loop {
            self.fill().await?;

            if let Some((start, end)) = self.buffer.find_next(pattern) {
                let matched = String::from_utf8_lossy(&self.buffer.as_slice()[start..end]).into_owned();
                let output = lossy(self.buffer.split_to(end));
                trace!("pattern {:?} matched {:?}", pattern.as_str(), matched);
                return Ok(ReadResult {
                    output,
                    termination: ReadTermination::Pattern,
                    matched: Some(matched),
                });
            }

            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                let buffer = lossy(self.buffer.take());
                debug!("pattern {:?} not found within {:?}", pattern.as_str(), timeout);
                return Err(ChannelError::ReadTimeout {
                    timeout,
                    pattern: pattern.as_str().to_string(),
                    buffer,
                }
                .into());
            }

            let mut wait = self.config.poll_interval;
            if let Some(deadline) = deadline {
                wait = wait.min(deadline.saturating_duration_since(now));
            }
            sleep(wait).await;
        }
    }

    /// Read until the output has been idle for `last_read`.
    ///
    /// A zero `read_timeout` disables the hard deadline. When the deadline
    /// passes with data buffered the data is returned with
    /// [`ReadTermination::Timeout`]; with nothing buffered it is an error.
    pub async fn read_channel_timing(&mut self, read_timeout: Duration, last_read: Duration) -> Result<ReadResult> {
        let start = Instant::now();
        let hard_deadline = if read_timeout.is_zero() {
            None
        } else {
            start.checked_add(read_timeout)
        };
        let mut last_growth = start;
        let mut backoff = self.config.timing_poll_start;

        loop {
            let now = Instant::now();
            if self.fill().await? > 0 {
                last_growth = now;
                backoff = self.config.timing_poll_start;
            }

            let idle_deadline = if self.buffer.is_empty() {
                None
            } else {
                last_growth.checked_add(last_read)
            };
            if idle_deadline.is_some_and(|idle| now >= idle) {
                return Ok(self.finish(ReadTermination::Idle));
            }

            if let Some(hard) = hard_deadline
                && now >= hard
            {
                if self.buffer.is_empty() {
                    return Err(ChannelError::ReadTimeout {
                        timeout: read_timeout,
                        pattern: "<idle>".to_string(),
                        buffer: String::new(),
                    }
                    .into());
                }
                debug!("timing read hit hard deadline of {:?}", read_timeout);
                return Ok(self.finish(ReadTermination::Timeout));
            }

            let mut wait = backoff;
            for limit in [idle_deadline, hard_deadline].into_iter().flatten() {
                wait = wait.min(limit.saturating_duration_since(now));
            }
            sleep(wait).await;
            backoff = (backoff * 2).min(self.config.timing_poll_max);
        }
    }

    /// Discard stale output: one drain, one short poll, one more drain.
    pub async fn clear_buffer(&mut self) -> Result<String> {
        self.fill().await?;
        sleep(self.config.poll_interval).await;
        self.fill().await?;
        let stale = lossy(self.buffer.take());
        if !stale.is_empty() {
            trace!("cleared {} stale bytes", stale.len());
        }
        Ok(stale)
    }

    /// Open the transport's secondary file channel.
    pub async fn open_file_channel(&mut self) -> Result<Box<dyn FileChannel>> {
        self.transport.open_file_channel().await
    }

    /// Close the transcript and the transport.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(log) = self.session_log.as_mut() {
            log.close();
        }
        self.transport.close().await
    }

    async fn fill(&mut self) -> Result<usize> {
        let data = self.transport.read_available().await?;
        if !data.is_empty() {
            if let Some(log) = self.session_log.as_mut() {
                log.record_read(&data);
            }
            self.buffer.extend(&data);
        }
        Ok(data.len())
    }

    fn finish(&mut self, termination: ReadTermination) -> ReadResult {
        ReadResult {
            output: lossy(self.buffer.take()),
            termination,
            matched: None,
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("config", &self.config)
            .field("buffered", &self.buffer.len())
            .field("alive", &self.transport.is_alive())
            .finish_non_exhaustive()
    }
}

fn lossy(data: Vec<u8>) -> String {
    match String::from_utf8(data) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}
