//! Connection: one interactive CLI session to one device.

use std::time::Duration;

use log::{debug, info, warn};
use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};

use super::mode::SessionMode;
use super::prompt::normalize_command;
use super::timing::TimingPolicy;
use crate::channel::{Channel, DialectPatterns, compile, prompt_pattern};
use crate::error::{DriverError, Result, TransportError};
use crate::platform::{Dialect, DialectCapabilities, SessionStrategy};

/// Line terminator sent after every command.
pub const RETURN: &str = "\n";

/// Attempts made to wake a silent device during session setup.
const PROMPT_ATTEMPTS: usize = 10;

/// Rounds of the Telnet login dialog before giving up.
const LOGIN_ROUNDS: usize = 6;

/// Credentials held by a connection.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: Option<SecretString>,
    /// Enable secret; the password is used when absent.
    pub secret: Option<SecretString>,
}

/// An open session with a network device.
///
/// Created by [`ConnectionBuilder`](super::ConnectionBuilder). Every
/// operation takes `&mut self`: a connection is driven by one task at a
/// time. Call [`disconnect`](Self::disconnect) when done.
pub struct Connection {
    pub(crate) channel: Channel,
    pub(crate) dialect: Dialect,
    pub(crate) patterns: DialectPatterns,
    pub(crate) timing: TimingPolicy,
    pub(crate) credentials: Credentials,
    pub(crate) base_prompt: String,
    pub(crate) prompt_regex: Option<Regex>,
    pub(crate) mode: SessionMode,
    pub(crate) last_prompt: String,
    open: bool,
}

impl Connection {
    pub(crate) fn new(
        channel: Channel,
        dialect: Dialect,
        timing: TimingPolicy,
        credentials: Credentials,
    ) -> Result<Self> {
        let patterns = DialectPatterns::compile(&dialect.capabilities)?;
        Ok(Self {
            channel,
            dialect,
            patterns,
            timing,
            credentials,
            base_prompt: String::new(),
            prompt_regex: None,
            mode: SessionMode::User,
            last_prompt: String::new(),
            open: true,
        })
    }

    /// Dialect registry key.
    pub fn device_type(&self) -> &str {
        &self.dialect.name
    }

    /// The resolved capability record.
    pub fn capabilities(&self) -> &DialectCapabilities {
        &self.dialect.capabilities
    }

    /// Timing settings of this connection.
    pub fn timing(&self) -> &TimingPolicy {
        &self.timing
    }

    /// Mutable timing settings.
    pub fn timing_mut(&mut self) -> &mut TimingPolicy {
        &mut self.timing
    }

    /// Prompt with its terminator and mode suffix removed.
    pub fn base_prompt(&self) -> &str {
        &self.base_prompt
    }

    /// Tracked CLI mode, updated by every prompt read.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Most recent prompt seen.
    pub fn prompt(&self) -> &str {
        &self.last_prompt
    }

    /// Whether `disconnect` has not been called yet.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether the underlying transport is still alive.
    pub fn is_alive(&self) -> bool {
        self.open && self.channel.is_alive()
    }

    /// Direct access to the read engine.
    pub fn channel_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(DriverError::NotConnected.into())
        }
    }

    /// Pattern matching the full prompt, falling back to any terminated line.
    pub(crate) fn prompt_regex(&self) -> Regex {
        self.prompt_regex
            .clone()
            .unwrap_or_else(|| self.patterns.terminator.clone())
    }

    pub(crate) fn set_prompt_regex(&mut self, base_prompt: &str) -> Result<()> {
        self.prompt_regex = Some(prompt_pattern(base_prompt, &self.dialect.capabilities.prompt_terminators)?);
        Ok(())
    }

    /// Enable secret, falling back to the login password.
    pub(crate) fn enable_secret(&self) -> String {
        self.credentials
            .secret
            .as_ref()
            .or(self.credentials.password.as_ref())
            .map(|s| s.expose_secret().to_string())
            .unwrap_or_default()
    }

    /// Prepare a fresh session for commands.
    ///
    /// Waits for a prompt, runs the dialect's login strategy, captures the
    /// base prompt, then disables paging and widens the terminal.
    pub async fn session_preparation(&mut self) -> Result<()> {
        self.test_channel_read().await?;

        if self.dialect.strategy == SessionStrategy::JunosCli {
            self.enter_junos_cli().await?;
        }

        self.set_base_prompt().await?;

        let caps = &self.dialect.capabilities;
        let setup: Vec<String> = caps
            .paging_disable_cmd
            .iter()
            .chain(caps.terminal_width_cmd.iter())
            .cloned()
            .collect();
        for command in setup {
            self.set_terminal(&command).await?;
        }

        self.channel.clear_buffer().await?;
        let prompt = self.find_prompt().await?;
        info!("session ready on {} (prompt {:?}, mode {})", self.dialect.name, prompt, self.mode);
        Ok(())
    }

    /// Wait until the device shows any prompt, nudging it with newlines.
    async fn test_channel_read(&mut self) -> Result<()> {
        let wait = self.timing.scaled(Duration::from_secs(2));
        for attempt in 0..PROMPT_ATTEMPTS {
            match self.channel.read_until_pattern(&self.patterns.terminator, wait).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_read_timeout() => {
                    debug!("no prompt yet (attempt {}), sending newline", attempt + 1);
                    self.channel.write_channel(RETURN).await?;
                }
                Err(e) => return Err(e),
            }
        }
        Err(DriverError::PromptNotFound.into())
    }

    /// Leave the Junos FreeBSD shell if the login landed there.
    async fn enter_junos_cli(&mut self) -> Result<()> {
        let prompt = self.find_prompt().await?;
        if prompt.ends_with('%') {
            debug!("in junos shell, starting cli");
            self.channel.write_channel(&normalize_command("cli")).await?;
            let wait = self.timing.scaled(Duration::from_secs(5));
            let cli_prompt = compile(r">[ \t\r]*$")?;
            self.channel.read_until_pattern(&cli_prompt, wait).await?;
        }
        Ok(())
    }

    /// Send a terminal setup command and wait for the prompt.
    async fn set_terminal(&mut self, command: &str) -> Result<()> {
        debug!("terminal setup: {}", command);
        self.channel.write_channel(&normalize_command(command)).await?;
        let prompt = self.prompt_regex();
        self.channel.read_until_pattern(&prompt, self.timing.read_timeout).await?;
        Ok(())
    }

    /// Username/password dialog for transports without built-in auth.
    pub(crate) async fn telnet_login(&mut self) -> Result<()> {
        let username = compile(r"(?i)(user(name)?|login)\s*:\s*$")?;
        let password = compile(r"(?i)pass(word|code)?\s*:\s*$")?;
        let failure = compile(r"(?i)(login invalid|login incorrect|authentication failed|access denied)")?;
        let prompt = &self.patterns.terminator;
        let combined = compile(&format!(
            "(?:{})|(?:{})|(?:{})|(?:{})",
            failure.as_str(),
            username.as_str(),
            password.as_str(),
            prompt.as_str()
        ))?;

        let wait = self.timing.scaled(Duration::from_secs(5));
        for _ in 0..LOGIN_ROUNDS {
            let matched = match self.channel.read_until_pattern(&combined, wait).await {
                Ok(result) => result.matched.unwrap_or_default(),
                Err(e) if e.is_read_timeout() => {
                    self.channel.write_channel(RETURN).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let matched = matched.as_bytes();
            if failure.is_match(matched) {
                return Err(TransportError::AuthenticationFailed {
                    user: self.credentials.username.clone(),
                }
                .into());
            } else if username.is_match(matched) {
                let line = normalize_command(&self.credentials.username);
                self.channel.write_channel(&line).await?;
            } else if password.is_match(matched) {
                let secret = self
                    .credentials
                    .password
                    .as_ref()
                    .map(|p| p.expose_secret().to_string())
                    .unwrap_or_default();
                self.channel.write_hidden(&format!("{}{}", secret, RETURN)).await?;
            } else {
                debug!("telnet login complete");
                // fresh prompt for session preparation
                self.channel.write_channel(RETURN).await?;
                return Ok(());
            }
        }

        Err(TransportError::AuthenticationFailed {
            user: self.credentials.username.clone(),
        }
        .into())
    }

    /// Best-effort graceful exit, then close the transport.
    ///
    /// Cleanup errors are logged; only the close error is returned.
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        if let Err(e) = self.cleanup().await {
            warn!("cleanup before disconnect failed: {}", e);
        }
        self.open = false;
        debug!("closing connection to {}", self.dialect.name);
        self.channel.close().await
    }

    async fn cleanup(&mut self) -> Result<()> {
        if self.mode == SessionMode::Config {
            self.exit_config_mode().await?;
        }
        if let Some(exit) = self.dialect.capabilities.exit_command.clone() {
            self.channel.write_channel(&normalize_command(&exit)).await?;
            tokio::time::sleep(self.timing.scaled(Duration::from_millis(100))).await;
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.open {
            warn!(
                "Connection to {} dropped without disconnect(); the session was not closed gracefully",
                self.dialect.name
            );
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("device_type", &self.dialect.name)
            .field("base_prompt", &self.base_prompt)
            .field("mode", &self.mode)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}
