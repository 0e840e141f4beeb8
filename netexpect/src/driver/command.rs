//! Command execution: single commands, configuration sets, and dialogs.

use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::Instant;

use super::connection::Connection;
use super::interactive::{InteractiveEvent, InteractiveResult, InteractiveStep};
use super::mode::SessionMode;
use super::prompt::{last_line, normalize_command, normalize_linefeeds, strip_command, strip_prompt};
use super::response::Response;
use crate::channel::{compile, echo_pattern};
use crate::error::{DriverError, Result};

/// Default hard stop of `send_command_timing`.
const TIMING_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Options of [`Connection::send_command_with`].
#[derive(Debug, Clone, PartialEq)]
pub struct SendCommandOptions {
    /// Pattern ending the read instead of the prompt.
    pub expect_string: Option<String>,

    /// Absolute read timeout; the connection default when `None`.
    pub read_timeout: Option<Duration>,

    /// Legacy delay factor. Setting it (or `max_loops`) switches the call to
    /// the legacy timeout `max_loops × delay_factor × loop_delay`.
    pub delay_factor: Option<f64>,

    /// Legacy loop bound.
    pub max_loops: Option<u32>,

    /// Remove the trailing prompt.
    pub strip_prompt: bool,

    /// Remove the echoed command.
    pub strip_command: bool,

    /// Trim the command and append the line terminator.
    pub normalize: bool,

    /// Wait for the echo of the command before looking for the prompt.
    pub cmd_verify: bool,
}

impl Default for SendCommandOptions {
    fn default() -> Self {
        Self {
            expect_string: None,
            read_timeout: None,
            delay_factor: None,
            max_loops: None,
            strip_prompt: true,
            strip_command: true,
            normalize: true,
            cmd_verify: true,
        }
    }
}

impl SendCommandOptions {
    /// End the read on `pattern` instead of the prompt.
    pub fn expect_string(mut self, pattern: impl Into<String>) -> Self {
        self.expect_string = Some(pattern.into());
        self
    }

    /// Set the absolute read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Use the legacy timeout regime.
    pub fn legacy(mut self, delay_factor: f64, max_loops: Option<u32>) -> Self {
        self.delay_factor = Some(delay_factor);
        self.max_loops = max_loops;
        self
    }

    /// Enable or disable echo verification.
    pub fn cmd_verify(mut self, enabled: bool) -> Self {
        self.cmd_verify = enabled;
        self
    }

    /// Keep output exactly as read apart from linefeed normalization.
    pub fn raw(mut self) -> Self {
        self.strip_prompt = false;
        self.strip_command = false;
        self
    }
}

/// Options of [`Connection::send_command_timing_with`].
#[derive(Debug, Clone, PartialEq)]
pub struct TimingCommandOptions {
    /// Hard stop; zero means none.
    pub read_timeout: Duration,

    /// Idle period ending the read; the connection default when `None`.
    pub last_read: Option<Duration>,

    /// Legacy delay factor, see [`SendCommandOptions::delay_factor`].
    pub delay_factor: Option<f64>,

    /// Legacy loop bound.
    pub max_loops: Option<u32>,

    /// Remove the trailing prompt.
    pub strip_prompt: bool,

    /// Remove the echoed command.
    pub strip_command: bool,

    /// Trim the command and append the line terminator.
    pub normalize: bool,

    /// Wait for the echo before timing the output.
    pub cmd_verify: bool,
}

impl Default for TimingCommandOptions {
    fn default() -> Self {
        Self {
            read_timeout: TIMING_READ_TIMEOUT,
            last_read: None,
            delay_factor: None,
            max_loops: None,
            strip_prompt: true,
            strip_command: true,
            normalize: true,
            cmd_verify: false,
        }
    }
}

impl TimingCommandOptions {
    /// Set the hard stop.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the idle period.
    pub fn last_read(mut self, idle: Duration) -> Self {
        self.last_read = Some(idle);
        self
    }
}

/// Options of [`Connection::send_config_set`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSetOptions {
    /// Enter configuration mode first.
    pub enter_config_mode: bool,

    /// Leave configuration mode after the last command.
    pub exit_config_mode: bool,

    /// Wait for the echo of each command.
    pub cmd_verify: bool,

    /// Pattern marking a command as rejected.
    pub error_pattern: Option<String>,

    /// Per-command read timeout; the connection default when `None`.
    pub read_timeout: Option<Duration>,

    /// Overrides the dialect's configuration command.
    pub config_mode_command: Option<String>,
}

impl Default for ConfigSetOptions {
    fn default() -> Self {
        Self {
            enter_config_mode: true,
            exit_config_mode: true,
            cmd_verify: true,
            error_pattern: None,
            read_timeout: None,
            config_mode_command: None,
        }
    }
}

impl ConfigSetOptions {
    /// Fail on the first command whose output matches `pattern`.
    pub fn error_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.error_pattern = Some(pattern.into());
        self
    }

    /// Stay in configuration mode afterwards.
    pub fn keep_config_mode(mut self) -> Self {
        self.exit_config_mode = false;
        self
    }
}

impl Connection {
    /// Send a command and read until the prompt.
    pub async fn send_command(&mut self, command: &str) -> Result<Response> {
        self.send_command_with(command, &SendCommandOptions::default()).await
    }

    /// Send a command and read until the prompt or `expect_string`.
    ///
    /// Failure patterns of the dialect mark the response failed; they never
    /// turn into an error.
    pub async fn send_command_with(&mut self, command: &str, opts: &SendCommandOptions) -> Result<Response> {
        self.ensure_open()?;
        let start = Instant::now();
        let timeout = self.timing.resolve(opts.read_timeout, opts.delay_factor, opts.max_loops);
        let search = match &opts.expect_string {
            Some(pattern) => compile(pattern)?,
            None => self.prompt_regex(),
        };

        debug!("send_command {:?} (timeout {:?})", command, timeout);
        let line = self.line_for(command, opts.normalize);
        self.channel.clear_buffer().await?;
        self.channel.write_channel(&line).await?;

        let mut raw = String::new();
        if opts.cmd_verify {
            raw.push_str(&self.read_echo(command, timeout).await?);
        }
        raw.push_str(&self.channel.read_until_pattern(&search, timeout).await?.output);

        Ok(self.build_response(
            command,
            raw,
            start,
            opts.strip_command,
            opts.strip_prompt,
            opts.expect_string.is_none(),
        ))
    }

    /// Send a command and read until the output goes idle.
    pub async fn send_command_timing(&mut self, command: &str) -> Result<Response> {
        self.send_command_timing_with(command, &TimingCommandOptions::default()).await
    }

    /// Send a command and read until the output goes idle, with options.
    pub async fn send_command_timing_with(
        &mut self,
        command: &str,
        opts: &TimingCommandOptions,
    ) -> Result<Response> {
        self.ensure_open()?;
        let start = Instant::now();
        let read_timeout = if opts.delay_factor.is_some() || opts.max_loops.is_some() {
            self.timing
                .legacy_timeout(opts.delay_factor.unwrap_or(1.0), opts.max_loops)
        } else {
            opts.read_timeout
        };
        let last_read = opts.last_read.unwrap_or(self.timing.last_read);

        debug!("send_command_timing {:?} (idle {:?})", command, last_read);
        let line = self.line_for(command, opts.normalize);
        self.channel.clear_buffer().await?;
        self.channel.write_channel(&line).await?;

        let mut raw = String::new();
        if opts.cmd_verify {
            let timeout = self.timing.read_timeout;
            raw.push_str(&self.read_echo(command, timeout).await?);
        }
        let result = self.channel.read_channel_timing(read_timeout, last_read).await?;
        raw.push_str(&result.output);

        let ends_in_prompt = last_line(&normalize_linefeeds(&raw))
            .is_some_and(|line| self.patterns.terminator.is_match(line.as_bytes()));
        Ok(self.build_response(
            command,
            raw,
            start,
            opts.strip_command,
            opts.strip_prompt,
            ends_in_prompt,
        ))
    }

    /// Apply configuration commands one at a time.
    ///
    /// Returns everything read. When `error_pattern` matches the output of
    /// a command, the remaining commands are not sent and the session is
    /// left in configuration mode.
    pub async fn send_config_set<S: AsRef<str>>(&mut self, commands: &[S], opts: &ConfigSetOptions) -> Result<String> {
        self.ensure_open()?;
        let timeout = opts.read_timeout.unwrap_or(self.timing.read_timeout);
        let error_pattern = opts.error_pattern.as_deref().map(compile).transpose()?;

        let mut output = String::new();
        if opts.enter_config_mode {
            output.push_str(&self.config_mode(opts.config_mode_command.as_deref()).await?);
        }

        let prompt = self.prompt_regex();
        for command in commands {
            let command = command.as_ref();
            debug!("config: {}", command);
            self.channel.write_channel(&normalize_command(command)).await?;

            let mut chunk = String::new();
            if opts.cmd_verify {
                chunk.push_str(&self.read_echo(command, timeout).await?);
            }
            chunk.push_str(&self.channel.read_until_pattern(&prompt, timeout).await?.output);
            output.push_str(&chunk);
            self.track_prompt(&chunk);

            if let Some(error) = &error_pattern
                && error.is_match(chunk.as_bytes())
            {
                warn!("configuration command {:?} rejected", command);
                return Err(DriverError::ConfigInvalid {
                    command: command.to_string(),
                    output: normalize_linefeeds(&chunk),
                }
                .into());
            }
        }

        if opts.exit_config_mode {
            output.push_str(&self.exit_config_mode().await?);
        }
        info!("applied {} configuration commands", commands.len());
        Ok(normalize_linefeeds(&output))
    }

    /// Apply the non-blank lines of a local file as configuration commands.
    pub async fn send_config_from_file(&mut self, path: impl AsRef<Path>, opts: &ConfigSetOptions) -> Result<String> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DriverError::InvalidConfig {
                message: format!("cannot read {}: {}", path.display(), e),
            })?;
        let commands: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
        self.send_config_set(&commands, opts).await
    }

    /// Run a multi-step dialog such as a `reload` confirmation.
    ///
    /// Steps run strictly in order; a step that times out aborts the
    /// dialog with the read error.
    pub async fn send_multiline(&mut self, events: &[InteractiveEvent]) -> Result<InteractiveResult> {
        self.ensure_open()?;
        let start = Instant::now();
        self.channel.clear_buffer().await?;

        let mut steps = Vec::with_capacity(events.len());
        for event in events {
            let step_start = Instant::now();
            let pattern = event.pattern.clone().unwrap_or_else(|| self.prompt_regex());
            let timeout = event.timeout.unwrap_or(self.timing.read_timeout);
            let line = normalize_command(&event.input);

            debug!("dialog step {:?}", event.display_input());
            if event.hidden {
                self.channel.write_hidden(&line).await?;
            } else {
                self.channel.write_channel(&line).await?;
            }

            let raw = self.channel.read_until_pattern(&pattern, timeout).await?.output;
            let mut output = normalize_linefeeds(&raw);
            if !event.hidden {
                output = strip_command(&event.input, &output);
            }
            let failure_message = self.failure_in(&output);
            steps.push(InteractiveStep {
                input: event.display_input().to_string(),
                output,
                raw_output: raw,
                elapsed: step_start.elapsed(),
                failure_message,
            });
        }

        if let Some(last) = steps.last() {
            self.track_prompt(&last.raw_output);
        }
        Ok(InteractiveResult::new(steps, start.elapsed()))
    }

    /// Persist the running configuration.
    ///
    /// Leaves configuration mode and enters enable mode as needed. Dialects
    /// without a save command return empty output.
    pub async fn save_config(&mut self) -> Result<String> {
        self.ensure_open()?;
        let Some(command) = self.dialect.capabilities.save_config_cmd.clone() else {
            return Ok(String::new());
        };

        let mut output = String::new();
        if self.mode == SessionMode::Config {
            output.push_str(&self.exit_config_mode().await?);
        }
        if self.dialect.capabilities.supports_enable && self.mode == SessionMode::User {
            output.push_str(&self.enable().await?);
        }

        let timeout = self.timing.read_timeout;
        let prompt = self.prompt_regex();
        self.channel.clear_buffer().await?;
        self.channel.write_channel(&normalize_command(&command)).await?;

        let mut chunk = match (
            self.patterns.save_confirm.clone(),
            self.dialect.capabilities.save_config_confirm.clone(),
        ) {
            (Some(confirm), Some(dialog)) => {
                let either = compile(&format!("(?:{})|(?:{})", confirm.as_str(), prompt.as_str()))?;
                let mut chunk = self.channel.read_until_pattern(&either, timeout).await?.output;
                if confirm.is_match(chunk.as_bytes()) {
                    debug!("answering save dialog with {:?}", dialog.response);
                    self.channel.write_channel(&normalize_command(&dialog.response)).await?;
                    chunk.push_str(&self.channel.read_until_pattern(&prompt, timeout).await?.output);
                }
                chunk
            }
            _ => self.channel.read_until_pattern(&prompt, timeout).await?.output,
        };
        self.track_prompt(&chunk);

        chunk = normalize_linefeeds(&chunk);
        output.push_str(&chunk);
        info!("configuration saved with {:?}", command);
        Ok(output)
    }

    fn line_for(&self, command: &str, normalize: bool) -> String {
        if normalize {
            normalize_command(command)
        } else {
            command.to_string()
        }
    }

    /// Read through the echo of `command`.
    async fn read_echo(&mut self, command: &str, timeout: Duration) -> Result<String> {
        let echo = echo_pattern(command)?;
        match self.channel.read_until_pattern(&echo, timeout).await {
            Ok(result) => Ok(result.output),
            Err(e) if e.is_read_timeout() => Err(DriverError::CommandEchoNotFound {
                command: command.to_string(),
            }
            .into()),
            Err(e) => Err(e),
        }
    }

    /// Reclassify the mode from the last line of `raw` when it is a prompt.
    fn track_prompt(&mut self, raw: &str) {
        let text = normalize_linefeeds(raw);
        if let Some(line) = last_line(&text)
            && self.patterns.terminator.is_match(line.as_bytes())
        {
            self.update_mode(line);
        }
    }

    fn failure_in(&self, output: &str) -> Option<String> {
        self.dialect
            .capabilities
            .failure_patterns
            .iter()
            .find(|pattern| output.contains(pattern.as_str()))
            .cloned()
    }

    fn build_response(
        &mut self,
        command: &str,
        raw: String,
        start: Instant,
        strip_echo: bool,
        strip_trailing_prompt: bool,
        track_mode: bool,
    ) -> Response {
        let text = normalize_linefeeds(&raw);
        let prompt = last_line(&text).unwrap_or_default().to_string();
        if track_mode && !prompt.is_empty() {
            self.update_mode(&prompt);
        }

        let mut result = text;
        if strip_echo {
            result = strip_command(command, &result);
        }
        if strip_trailing_prompt {
            result = strip_prompt(&result, &self.base_prompt);
        }

        Response::new(command, result, raw, prompt, start.elapsed())
            .with_failure_patterns(&self.dialect.capabilities.failure_patterns)
    }
}
