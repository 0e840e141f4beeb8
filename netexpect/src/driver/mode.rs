//! CLI mode tracking: user, enable, and configuration mode.
//!
//! ```text
//!   User ──enable──▶ Enable ──config_mode──▶ Config
//!   User ◀─disable── Enable ◀──────end────── Config
//! ```
//!
//! Every prompt read reclassifies the mode. Dialects without an enable or
//! configuration mode turn the corresponding operations into empty
//! successes.

use std::fmt;

use log::debug;
use regex::bytes::Regex;

use super::connection::{Connection, RETURN};
use super::prompt::normalize_command;
use crate::channel::compile;
use crate::error::{DriverError, Result};

/// CLI mode of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionMode {
    /// Unprivileged exec mode.
    #[default]
    User,

    /// Privileged exec mode.
    Enable,

    /// Configuration mode.
    Config,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionMode::User => "user",
            SessionMode::Enable => "enable",
            SessionMode::Config => "config",
        };
        f.write_str(name)
    }
}

impl Connection {
    /// Classify a prompt and record the mode.
    pub(crate) fn update_mode(&mut self, prompt: &str) {
        let caps = &self.dialect.capabilities;
        let prompt = prompt.as_bytes();
        let mode = if caps.supports_config && self.patterns.config.is_match(prompt) {
            SessionMode::Config
        } else if caps.supports_enable && self.patterns.enable_prompt.is_match(prompt) {
            SessionMode::Enable
        } else {
            SessionMode::User
        };

        self.last_prompt = String::from_utf8_lossy(prompt).into_owned();
        if mode != self.mode {
            debug!("mode {} -> {}", self.mode, mode);
            self.mode = mode;
        }
    }

    /// Whether the session is in enable mode (configuration mode counts).
    pub async fn check_enable_mode(&mut self) -> Result<bool> {
        if !self.dialect.capabilities.supports_enable {
            return Ok(false);
        }
        let prompt = self.find_prompt().await?;
        Ok(self.patterns.enable_prompt.is_match(prompt.as_bytes()))
    }

    /// Enter enable mode, answering the secret prompt if one appears.
    pub async fn enable(&mut self) -> Result<String> {
        self.ensure_open()?;
        if !self.dialect.capabilities.supports_enable || self.check_enable_mode().await? {
            return Ok(String::new());
        }

        let caps = &self.dialect.capabilities;
        let command = normalize_command(&caps.enable_cmd);
        let password_or_prompt = compile(&format!(
            "(?:{})|(?:{})",
            caps.enable_password_pattern, caps.enable_prompt_pattern
        ))?;

        self.channel.write_channel(&command).await?;
        let mut output = self.read_for_transition(&password_or_prompt, "enable").await?;

        let asked_for_secret = output
            .lines()
            .last()
            .is_some_and(|tail| self.patterns.enable_password.is_match(tail.as_bytes()));
        if asked_for_secret {
            let secret = self.enable_secret();
            self.channel.write_hidden(&format!("{}{}", secret, RETURN)).await?;
            let terminator = self.patterns.terminator.clone();
            output.push_str(&self.read_for_transition(&terminator, "enable").await?);
        }

        if !self.check_enable_mode().await? {
            return Err(self.transition_failed("enable"));
        }
        self.refresh_base_prompt().await?;
        Ok(output)
    }

    /// Leave enable mode.
    pub async fn exit_enable_mode(&mut self) -> Result<String> {
        self.ensure_open()?;
        if !self.dialect.capabilities.supports_enable || !self.check_enable_mode().await? {
            return Ok(String::new());
        }

        let mut output = String::new();
        if self.mode == SessionMode::Config {
            output.push_str(&self.exit_config_mode().await?);
        }

        let command = normalize_command(&self.dialect.capabilities.exit_enable_cmd);
        self.channel.write_channel(&command).await?;
        let terminator = self.patterns.terminator.clone();
        output.push_str(&self.read_for_transition(&terminator, "user").await?);

        if self.check_enable_mode().await? {
            return Err(self.transition_failed("user"));
        }
        self.refresh_base_prompt().await?;
        Ok(output)
    }

    async fn refresh_base_prompt(&mut self) -> Result<()> {
        if self.dialect.capabilities.refresh_prompt_on_enable {
            self.set_base_prompt().await?;
        }
        Ok(())
    }

    /// Whether the session is in configuration mode.
    pub async fn check_config_mode(&mut self) -> Result<bool> {
        if !self.dialect.capabilities.supports_config {
            return Ok(false);
        }
        let prompt = self.find_prompt().await?;
        Ok(self.patterns.config.is_match(prompt.as_bytes()))
    }

    /// Enter configuration mode, entering enable mode first when required.
    ///
    /// `config_command` overrides the dialect's command (e.g.
    /// `configure exclusive`).
    pub async fn config_mode(&mut self, config_command: Option<&str>) -> Result<String> {
        self.ensure_open()?;
        if !self.dialect.capabilities.supports_config || self.check_config_mode().await? {
            return Ok(String::new());
        }

        let mut output = String::new();
        if self.dialect.capabilities.config_requires_enable && self.mode == SessionMode::User {
            output.push_str(&self.enable().await?);
        }

        let command = normalize_command(config_command.unwrap_or(&self.dialect.capabilities.config_enter_cmd));
        self.channel.write_channel(&command).await?;
        let config = self.patterns.config.clone();
        output.push_str(&self.read_for_transition(&config, "config").await?);

        if !self.check_config_mode().await? {
            return Err(self.transition_failed("config"));
        }
        Ok(output)
    }

    /// Leave configuration mode, answering an uncommitted-changes dialog.
    pub async fn exit_config_mode(&mut self) -> Result<String> {
        self.ensure_open()?;
        if !self.dialect.capabilities.supports_config || !self.check_config_mode().await? {
            return Ok(String::new());
        }

        let command = normalize_command(&self.dialect.capabilities.config_exit_cmd);
        self.channel.write_channel(&command).await?;

        let terminator = self.patterns.terminator.clone();
        let output = match (
            self.patterns.config_exit_confirm.clone(),
            self.dialect.capabilities.config_exit_confirm.clone(),
        ) {
            (Some(confirm), Some(dialog)) => {
                let either = compile(&format!("(?:{})|(?:{})", confirm.as_str(), terminator.as_str()))?;
                let mut output = self.read_for_transition(&either, "exit config").await?;
                if confirm.is_match(output.as_bytes()) {
                    debug!("answering config exit dialog with {:?}", dialog.response);
                    self.channel.write_channel(&normalize_command(&dialog.response)).await?;
                    output.push_str(&self.read_for_transition(&terminator, "exit config").await?);
                }
                output
            }
            _ => self.read_for_transition(&terminator, "exit config").await?,
        };

        if self.check_config_mode().await? {
            return Err(self.transition_failed("exit config"));
        }
        Ok(output)
    }

    /// Pattern read whose timeout is reported as a failed transition.
    async fn read_for_transition(&mut self, pattern: &Regex, target: &str) -> Result<String> {
        match self.channel.read_until_pattern(pattern, self.timing.read_timeout).await {
            Ok(result) => Ok(result.output),
            Err(e) if e.is_read_timeout() => Err(DriverError::ModeTransitionFailed {
                target: target.to_string(),
                prompt: e.partial_output().and_then(super::prompt::last_line).unwrap_or_default().to_string(),
            }
            .into()),
            Err(e) => Err(e),
        }
    }

    fn transition_failed(&self, target: &str) -> crate::Error {
        DriverError::ModeTransitionFailed {
            target: target.to_string(),
            prompt: self.last_prompt.clone(),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::testing::{FakeDevice, connection_with};

    #[tokio::test(start_paused = true)]
    async fn test_enable_and_back_to_user() {
        let device = FakeDevice::cisco();
        let mut conn = connection_with(&device, "cisco_ios").await;
        assert_eq!(conn.mode(), SessionMode::User);

        conn.enable().await.unwrap();
        assert_eq!(conn.mode(), SessionMode::Enable);
        assert!(conn.check_enable_mode().await.unwrap());

        conn.exit_enable_mode().await.unwrap();
        assert_eq!(conn.mode(), SessionMode::User);
        assert!(!conn.check_enable_mode().await.unwrap());
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sudo_shell_refreshes_base_prompt() {
        let device = FakeDevice::linux();
        let mut conn = connection_with(&device, "linux").await;
        assert_eq!(conn.base_prompt(), "user@host:~");
        assert_eq!(conn.send_command("whoami").await.unwrap().result, "user");

        conn.enable().await.unwrap();
        assert!(device.received("sudo -s"));
        assert_eq!(conn.mode(), SessionMode::Enable);
        assert_eq!(conn.base_prompt(), "root@host:/home/user");
        assert_eq!(conn.send_command("whoami").await.unwrap().result, "root");

        conn.exit_enable_mode().await.unwrap();
        assert_eq!(conn.mode(), SessionMode::User);
        assert_eq!(conn.base_prompt(), "user@host:~");
        assert_eq!(conn.send_command("whoami").await.unwrap().result, "user");
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ios_base_prompt_survives_enable() {
        let device = FakeDevice::cisco();
        let mut conn = connection_with(&device, "cisco_ios").await;

        conn.enable().await.unwrap();
        assert_eq!(conn.base_prompt(), "router");
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_is_noop_when_enabled() {
        let device = FakeDevice::cisco();
        device.set_mode_enable();
        let mut conn = connection_with(&device, "cisco_ios").await;

        assert_eq!(conn.enable().await.unwrap(), "");
        assert!(!device.received("enable"));
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_wrong_secret_fails() {
        let device = FakeDevice::cisco();
        let mut conn = connection_with(&device, "cisco_ios").await;
        conn.credentials.secret = Some("wrong".to_string().into());

        let err = conn.enable().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Driver(DriverError::ModeTransitionFailed { ref target, .. }) if target == "enable"
        ));
        assert_eq!(conn.mode(), SessionMode::User);
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_mode_enables_transitively() {
        let device = FakeDevice::cisco();
        let mut conn = connection_with(&device, "cisco_ios").await;

        conn.config_mode(None).await.unwrap();
        assert_eq!(conn.mode(), SessionMode::Config);
        assert!(device.received("enable"));
        assert!(device.received("configure terminal"));

        conn.exit_config_mode().await.unwrap();
        assert_eq!(conn.mode(), SessionMode::Enable);
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_mode_fails_without_secret() {
        let device = FakeDevice::cisco();
        let mut conn = connection_with(&device, "cisco_ios").await;
        conn.credentials.secret = None;
        conn.credentials.password = None;

        let err = conn.config_mode(None).await.unwrap_err();
        assert!(matches!(err, Error::Driver(DriverError::ModeTransitionFailed { .. })));
        assert!(!device.received("configure terminal"));
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_modes_are_empty_successes() {
        let device = FakeDevice::cisco();
        let mut conn = connection_with(&device, "generic").await;

        assert_eq!(conn.enable().await.unwrap(), "");
        assert_eq!(conn.config_mode(None).await.unwrap(), "");
        assert_eq!(conn.exit_config_mode().await.unwrap(), "");
        assert_eq!(conn.mode(), SessionMode::User);
        assert!(!device.received("enable"));
        conn.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_config_answers_uncommitted_dialog() {
        let device = FakeDevice::cisco();
        device.set_mode_enable();
        device.set_exit_confirm("Uncommitted changes found, commit them before exiting(yes/no/cancel)? [cancel]:");
        let mut conn = connection_with(&device, "cisco_xr").await;

        conn.config_mode(None).await.unwrap();
        device.stage_uncommitted();
        let output = conn.exit_config_mode().await.unwrap();
        assert!(output.contains("Uncommitted changes found"));
        assert!(device.received("no"));
        assert_ne!(conn.mode(), SessionMode::Config);
        conn.disconnect().await.unwrap();
    }
}
