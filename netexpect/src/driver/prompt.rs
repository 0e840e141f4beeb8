//! Prompt discovery and output cleanup.

use log::debug;

use super::connection::{Connection, RETURN};
use crate::error::{DriverError, Result};

/// Convert every line ending flavor (`\r\r\n`, `\r\n`, `\n\r`, lone `\r`) to `\n`.
pub fn normalize_linefeeds(text: &str) -> String {
    if memchr::memchr(b'\r', text.as_bytes()).is_none() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        let step = match c {
            '\r' if rest.starts_with("\r\r\n") => 3,
            '\r' if rest.starts_with("\r\n") => 2,
            '\n' if rest.starts_with("\n\r") => 2,
            '\r' | '\n' => 1,
            _ => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
                continue;
            }
        };
        out.push('\n');
        rest = &rest[step..];
    }
    out
}

/// Strip trailing whitespace and append the line terminator.
pub fn normalize_command(command: &str) -> String {
    format!("{}{}", command.trim_end(), RETURN)
}

/// Remove backspace characters.
pub fn strip_backspaces(text: &str) -> String {
    text.replace('\x08', "")
}

/// Remove the echoed command from the start of the output.
///
/// The first line is dropped when it ends with the command, which covers
/// a bare echo and one prefixed by the prompt. Devices that
/// wrap long echoes with backspaces are handled by removing `\x08` first.
pub fn strip_command(command: &str, output: &str) -> String {
    let output = strip_backspaces(output);
    let command = command.trim();
    if command.is_empty() {
        return output;
    }

    match output.split_once('\n') {
        Some((first, rest)) if first.trim_end().ends_with(command) => rest.to_string(),
        None if output.trim_end().ends_with(command) => String::new(),
        _ => output,
    }
}

/// Remove the trailing prompt line(s) from command output.
///
/// A prompt line starts with the base prompt and has no whitespace after
/// it. A prompt repeated by stray newlines is removed as a whole run,
/// together with blank lines after it, so stripping twice changes nothing.
pub fn strip_prompt(output: &str, base_prompt: &str) -> String {
    if base_prompt.is_empty() {
        return output.to_string();
    }

    let lines: Vec<&str> = output.split('\n').collect();
    let mut end = lines.len();
    let mut idx = lines.len();
    while idx > 0 {
        let line = lines[idx - 1];
        if is_prompt_line(line, base_prompt) {
            end = idx - 1;
        } else if !line.trim().is_empty() {
            break;
        }
        idx -= 1;
    }

    if end == lines.len() {
        return output.to_string();
    }
    lines[..end].join("\n")
}

fn is_prompt_line(line: &str, base_prompt: &str) -> bool {
    line.trim()
        .strip_prefix(base_prompt)
        .is_some_and(|rest| !rest.is_empty() && !rest.contains(char::is_whitespace))
}

/// Last non-empty line of `text`, trimmed.
pub(crate) fn last_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|line| !line.is_empty())
}

impl Connection {
    /// Send a newline and return the prompt the device answers with.
    ///
    /// Also refreshes the tracked mode.
    pub async fn find_prompt(&mut self) -> Result<String> {
        self.ensure_open()?;
        self.channel.clear_buffer().await?;
        self.channel.write_channel(RETURN).await?;

        let result = match self
            .channel
            .read_until_pattern(&self.patterns.terminator, self.timing.read_timeout)
            .await
        {
            Ok(result) => result,
            Err(e) if e.is_read_timeout() => return Err(DriverError::PromptNotFound.into()),
            Err(e) => return Err(e),
        };

        let text = normalize_linefeeds(&strip_backspaces(&result.output));
        let prompt = last_line(&text).ok_or(DriverError::PromptNotFound)?.to_string();
        self.update_mode(&prompt);
        debug!("found prompt {:?}", prompt);
        Ok(prompt)
    }

    /// Capture the base prompt: the prompt without its terminator.
    ///
    /// For dialects with a configuration mode a `(config…)` suffix is
    /// removed as well, so the base prompt is the same in every mode.
    pub async fn set_base_prompt(&mut self) -> Result<String> {
        let prompt = self.find_prompt().await?;

        let Some(terminator) = prompt.chars().last().filter(|c| self.dialect.capabilities.is_terminator(*c)) else {
            return Err(DriverError::InvalidPrompt { prompt }.into());
        };

        let mut base = &prompt[..prompt.len() - terminator.len_utf8()];
        if self.dialect.capabilities.supports_config
            && base.ends_with(')')
            && let Some(open) = base.rfind('(')
        {
            base = &base[..open];
        }

        if base.trim().is_empty() {
            return Err(DriverError::InvalidPrompt { prompt }.into());
        }

        let base = base.to_string();
        self.set_prompt_regex(&base)?;
        debug!("base prompt {:?}", base);
        self.base_prompt = base.clone();
        Ok(base)
    }
}
