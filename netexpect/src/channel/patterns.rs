//! Pattern compilation for prompt detection.
//!
//! All patterns are byte regexes compiled in multi-line mode, so `$` and `^`
//! refer to line boundaries inside the accumulated output.

use regex::bytes::{Regex, RegexBuilder};

use crate::error::Result;
use crate::platform::DialectCapabilities;

/// Compile a user or dialect pattern in multi-line mode.
pub fn compile(pattern: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern).multi_line(true).build()?)
}

/// Pattern matching any line that ends in one of the prompt terminators.
pub fn terminator_pattern(terminators: &str) -> Result<Regex> {
    compile(&format!(r"[{}][ \t\r]*$", escape_class(terminators)))
}

/// Pattern matching a full prompt line starting with `base_prompt`.
///
/// Whatever sits between the base prompt and the terminator (a config-mode
/// suffix such as `(config-if)`) is accepted.
pub fn prompt_pattern(base_prompt: &str, terminators: &str) -> Result<Regex> {
    compile(&format!(
        r"{}[^\r\n]*[{}][ \t\r]*$",
        regex::escape(base_prompt),
        escape_class(terminators)
    ))
}

/// Pattern matching the echo of `command` on the line it was typed on.
pub fn echo_pattern(command: &str) -> Result<Regex> {
    compile(&regex::escape(command.trim_end_matches(['\r', '\n'])))
}

fn escape_class(chars: &str) -> String {
    chars
        .chars()
        .map(|c| match c {
            '\\' | ']' | '[' | '^' | '-' | '&' | '~' => format!("\\{c}"),
            _ => c.to_string(),
        })
        .collect()
}

/// Dialect patterns compiled once per connection.
#[derive(Debug, Clone)]
pub struct DialectPatterns {
    /// Any prompt-terminated line.
    pub terminator: Regex,

    /// Prompt shape while in enable mode.
    pub enable_prompt: Regex,

    /// Secret prompt raised by the enable command.
    pub enable_password: Regex,

    /// Prompt shape while in configuration mode.
    pub config: Regex,

    /// Uncommitted-changes dialog on config exit.
    pub config_exit_confirm: Option<Regex>,

    /// Dialog raised by the save command.
    pub save_confirm: Option<Regex>,
}

impl DialectPatterns {
    /// Compile every pattern of a capability record.
    pub fn compile(caps: &DialectCapabilities) -> Result<Self> {
        Ok(Self {
            terminator: terminator_pattern(&caps.prompt_terminators)?,
            enable_prompt: compile(&caps.enable_prompt_pattern)?,
            enable_password: compile(&caps.enable_password_pattern)?,
            config: compile(&caps.config_pattern)?,
            config_exit_confirm: caps
                .config_exit_confirm
                .as_ref()
                .map(|c| compile(&c.pattern))
                .transpose()?,
            save_confirm: caps
                .save_config_confirm
                .as_ref()
                .map(|c| compile(&c.pattern))
                .transpose()?,
        })
    }
}
