//! Dialect capability records.
//!
//! A [`DialectCapabilities`] value is pure data: the handful of literal
//! commands and regex fragments a device family needs. The session engine
//! consults these fields and never branches on the family name.

use crate::transfer::HashAlgorithm;

/// A prompt that must be answered before a command completes.
///
/// Used for "exit with uncommitted changes?" and save confirmations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    /// Regex matched against the device output.
    pub pattern: String,

    /// Text sent when the pattern is seen.
    pub response: String,
}

impl ConfirmPrompt {
    /// Create a confirm prompt.
    pub fn new(pattern: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            response: response.into(),
        }
    }
}

/// Literal commands and patterns used by the file-transfer engine.
///
/// Command templates understand three placeholders: `{path}` (the full
/// remote path), `{file}` (bare file name) and `{file_system}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferProfile {
    /// Default remote file system or directory (e.g. `flash:`, `/var/tmp`).
    pub file_system: String,

    /// Directory listing command used to check existence and size.
    pub dir_command: String,

    /// Output pattern meaning the listed file is absent.
    pub missing_file_pattern: String,

    /// Pattern extracting the `size` group from a listing; `{file}` is
    /// replaced by the escaped file name.
    pub file_size_pattern: String,

    /// Free-space command, `None` if the dialect has no usable one.
    pub space_command: Option<String>,

    /// Pattern extracting the `free` group from the free-space output.
    pub space_pattern: String,

    /// Multiplier turning the parsed free-space value into bytes.
    pub space_multiplier: u64,

    /// Command printing the on-device digest of `{path}`.
    pub hash_command: String,

    /// Pattern extracting the `hash` group from the digest output.
    pub hash_pattern: String,

    /// Algorithm the device computes.
    pub hash_algorithm: HashAlgorithm,

    /// Whether text files can be pasted through an on-box TCL shell.
    pub inline_tcl: bool,
}

impl TransferProfile {
    /// Profile shared by IOS-like file systems (`dir`, `verify /md5`).
    pub fn cisco(file_system: impl Into<String>) -> Self {
        Self {
            file_system: file_system.into(),
            dir_command: "dir {path}".to_string(),
            missing_file_pattern: r"(?i)(no such file|error opening|not found)".to_string(),
            file_size_pattern: r"(?m)^\s*\d+\s+\S+\s+(?P<size>\d+)\s.*\b{file}\s*$".to_string(),
            space_command: Some("dir {file_system}".to_string()),
            space_pattern: r"\(?(?P<free>\d+) bytes free\)?".to_string(),
            space_multiplier: 1,
            hash_command: "verify /md5 {path}".to_string(),
            hash_pattern: r"=\s*(?P<hash>[0-9a-fA-F]{32})".to_string(),
            hash_algorithm: HashAlgorithm::Md5,
            inline_tcl: false,
        }
    }

    /// Set the hash command and the pattern extracting its result.
    pub fn with_hash_command(mut self, command: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.hash_command = command.into();
        self.hash_pattern = pattern.into();
        self
    }

    /// Set the free-space command, pattern and unit multiplier.
    pub fn with_space_command(
        mut self,
        command: Option<&str>,
        pattern: impl Into<String>,
        multiplier: u64,
    ) -> Self {
        self.space_command = command.map(str::to_string);
        self.space_pattern = pattern.into();
        self.space_multiplier = multiplier;
        self
    }

    /// Allow inline TCL transfers.
    pub fn with_inline_tcl(mut self) -> Self {
        self.inline_tcl = true;
        self
    }
}

/// Capability record for one device family.
#[derive(Debug, Clone, PartialEq)]
pub struct DialectCapabilities {
    /// Characters that may terminate a prompt (e.g. `>#`).
    pub prompt_terminators: String,

    /// Whether the dialect has a privileged (enable) mode.
    pub supports_enable: bool,

    /// Command entering enable mode.
    pub enable_cmd: String,

    /// Command leaving enable mode.
    pub exit_enable_cmd: String,

    /// Pattern of the secret prompt shown after `enable_cmd`.
    pub enable_password_pattern: String,

    /// Pattern a prompt matches while in enable mode.
    pub enable_prompt_pattern: String,

    /// Whether entering or leaving enable mode changes the base prompt
    /// (e.g. `user@host:~$` becoming `root@host:/home/user#`).
    pub refresh_prompt_on_enable: bool,

    /// Whether the dialect has a configuration mode.
    pub supports_config: bool,

    /// Whether configuration mode can only be entered from enable mode.
    pub config_requires_enable: bool,

    /// Command entering configuration mode.
    pub config_enter_cmd: String,

    /// Command leaving configuration mode.
    pub config_exit_cmd: String,

    /// Pattern a prompt matches while in configuration mode.
    pub config_pattern: String,

    /// Dialog raised when leaving config mode with pending changes.
    pub config_exit_confirm: Option<ConfirmPrompt>,

    /// Command disabling output pagination, sent during session setup.
    pub paging_disable_cmd: Option<String>,

    /// Command widening the terminal, sent during session setup.
    pub terminal_width_cmd: Option<String>,

    /// Whether the device emits ANSI escape sequences that must be stripped.
    pub ansi_escape_codes: bool,

    /// Substrings marking a command's output as failed.
    pub failure_patterns: Vec<String>,

    /// Command persisting the running configuration.
    pub save_config_cmd: Option<String>,

    /// Dialog raised by `save_config_cmd`.
    pub save_config_confirm: Option<ConfirmPrompt>,

    /// Command sent on disconnect to leave the session gracefully.
    pub exit_command: Option<String>,

    /// File-transfer commands, `None` if transfers are unsupported.
    pub transfer: Option<TransferProfile>,
}

impl DialectCapabilities {
    /// Minimal record: no enable, no config, no paging.
    pub fn new(prompt_terminators: impl Into<String>) -> Self {
        Self {
            prompt_terminators: prompt_terminators.into(),
            supports_enable: false,
            enable_cmd: "enable".to_string(),
            exit_enable_cmd: "disable".to_string(),
            enable_password_pattern: r"(?i)ssword".to_string(),
            enable_prompt_pattern: r"#[ \t]*$".to_string(),
            refresh_prompt_on_enable: false,
            supports_config: false,
            config_requires_enable: false,
            config_enter_cmd: "configure terminal".to_string(),
            config_exit_cmd: "end".to_string(),
            config_pattern: r"\)#".to_string(),
            config_exit_confirm: None,
            paging_disable_cmd: None,
            terminal_width_cmd: None,
            ansi_escape_codes: false,
            failure_patterns: vec![],
            save_config_cmd: None,
            save_config_confirm: None,
            exit_command: Some("exit".to_string()),
            transfer: None,
        }
    }

    /// Enable an enable mode with the given enter/exit commands.
    pub fn with_enable(mut self, enable_cmd: impl Into<String>, exit_cmd: impl Into<String>) -> Self {
        self.supports_enable = true;
        self.enable_cmd = enable_cmd.into();
        self.exit_enable_cmd = exit_cmd.into();
        self
    }

    /// Set the secret prompt pattern for enable.
    pub fn with_enable_password_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.enable_password_pattern = pattern.into();
        self
    }

    /// Set the enable-mode prompt pattern.
    pub fn with_enable_prompt(mut self, pattern: impl Into<String>) -> Self {
        self.enable_prompt_pattern = pattern.into();
        self
    }

    /// Enable a configuration mode.
    pub fn with_config(
        mut self,
        enter_cmd: impl Into<String>,
        exit_cmd: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        self.supports_config = true;
        self.config_requires_enable = self.supports_enable;
        self.config_enter_cmd = enter_cmd.into();
        self.config_exit_cmd = exit_cmd.into();
        self.config_pattern = pattern.into();
        self
    }

    /// Set the uncommitted-changes dialog answered on config exit.
    pub fn with_config_exit_confirm(mut self, confirm: ConfirmPrompt) -> Self {
        self.config_exit_confirm = Some(confirm);
        self
    }

    /// Set the paging-disable command.
    pub fn with_paging_disable(mut self, command: impl Into<String>) -> Self {
        self.paging_disable_cmd = Some(command.into());
        self
    }

    /// Set the terminal-width command.
    pub fn with_terminal_width(mut self, command: impl Into<String>) -> Self {
        self.terminal_width_cmd = Some(command.into());
        self
    }

    /// Re-read the base prompt after every enable transition.
    pub fn with_prompt_refresh_on_enable(mut self) -> Self {
        self.refresh_prompt_on_enable = true;
        self
    }

    /// Mark the dialect as emitting ANSI escape codes.
    pub fn with_ansi_escape_codes(mut self) -> Self {
        self.ansi_escape_codes = true;
        self
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failure_patterns.push(pattern.into());
        self
    }

    /// Set the save command and optional confirmation dialog.
    pub fn with_save_config(mut self, command: impl Into<String>, confirm: Option<ConfirmPrompt>) -> Self {
        self.save_config_cmd = Some(command.into());
        self.save_config_confirm = confirm;
        self
    }

    /// Set the graceful exit command (`None` to send nothing).
    pub fn with_exit_command(mut self, command: Option<&str>) -> Self {
        self.exit_command = command.map(str::to_string);
        self
    }

    /// Set the file-transfer profile.
    pub fn with_transfer(mut self, profile: TransferProfile) -> Self {
        self.transfer = Some(profile);
        self
    }

    /// Whether `c` terminates prompts in this dialect.
    pub fn is_terminator(&self, c: char) -> bool {
        self.prompt_terminators.contains(c)
    }
}

impl Default for DialectCapabilities {
    fn default() -> Self {
        Self::new(">#$%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_record_has_no_modes() {
        let caps = DialectCapabilities::new(">#");
        assert!(!caps.supports_enable);
        assert!(!caps.supports_config);
        assert!(caps.paging_disable_cmd.is_none());
        assert!(caps.is_terminator('#'));
        assert!(!caps.is_terminator('$'));
    }

    #[test]
    fn test_config_inherits_enable_requirement() {
        let with_enable = DialectCapabilities::new(">#")
            .with_enable("enable", "disable")
            .with_config("configure terminal", "end", r"\)#");
        assert!(with_enable.config_requires_enable);

        let without_enable =
            DialectCapabilities::new(">#").with_config("configure", "exit", r"#[ \t]*$");
        assert!(!without_enable.config_requires_enable);
    }

    #[test]
    fn test_cisco_transfer_profile_templates() {
        let profile = TransferProfile::cisco("flash:");
        assert_eq!(profile.dir_command, "dir {path}");
        assert_eq!(profile.space_command.as_deref(), Some("dir {file_system}"));
        assert_eq!(profile.hash_algorithm, HashAlgorithm::Md5);
        assert!(!profile.inline_tcl);
        assert!(profile.with_inline_tcl().inline_tcl);
    }
}
