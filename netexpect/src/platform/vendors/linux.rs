//! Linux dialect.
//!
//! Standard Linux/Unix shells with `$` (user) and `#` (root) prompts.
//! "Enable" maps to `sudo -s`; there is no configuration mode.

use crate::platform::{DialectCapabilities, TransferProfile};
use crate::transfer::HashAlgorithm;

/// Linux shell.
pub fn linux() -> DialectCapabilities {
    let transfer = TransferProfile {
        file_system: "/var/tmp".to_string(),
        dir_command: "ls -l {path}".to_string(),
        missing_file_pattern: r"(?i)no such file".to_string(),
        file_size_pattern: r"(?m)^\S+\s+\d+\s+\S+\s+\S+\s+(?P<size>\d+)\s.*{file}\s*$"
            .to_string(),
        space_command: Some("df -k {file_system}".to_string()),
        space_pattern: r"(?m)^\S+\s+\d+\s+\d+\s+(?P<free>\d+)\s+\d+%".to_string(),
        space_multiplier: 1024,
        hash_command: "md5sum {path}".to_string(),
        hash_pattern: r"(?m)^(?P<hash>[0-9a-fA-F]{32})\s".to_string(),
        hash_algorithm: HashAlgorithm::Md5,
        inline_tcl: false,
    };

    DialectCapabilities::new("$#")
        .with_enable("sudo -s", "exit")
        .with_enable_password_pattern(r"(?i)password")
        .with_prompt_refresh_on_enable()
        .with_ansi_escape_codes()
        .with_failure_pattern("command not found")
        .with_failure_pattern("Permission denied")
        .with_failure_pattern("Operation not permitted")
        .with_transfer(transfer)
}
