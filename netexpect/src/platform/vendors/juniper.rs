//! Juniper Junos dialect.
//!
//! Junos has no enable mode; `configure` enters a candidate configuration
//! and the prompt changes from `>` to `#`:
//!
//! ```text
//! user@router>                # operational mode
//! [edit]
//! user@router#                # configuration mode
//! root@router:RE:0%           # FreeBSD shell (root login)
//! ```

use crate::platform::{ConfirmPrompt, DialectCapabilities, TransferProfile};
use crate::transfer::HashAlgorithm;

/// Juniper Junos.
pub fn junos() -> DialectCapabilities {
    let transfer = TransferProfile {
        file_system: "/var/tmp".to_string(),
        dir_command: "file list {path} detail".to_string(),
        missing_file_pattern: r"(?i)(no such file|could not resolve)".to_string(),
        file_size_pattern: r"(?m)\s(?P<size>\d+)\s+\w{3}\s+\d+\s+[\d:]+\s+\S*{file}\s*$"
            .to_string(),
        space_command: None,
        space_pattern: String::new(),
        space_multiplier: 1,
        hash_command: "file checksum md5 {path}".to_string(),
        hash_pattern: r"=\s*(?P<hash>[0-9a-fA-F]{32})".to_string(),
        hash_algorithm: HashAlgorithm::Md5,
        inline_tcl: false,
    };

    DialectCapabilities::new(">#%")
        .with_config("configure", "exit configuration-mode", r"#[ \t]*$")
        .with_config_exit_confirm(ConfirmPrompt::new(
            r"(?i)exit with uncommitted changes\?",
            "yes",
        ))
        .with_paging_disable("set cli screen-length 0")
        .with_terminal_width("set cli screen-width 511")
        .with_failure_pattern("error:")
        .with_failure_pattern("syntax error")
        .with_failure_pattern("unknown command")
        .with_transfer(transfer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_junos_has_config_without_enable() {
        let caps = junos();
        assert!(!caps.supports_enable);
        assert!(caps.supports_config);
        assert!(!caps.config_requires_enable);
        assert!(caps.is_terminator('%'));
    }

    #[test]
    fn test_config_pattern_matches_edit_prompt() {
        let caps = junos();
        let pattern = Regex::new(&caps.config_pattern).unwrap();
        assert!(pattern.is_match("user@router# "));
        assert!(!pattern.is_match("user@router>"));
    }

    #[test]
    fn test_checksum_output() {
        let transfer = junos().transfer.unwrap();
        let pattern = Regex::new(&transfer.hash_pattern).unwrap();
        let caps = pattern
            .captures("MD5 (/var/tmp/image.tgz) = 0cc175b9c0f1b6a831c399e269772661")
            .unwrap();
        assert_eq!(&caps["hash"], "0cc175b9c0f1b6a831c399e269772661");
    }
}
