//! Cisco dialects.
//!
//! ```text
//! router>                  # user EXEC
//! router#                  # privileged EXEC (enable)
//! router(config)#          # configuration
//! router(config-if)#       # configuration sub-mode
//! ```

use crate::platform::{ConfirmPrompt, DialectCapabilities, TransferProfile};

const FAILURES: [&str; 4] = [
    "% Invalid input",
    "% Incomplete command",
    "% Ambiguous command",
    "% Unknown command",
];

fn ios_family(file_system: &str) -> DialectCapabilities {
    let mut caps = DialectCapabilities::new(">#")
        .with_enable("enable", "disable")
        .with_config("configure terminal", "end", r"\)#")
        .with_paging_disable("terminal length 0")
        .with_terminal_width("terminal width 511")
        .with_save_config("write mem", None)
        .with_transfer(TransferProfile::cisco(file_system));
    for failure in FAILURES {
        caps = caps.with_failure_pattern(failure);
    }
    caps
}

/// Cisco IOS.
pub fn ios() -> DialectCapabilities {
    let mut caps = ios_family("flash:");
    if let Some(profile) = caps.transfer.take() {
        caps = caps.with_transfer(profile.with_inline_tcl());
    }
    caps
}

/// Cisco IOS-XE.
pub fn xe() -> DialectCapabilities {
    ios_family("bootflash:")
}

/// Cisco NX-OS.
pub fn nxos() -> DialectCapabilities {
    let transfer = TransferProfile::cisco("bootflash:")
        .with_hash_command(
            "show file {path} md5sum",
            r"(?m)^\s*(?P<hash>[0-9a-fA-F]{32})\s*$",
        )
        .with_space_command(Some("dir {file_system}"), r"(?P<free>\d+) bytes free", 1);

    let mut caps = ios_family("bootflash:")
        .with_save_config("copy running-config startup-config", None)
        .with_transfer(transfer);
    caps.failure_patterns.push("% Invalid command".to_string());
    caps
}

/// Cisco IOS-XR: no enable mode, candidate configuration with commit.
pub fn xr() -> DialectCapabilities {
    let transfer = TransferProfile::cisco("disk0:")
        .with_hash_command(
            "show md5 file {path}",
            r"(?m)^\s*(?P<hash>[0-9a-fA-F]{32})\s*$",
        )
        .with_space_command(Some("dir {file_system}"), r"(?P<free>\d+) kbytes free", 1024);

    let mut caps = DialectCapabilities::new(">#")
        .with_config("configure terminal", "end", r"\)#")
        .with_config_exit_confirm(ConfirmPrompt::new(
            r"(?i)uncommitted changes found",
            "no",
        ))
        .with_paging_disable("terminal length 0")
        .with_terminal_width("terminal width 511")
        .with_transfer(transfer);
    for failure in FAILURES {
        caps = caps.with_failure_pattern(failure);
    }
    caps
}

/// Cisco ASA.
pub fn asa() -> DialectCapabilities {
    ios_family("disk0:").with_paging_disable("terminal pager 0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_ios_modes() {
        let caps = ios();
        assert!(caps.supports_enable);
        assert!(caps.supports_config);
        assert!(caps.config_requires_enable);
        assert_eq!(caps.enable_cmd, "enable");
        assert_eq!(caps.config_exit_cmd, "end");
        assert_eq!(caps.paging_disable_cmd.as_deref(), Some("terminal length 0"));
    }

    #[test]
    fn test_ios_config_pattern() {
        let caps = ios();
        let config = Regex::new(&caps.config_pattern).unwrap();
        assert!(config.is_match("router(config)#"));
        assert!(config.is_match("router(config-if)#"));
        assert!(!config.is_match("router#"));
    }

    #[test]
    fn test_only_ios_supports_inline_tcl() {
        assert!(ios().transfer.unwrap().inline_tcl);
        assert!(!xe().transfer.unwrap().inline_tcl);
    }

    #[test]
    fn test_xr_has_no_enable_and_confirms_exit() {
        let caps = xr();
        assert!(!caps.supports_enable);
        assert!(!caps.config_requires_enable);
        let confirm = caps.config_exit_confirm.unwrap();
        let pattern = Regex::new(&confirm.pattern).unwrap();
        assert!(pattern.is_match(
            "Uncommitted changes found, commit them before exiting(yes/no/cancel)? [cancel]:"
        ));
        assert_eq!(confirm.response, "no");
    }

    #[test]
    fn test_nxos_hash_pattern() {
        let transfer = nxos().transfer.unwrap();
        let pattern = Regex::new(&transfer.hash_pattern).unwrap();
        let caps = pattern
            .captures("d41d8cd98f00b204e9800998ecf8427e\n")
            .unwrap();
        assert_eq!(&caps["hash"], "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_asa_paging() {
        assert_eq!(asa().paging_disable_cmd.as_deref(), Some("terminal pager 0"));
    }
}
