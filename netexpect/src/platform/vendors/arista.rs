//! Arista EOS dialect.
//!
//! ```text
//! switch>                            # exec mode
//! switch#                            # privileged exec
//! switch(config)#                    # configuration mode
//! switch(config-if-Et1)#             # config sub-mode (interface)
//! ```

use crate::platform::{DialectCapabilities, TransferProfile};

/// Arista EOS.
pub fn eos() -> DialectCapabilities {
    DialectCapabilities::new(">#")
        .with_enable("enable", "disable")
        .with_config("configure terminal", "end", r"\)#")
        .with_paging_disable("terminal length 0")
        .with_terminal_width("terminal width 32767")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Error")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("% Unavailable command")
        .with_save_config("write memory", None)
        .with_transfer(TransferProfile::cisco("flash:"))
}
