//! Text file upload through the IOS TCL shell.
//!
//! ```text
//! router# tclsh
//! router(tcl)# puts [open "flash:motd.txt" w+] {
//! +>banner text
//! +>}
//! router(tcl)# tclquit
//! router#
//! ```

use std::time::Duration;

use log::{debug, warn};

use crate::driver::{Connection, SendCommandOptions};
use crate::error::{Result, TransferError};

const TCL_PROMPT: &str = r"\(tcl\)#[ \t\r]*$";

/// Write `content` to `remote_path` from inside `tclsh`.
///
/// The content is sent inside a TCL brace literal, so it must be text with
/// balanced braces.
pub(crate) async fn put_inline(conn: &mut Connection, remote_path: &str, content: &[u8], timeout: Duration) -> Result<()> {
    let text = std::str::from_utf8(content).map_err(|_| TransferError::Protocol {
        message: "inline TCL transfer needs UTF-8 text".to_string(),
    })?;
    if !braces_balanced(text) {
        return Err(TransferError::Protocol {
            message: "inline TCL transfer needs balanced braces".to_string(),
        }
        .into());
    }

    conn.enable().await?;
    let tcl = SendCommandOptions::default().expect_string(TCL_PROMPT);
    conn.send_command_with("tclsh", &tcl).await?;
    debug!("tclsh started, writing {} bytes to {}", content.len(), remote_path);

    let write = format!("puts [open \"{}\" w+] {{{}}}", remote_path, text);
    let written = conn
        .send_command_with(&write, &tcl.clone().cmd_verify(false).read_timeout(timeout))
        .await;

    if let Err(e) = conn.send_command("tclquit").await {
        warn!("tclquit failed: {}", e);
    }
    written.map(|_| ())
}

fn braces_balanced(text: &str) -> bool {
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '{' => depth += 1,
            '}' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_braces_balanced() {
        assert!(braces_balanced("plain text\n"));
        assert!(braces_balanced("a {b {c}} d"));
        assert!(!braces_balanced("a { b"));
        assert!(!braces_balanced("} {"));
    }
}
