//! Channel layer: the polling read engine over a transport.
//!
//! Output is accumulated in a [`PatternBuffer`], optionally stripped of ANSI
//! escape sequences, and searched with multi-line byte regexes.

mod ansi;
mod buffer;
mod engine;
mod patterns;
mod session_log;

pub use ansi::{AnsiStripper, strip_ansi_escape_codes};
pub use buffer::PatternBuffer;
pub use engine::{Channel, ReadConfig, ReadResult, ReadTermination};
pub use patterns::{DialectPatterns, compile, echo_pattern, prompt_pattern, terminator_pattern};
pub use session_log::SessionLog;
