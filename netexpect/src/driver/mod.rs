//! Session layer: prompt tracking, mode transitions, and command execution.
//!
//! A [`Connection`] owns one interactive channel. All operations take
//! `&mut self` and run strictly in order.

mod builder;
mod command;
mod connection;
mod interactive;
mod mode;
mod prompt;
mod response;
mod timing;

pub use builder::{ConnectionBuilder, ConnectionParams};
pub use command::{ConfigSetOptions, SendCommandOptions, TimingCommandOptions};
pub use connection::{Connection, Credentials, RETURN};
pub use interactive::{
    InteractiveBuilder, InteractiveBuilderWithInput, InteractiveEvent, InteractiveResult, InteractiveStep,
};
pub use mode::SessionMode;
pub use prompt::{normalize_command, normalize_linefeeds, strip_backspaces, strip_command, strip_prompt};
pub use response::Response;
pub use timing::TimingPolicy;
