//! Built-in dialect records.

pub mod arista;
pub mod cisco;
pub mod juniper;
pub mod linux;

use super::DialectCapabilities;

/// Dialect for unknown devices: any common terminator, no modes.
///
/// Used by autodetection collaborators that only need raw commands.
pub fn generic() -> DialectCapabilities {
    DialectCapabilities::new(">#$%")
}
