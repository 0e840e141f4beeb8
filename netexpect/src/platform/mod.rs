//! Dialect definitions for multi-vendor support.
//!
//! A device family is described by data only: a [`DialectCapabilities`]
//! record and an optional [`SessionStrategy`] tag. Adding a dialect never
//! requires touching the session engine.

mod capabilities;
mod device_type;
mod registry;
pub mod vendors;

pub use capabilities::{ConfirmPrompt, DialectCapabilities, TransferProfile};
pub use device_type::{DeviceType, Dialect, SessionStrategy};
pub use registry::DialectRegistry;
