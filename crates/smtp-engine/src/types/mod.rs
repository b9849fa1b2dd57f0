//! Core SMTP types.

mod address;
mod extension;
mod reply;

pub use address::Address;
pub use extension::Extension;
pub use reply::{EnhancedCode, Reply, ReplyClass, ReplyCode};
