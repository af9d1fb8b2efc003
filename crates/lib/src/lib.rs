//! Prompt relay core library: subscribes to a prompt server's Socket.IO events and
//! forwards prompt text to a local OSC listener over UDP.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod filter;
pub mod forward;
pub mod init;
pub mod osc;
pub mod relay;
pub mod subscription;

pub use error::RelayError;
pub use relay::Relay;
