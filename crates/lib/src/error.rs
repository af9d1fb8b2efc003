//! Relay error taxonomy.
//!
//! Malformed event payloads are not errors: missing or mistyped fields degrade to
//! empty strings in [`crate::events`].

use crate::forward::ForwardError;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Subscription could not be established, was refused, or dropped abnormally.
    #[error("connection error: {0}")]
    Connection(String),

    /// Outbound datagram socket could not be constructed.
    #[error("transport error: {0}")]
    Transport(#[from] ForwardError),
}
