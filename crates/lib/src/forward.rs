//! Datagram forwarder: one fire-and-forget OSC datagram per outbound command.

use crate::osc::OscMessage;
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Default OSC address pattern the visual engine listens on.
pub const DEFAULT_ADDRESS: &str = "/mensaje";

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("cannot resolve forward destination {0}")]
    Resolve(String),
    #[error("binding outbound udp socket: {0}")]
    Bind(std::io::Error),
    #[error("sending datagram: {0}")]
    Send(std::io::Error),
}

/// Outbound payload: a bare string, or the string paired with a session tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bare(String),
    Tagged { text: String, session: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    pub address: String,
    pub payload: Payload,
}

impl OutboundCommand {
    pub fn new(address: impl Into<String>, payload: Payload) -> Self {
        Self {
            address: address.into(),
            payload,
        }
    }

    pub fn to_osc(&self) -> OscMessage {
        let args = match &self.payload {
            Payload::Bare(text) => vec![text.clone()],
            Payload::Tagged { text, session } => vec![text.clone(), session.clone()],
        };
        OscMessage::new(self.address.clone(), args)
    }
}

/// Where dispatched commands go. Implemented by [`Forwarder`]; tests record instead.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn send(&self, command: &OutboundCommand) -> Result<(), ForwardError>;
}

/// UDP socket bound once at startup and aimed at a fixed destination.
pub struct Forwarder {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl Forwarder {
    /// Resolve `host:port` and bind an ephemeral local socket of the matching family.
    pub async fn bind(host: &str, port: u16) -> Result<Self, ForwardError> {
        let target = format!("{}:{}", host.trim(), port);
        let destination = tokio::net::lookup_host(target.as_str())
            .await
            .map_err(|e| ForwardError::Resolve(format!("{}: {}", target, e)))?
            .next()
            .ok_or_else(|| ForwardError::Resolve(target.clone()))?;
        let local = if destination.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(local).await.map_err(ForwardError::Bind)?;
        log::debug!(
            "forwarder: bound {:?}, sending to {}",
            socket.local_addr().ok(),
            destination
        );
        Ok(Self {
            socket,
            destination,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

#[async_trait]
impl CommandSink for Forwarder {
    /// One datagram, no acknowledgement. Waits for the socket to become writable.
    async fn send(&self, command: &OutboundCommand) -> Result<(), ForwardError> {
        let bytes = command.to_osc().encode();
        self.socket
            .send_to(&bytes, self.destination)
            .await
            .map(|_| ())
            .map_err(ForwardError::Send)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_payload_becomes_two_string_args() {
        let cmd = OutboundCommand::new(
            DEFAULT_ADDRESS,
            Payload::Tagged {
                text: "Hi".into(),
                session: "2".into(),
            },
        );
        assert_eq!(
            cmd.to_osc(),
            OscMessage::new("/mensaje", vec!["Hi".into(), "2".into()])
        );
    }

    #[tokio::test]
    async fn forwarder_delivers_one_datagram_per_send() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let forwarder = Forwarder::bind("127.0.0.1", port).await.unwrap();
        let cmd = OutboundCommand::new(DEFAULT_ADDRESS, Payload::Bare("Next".into()));

        // First send on a freshly bound socket must not be dropped.
        forwarder.send(&cmd).await.unwrap();
        forwarder.send(&cmd).await.unwrap();

        let expected = cmd.to_osc().encode();
        let mut buf = [0u8; 512];
        for _ in 0..2 {
            let (n, _) = tokio::time::timeout(
                std::time::Duration::from_secs(2),
                receiver.recv_from(&mut buf),
            )
            .await
            .expect("datagram arrives")
            .unwrap();
            assert_eq!(&buf[..n], expected.as_slice());
        }
    }

    #[tokio::test]
    async fn unresolvable_host_is_a_transport_error() {
        let result = Forwarder::bind("not a host name", 4800).await;
        assert!(matches!(result, Err(ForwardError::Resolve(_))));
    }
}
