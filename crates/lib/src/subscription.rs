//! Socket.IO subscription: binds the dispatcher table to a `rust_socketio` client.
//!
//! Events are handed to the dispatcher by the client's receive task, one at a
//! time in arrival order. `close` and `error` are reported back to the relay so
//! it can tear the connection down.

use crate::dispatch::Dispatcher;
use crate::error::RelayError;
use crate::events::{self, EventKind};
use crate::forward::Forwarder;
use futures_util::FutureExt;
use rust_socketio::asynchronous::{Client, ClientBuilder};
use rust_socketio::{Event, Payload, TransportType};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Why a subscription stopped delivering events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEnd {
    Closed,
    Failed(String),
}

/// Socket.IO endpoint for a server mounted under `path`:
/// `https://host/` + `masterprompt` -> `https://host/masterprompt/socket.io/`.
pub fn socket_url(server_url: &str, path: &str) -> Result<String, RelayError> {
    let base = server_url.trim().trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = base.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else if base.starts_with("http://") || base.starts_with("https://") {
        base.to_string()
    } else {
        return Err(RelayError::Connection(format!(
            "unsupported server url (expected http, https, ws or wss): {}",
            server_url
        )));
    };
    let path = path.trim().trim_matches('/');
    if path.is_empty() {
        Ok(format!("{}/socket.io/", base))
    } else {
        Ok(format!("{}/{}/socket.io/", base, path))
    }
}

pub struct Subscription {
    client: Client,
    ended: mpsc::UnboundedReceiver<LinkEnd>,
}

impl Subscription {
    /// Connect over WebSocket and register one handler per bound event.
    /// The client's own reconnect is off; the relay decides whether to retry.
    pub async fn open(
        url: &str,
        dispatcher: Arc<Dispatcher>,
        forwarder: Arc<Forwarder>,
    ) -> Result<Self, RelayError> {
        let (end_tx, ended) = mpsc::unbounded_channel();

        let mut builder = ClientBuilder::new(url)
            .namespace("/")
            .transport_type(TransportType::Websocket)
            .reconnect(false);

        for kind in EventKind::FORWARDED {
            let dispatcher = dispatcher.clone();
            let forwarder = forwarder.clone();
            builder = builder.on(kind.name(), move |payload: Payload, _: Client| {
                let dispatcher = dispatcher.clone();
                let forwarder = forwarder.clone();
                async move {
                    dispatcher
                        .dispatch(kind.name(), &first_arg(payload), forwarder.as_ref())
                        .await;
                }
                .boxed()
            });
        }

        let on_connect = (dispatcher.clone(), forwarder.clone());
        builder = builder.on(Event::Connect, move |_: Payload, _: Client| {
            let (dispatcher, forwarder) = on_connect.clone();
            async move {
                dispatcher
                    .dispatch(EventKind::Connect.name(), &Value::Null, forwarder.as_ref())
                    .await;
            }
            .boxed()
        });

        let close_tx = end_tx.clone();
        builder = builder.on(Event::Close, move |_: Payload, _: Client| {
            let _ = close_tx.send(LinkEnd::Closed);
            async {}.boxed()
        });

        builder = builder.on(Event::Error, move |payload: Payload, _: Client| {
            let _ = end_tx.send(LinkEnd::Failed(describe(payload)));
            async {}.boxed()
        });

        let client = builder
            .connect()
            .await
            .map_err(|e| RelayError::Connection(format!("{}: {}", url, e)))?;
        Ok(Self { client, ended })
    }

    /// Resolves when the server closes the session or the client reports an error.
    pub async fn ended(&mut self) -> LinkEnd {
        self.ended.recv().await.unwrap_or(LinkEnd::Closed)
    }

    /// Leave the namespace and close the transport. Best effort; errors are only logged.
    pub async fn close(self) {
        if let Err(e) = self.client.disconnect().await {
            log::debug!("socket.io disconnect: {}", e);
        }
    }
}

/// First event argument; the prompt server always emits a single object.
fn first_arg(payload: Payload) -> Value {
    match payload {
        Payload::Text(values) => values.into_iter().next().unwrap_or(Value::Null),
        other => {
            log::debug!("ignoring non-text payload: {:?}", other);
            Value::Null
        }
    }
}

fn describe(payload: Payload) -> String {
    match payload {
        Payload::Text(values) => values
            .iter()
            .map(events::value_to_string)
            .collect::<Vec<_>>()
            .join(" "),
        other => format!("{:?}", other),
    }
}
