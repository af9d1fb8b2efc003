//! Connection lifecycle: subscribe, wait for the session to end, tear down.
//!
//! The relay owns the outbound socket and the dispatcher for the whole run and a
//! subscription per connection. Every exit path (shutdown signal, server close,
//! fault) disconnects before returning.

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::RelayError;
use crate::forward::Forwarder;
use crate::subscription::{self, LinkEnd, Subscription};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub struct Relay {
    config: Config,
    dispatcher: Arc<Dispatcher>,
    forwarder: Arc<Forwarder>,
}

/// How one connection ended.
enum Ended {
    Shutdown,
    ServerClosed,
    Failed(RelayError),
}

impl Relay {
    /// Bind the outbound socket and build the handler table. Fails with a transport error
    /// when the OSC destination cannot be resolved or the socket cannot be bound.
    pub async fn new(config: Config) -> Result<Self, RelayError> {
        let forwarder = Forwarder::bind(&config.forward.host, config.forward.port).await?;
        let dispatcher = Dispatcher::new(
            config.session.policy,
            config.session.id.clone(),
            config.forward.address.clone(),
        );
        Ok(Self {
            config,
            dispatcher: Arc::new(dispatcher),
            forwarder: Arc::new(forwarder),
        })
    }

    /// Run until Ctrl+C / SIGTERM, the server closes the connection, or a fault.
    pub async fn run(&self) -> Result<(), RelayError> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` completes, the server closes the connection, or a fault.
    /// With `reconnect.maxAttempts > 0`, failed connects and drops are retried after a fixed delay.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let server = &self.config.server;
        let reconnect = &self.config.reconnect;
        let url = subscription::socket_url(&server.url, &server.path)?;
        let mut attempts = 0u32;

        loop {
            let opened = tokio::select! {
                r = Subscription::open(&url, self.dispatcher.clone(), self.forwarder.clone()) => r,
                _ = &mut shutdown => return Ok(()),
            };
            let ended = match opened {
                Ok(mut sub) => {
                    attempts = 0;
                    log::info!(
                        "listening for events on {} (session {}, policy {}, forwarding to {})",
                        url,
                        self.dispatcher.session_id(),
                        self.dispatcher.policy(),
                        self.forwarder.destination()
                    );
                    let ended = tokio::select! {
                        end = sub.ended() => match end {
                            LinkEnd::Closed => Ended::ServerClosed,
                            LinkEnd::Failed(msg) => Ended::Failed(RelayError::Connection(msg)),
                        },
                        _ = &mut shutdown => Ended::Shutdown,
                    };
                    sub.close().await;
                    self.dispatcher
                        .dispatch("disconnect", &Value::Null, self.forwarder.as_ref())
                        .await;
                    ended
                }
                Err(e) => Ended::Failed(e),
            };

            let reason = match ended {
                Ended::Shutdown => {
                    log::info!("shutdown requested, relay stopped");
                    return Ok(());
                }
                Ended::ServerClosed if reconnect.max_attempts == 0 => {
                    log::info!("server closed the connection, relay stopped");
                    return Ok(());
                }
                Ended::ServerClosed => "server closed the connection".to_string(),
                Ended::Failed(e) if attempts >= reconnect.max_attempts => return Err(e),
                Ended::Failed(e) => e.to_string(),
            };

            attempts += 1;
            log::warn!(
                "{}; reconnecting in {} ms (attempt {}/{})",
                reason,
                reconnect.delay_ms,
                attempts,
                reconnect.max_attempts
            );
            if wait_or_shutdown(reconnect.delay(), shutdown.as_mut()).await {
                return Ok(());
            }
        }
    }
}

/// Sleep for `delay`; returns true if shutdown fired first.
async fn wait_or_shutdown<F>(delay: std::time::Duration, shutdown: Pin<&mut F>) -> bool
where
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown => true,
    }
}

/// Future that completes on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
