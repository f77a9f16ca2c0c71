//! Webhook callback listener.
//!
//! An accept loop hands every connection to a [`ConnectionHandler`] on its own
//! task. Ordering is fixed at accept time: before the handler is spawned, the
//! loop queues a pending slot holding the peer's source port and a oneshot
//! that the handler later resolves with the parsed `success` flag. The
//! [`EventStream`] resolves slots strictly in queue order, so handlers that
//! finish out of order cannot reorder events.

pub mod payload;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::attack::core::{ConnectionEvent, EventSource};
use crate::config::ListenerConfig;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind callback listener: {0}")]
    Bind(std::io::Error),
    #[error("callback connection i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-connection strategy: consume one callback and report its `success`
/// flag.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) -> Result<bool, ListenerError>;
}

/// Reads the verifier's webhook request, parses it and acknowledges it.
#[derive(Debug, Clone, Default)]
pub struct CallbackHandler {
    config: ListenerConfig,
}

impl CallbackHandler {
    pub fn new(config: ListenerConfig) -> Self {
        Self { config }
    }

    async fn read_payload(&self, stream: &mut TcpStream) -> Result<BytesMut, ListenerError> {
        let limit = self.config.read_buffer;
        let mut buf = BytesMut::with_capacity(limit);
        let deadline = tokio::time::Instant::now() + self.config.read_timeout;

        while buf.len() < limit {
            match tokio::time::timeout_at(deadline, stream.read_buf(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(_)) => {
                    if payload::is_complete(&buf) {
                        break;
                    }
                }
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => {
                    log::debug!("callback payload incomplete after {:?}", self.config.read_timeout);
                    break;
                }
            }
        }

        buf.truncate(limit);
        Ok(buf)
    }
}

#[async_trait]
impl ConnectionHandler for CallbackHandler {
    async fn handle(
        &self,
        mut stream: TcpStream,
        peer: SocketAddr,
    ) -> Result<bool, ListenerError> {
        let data = self.read_payload(&mut stream).await?;
        let success = payload::parse_success(&data);
        log::trace!("callback from {peer}: success={success}");

        if let Err(err) = stream.write_all(payload::ACKNOWLEDGEMENT).await {
            log::debug!("failed to acknowledge callback from {peer}: {err}");
        }
        let _ = stream.shutdown().await;

        Ok(success)
    }
}

/// Event whose connection was accepted but whose payload may still be in
/// flight.
#[derive(Debug)]
struct PendingEvent {
    connection_id: i64,
    success: oneshot::Receiver<bool>,
}

/// Consumer side of the listener, yielding events in accept order.
///
/// `next_event` is cancel safe: a slot taken from the queue stays in
/// `current` until its payload resolves, so a wait abandoned by a timeout
/// resumes on the same connection next time.
#[derive(Debug)]
pub struct EventStream {
    pending: mpsc::UnboundedReceiver<PendingEvent>,
    current: Option<PendingEvent>,
}

#[async_trait]
impl EventSource for EventStream {
    async fn next_event(&mut self) -> Option<ConnectionEvent> {
        if self.current.is_none() {
            let slot = self.pending.recv().await?;
            self.current = Some(slot);
        }

        let slot = self.current.as_mut()?;
        // A handler that failed or panicked reports as a failed guess.
        let success = (&mut slot.success).await.unwrap_or(false);
        let connection_id = slot.connection_id;
        self.current = None;

        Some(ConnectionEvent::new(connection_id, success))
    }
}

/// Handle on a running accept loop; stops the loop when dropped.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// TCP acceptor for verifier callbacks.
pub struct WebhookListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: Arc<dyn ConnectionHandler>,
}

impl WebhookListener {
    pub async fn bind(
        address: impl ToSocketAddrs,
        config: ListenerConfig,
    ) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(ListenerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        Ok(Self {
            listener,
            local_addr,
            handler: Arc::new(CallbackHandler::new(config)),
        })
    }

    /// Swap the per-connection strategy.
    pub fn with_handler(mut self, handler: Arc<dyn ConnectionHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start accepting on a background task.
    pub fn spawn(self) -> (EventStream, ListenerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let local_addr = self.local_addr;
        log::info!("listening for callbacks on {local_addr}");

        let task = tokio::spawn(accept_loop(self.listener, self.handler, tx));
        (
            EventStream {
                pending: rx,
                current: None,
            },
            ListenerHandle { local_addr, task },
        )
    }
}

async fn accept_loop(
    listener: TcpListener,
    handler: Arc<dyn ConnectionHandler>,
    pending: mpsc::UnboundedSender<PendingEvent>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(connection) => connection,
            Err(err) => {
                log::warn!("failed to accept callback: {err}");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let (report, success) = oneshot::channel();
        let slot = PendingEvent {
            connection_id: i64::from(peer.port()),
            success,
        };
        if pending.send(slot).is_err() {
            log::debug!("event stream dropped, closing callback listener");
            return;
        }

        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let success = match handler.handle(stream, peer).await {
                Ok(success) => success,
                Err(err) => {
                    log::debug!("callback from {peer} failed: {err}");
                    false
                }
            };
            let _ = report.send(success);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reports success for even source ports without reading anything.
    struct ParityHandler;

    #[async_trait]
    impl ConnectionHandler for ParityHandler {
        async fn handle(
            &self,
            _stream: TcpStream,
            peer: SocketAddr,
        ) -> Result<bool, ListenerError> {
            Ok(peer.port() % 2 == 0)
        }
    }

    #[tokio::test]
    async fn custom_handler_decides_success() {
        let listener = WebhookListener::bind("127.0.0.1:0", ListenerConfig::default())
            .await
            .unwrap()
            .with_handler(Arc::new(ParityHandler));
        let addr = listener.local_addr();
        let (mut events, _handle) = listener.spawn();

        let client = TcpStream::connect(addr).await.unwrap();
        let port = client.local_addr().unwrap().port();

        let event = events.next_event().await.unwrap();
        assert_eq!(event.connection_id, i64::from(port));
        assert_eq!(event.success, port % 2 == 0);
    }

    /// Answers after a fixed delay.
    struct SlowHandler(Duration);

    #[async_trait]
    impl ConnectionHandler for SlowHandler {
        async fn handle(
            &self,
            _stream: TcpStream,
            _peer: SocketAddr,
        ) -> Result<bool, ListenerError> {
            tokio::time::sleep(self.0).await;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn abandoned_wait_keeps_its_connection() {
        let listener = WebhookListener::bind("127.0.0.1:0", ListenerConfig::default())
            .await
            .unwrap()
            .with_handler(Arc::new(SlowHandler(Duration::from_millis(300))));
        let addr = listener.local_addr();
        let (mut events, _handle) = listener.spawn();

        let first = TcpStream::connect(addr).await.unwrap();
        let first_port = first.local_addr().unwrap().port();
        assert!(
            tokio::time::timeout(Duration::from_millis(100), events.next_event())
                .await
                .is_err()
        );

        let second = TcpStream::connect(addr).await.unwrap();
        let second_port = second.local_addr().unwrap().port();

        let event = events.next_event().await.unwrap();
        assert_eq!(event.connection_id, i64::from(first_port));
        assert!(event.success);
        let event = events.next_event().await.unwrap();
        assert_eq!(event.connection_id, i64::from(second_port));
    }

    #[tokio::test]
    async fn dropping_handle_stops_accepting() {
        let listener = WebhookListener::bind("127.0.0.1:0", ListenerConfig::default())
            .await
            .unwrap();
        let (mut events, handle) = listener.spawn();
        drop(handle);

        assert_eq!(
            tokio::time::timeout(Duration::from_secs(5), events.next_event())
                .await
                .unwrap(),
            None
        );
    }
}
