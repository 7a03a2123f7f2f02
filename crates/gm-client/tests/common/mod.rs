//! In-memory stand-in for the controller

#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{Sink, SinkExt, StreamExt};
use serde_json::Value;

use gm_client::connection::{Connector, FrameSink, FrameStream};
use gm_core::config::{BackoffConfig, ClientConfig};
use gm_core::ConnectionError;

/// Upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(2);

/// Fail the test instead of hanging
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(WAIT, fut)
        .await
        .expect("timed out waiting")
}

/// Config with fast, deterministic reconnects
pub fn test_config() -> ClientConfig {
    ClientConfig {
        device_url: "mem://device".to_string(),
        backoff: BackoffConfig {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(50),
            multiplier: 2.0,
            jitter: 0.0,
        },
        connect_timeout: Duration::from_secs(1),
        event_channel_capacity: 256,
    }
}

#[derive(Default)]
struct Shared {
    attempts: AtomicUsize,
    refuse: AtomicBool,
    /// Writes each connection accepts before it stops draining (0 = never stalls)
    stall_after: AtomicUsize,
    panic_on_connect: AtomicBool,
}

/// Connector half, handed to the client
pub struct MockConnector {
    sessions: mpsc::UnboundedSender<DeviceSession>,
    shared: Arc<Shared>,
}

/// Device half, kept by the test
pub struct MockDevice {
    sessions: mpsc::UnboundedReceiver<DeviceSession>,
    shared: Arc<Shared>,
}

/// One accepted connection, seen from the device
pub struct DeviceSession {
    /// Frames the client sent
    from_client: mpsc::UnboundedReceiver<String>,
    /// Frames for the client
    to_client: mpsc::UnboundedSender<Result<String, ConnectionError>>,
}

pub fn mock_device() -> (MockConnector, MockDevice) {
    let (tx, rx) = mpsc::unbounded();
    let shared = Arc::new(Shared::default());
    (
        MockConnector {
            sessions: tx,
            shared: Arc::clone(&shared),
        },
        MockDevice {
            sessions: rx,
            shared,
        },
    )
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<(FrameSink, FrameStream), ConnectionError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        if self.shared.panic_on_connect.load(Ordering::SeqCst) {
            panic!("device driver crashed");
        }
        if self.shared.refuse.load(Ordering::SeqCst) {
            return Err(ConnectionError::ConnectionRefused(
                "device unreachable".to_string(),
            ));
        }

        let (client_tx, from_client) = mpsc::unbounded::<String>();
        let (to_client, client_rx) = mpsc::unbounded::<Result<String, ConnectionError>>();

        self.sessions
            .unbounded_send(DeviceSession {
                from_client,
                to_client,
            })
            .map_err(|_| ConnectionError::ConnectionRefused("device gone".to_string()))?;

        let sink = client_tx.sink_map_err(|e| ConnectionError::ConnectionLost(e.to_string()));
        let sink: FrameSink = match self.shared.stall_after.load(Ordering::SeqCst) {
            0 => Box::pin(sink),
            limit => Box::pin(StallingSink {
                inner: sink,
                written: 0,
                limit,
            }),
        };
        let stream: FrameStream = Box::pin(client_rx);
        Ok((sink, stream))
    }

    fn endpoint(&self) -> String {
        "mem://device".to_string()
    }
}

impl MockDevice {
    /// Wait for the client's next connection
    pub async fn accept(&mut self) -> DeviceSession {
        within(self.sessions.next())
            .await
            .expect("connector dropped")
    }

    /// Accept a connection and consume the resync request it opens with
    pub async fn accept_resync(&mut self) -> DeviceSession {
        let mut session = self.accept().await;
        let first = session.recv().await;
        assert_eq!(first["tp"], "req:status", "first frame was {}", first);
        session
    }

    /// Whether another connection arrives within `wait`
    pub async fn accepts_within(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.sessions.next()).await.is_ok()
    }

    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Refuse (or accept again) further connection attempts
    pub fn set_refuse(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Connections opened from now on take `writes` frames, then never
    /// become ready again and never finish closing
    pub fn stall_writes_after(&self, writes: usize) {
        self.shared.stall_after.store(writes, Ordering::SeqCst);
    }

    /// Make the next connection attempt panic inside the client
    pub fn panic_on_connect(&self) {
        self.shared.panic_on_connect.store(true, Ordering::SeqCst);
    }
}

/// Sink that stops accepting frames after `limit` writes
struct StallingSink<S> {
    inner: S,
    written: usize,
    limit: usize,
}

impl<S> Sink<String> for StallingSink<S>
where
    S: Sink<String, Error = ConnectionError> + Unpin,
{
    type Error = ConnectionError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.written >= self.limit {
            return Poll::Pending;
        }
        Pin::new(&mut self.inner).poll_ready(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
        self.written += 1;
        Pin::new(&mut self.inner).start_send(item)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Pending
    }
}

impl DeviceSession {
    /// Next frame from the client, parsed
    pub async fn recv(&mut self) -> Value {
        let text = within(self.from_client.next())
            .await
            .expect("client closed the connection");
        serde_json::from_str(&text).expect("client sent invalid JSON")
    }

    pub fn send(&self, frame: Value) {
        self.send_raw(&frame.to_string());
    }

    pub fn send_raw(&self, text: &str) {
        self.to_client
            .unbounded_send(Ok(text.to_string()))
            .expect("client stream dropped");
    }

    /// Drop the connection from the device side
    pub fn hang_up(self) {
        drop(self);
    }
}
