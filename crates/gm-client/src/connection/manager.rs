//! Connection manager
//!
//! Owns the single device connection and the event loop behind it. The loop
//! connects, requests a full status report, feeds every inbound frame into
//! the status store in arrival order, and reconnects with exponential
//! backoff when the connection drops. It is the only writer of the store.

use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use gm_core::config::ClientConfig;
use gm_core::{CommandError, ConnectionError, ConnectionStatus, StatusStore};
use gm_protocol::{ControlFrame, InboundFrame};

use super::backoff::ExponentialBackoff;
use super::link::Link;

/// How long a dropped connection gets to flush and close its sink
const WRITER_CLOSE_GRACE: Duration = Duration::from_millis(500);
use super::transport::{Connector, FrameSink, FrameStream};

/// Lifecycle notifications published by the connection loop
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A connection attempt is starting (1-based, counted per outage)
    Connecting { attempt: u32 },
    /// Connection is up and a resync has been requested
    Connected,
    /// Connection ended; a reconnect follows unless the manager was closed
    Disconnected { reason: String },
    /// A frame was decoded and applied to the store
    FrameReceived(InboundFrame),
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<StatusStore>,
}

/// Maintains one persistent connection to the device
pub struct ConnectionManager {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    link: Arc<Link>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    events_tx: broadcast::Sender<ConnectionEvent>,
    /// Parked here while no loop is running; moved into the loop otherwise
    store: Mutex<Option<StatusStore>>,
    running: Mutex<Option<RunningLoop>>,
}

impl ConnectionManager {
    /// Create a manager that will write into `store`. Nothing connects
    /// until [`connect`](Self::connect) is called.
    pub fn new(config: ClientConfig, connector: Arc<dyn Connector>, store: StatusStore) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let (events_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));

        Self {
            config,
            connector,
            link: Arc::new(Link::new()),
            status_tx: Arc::new(status_tx),
            events_tx,
            store: Mutex::new(Some(store)),
            running: Mutex::new(None),
        }
    }

    /// Start the connection loop. Does nothing if it is already running.
    ///
    /// Fails with [`ConnectionError::LoopAborted`] if an earlier loop
    /// panicked, since the status store went down with it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self) -> Result<(), ConnectionError> {
        let mut running = self.running.lock();
        if let Some(current) = running.take() {
            if !current.handle.is_finished() {
                tracing::debug!("Connection loop already running");
                *running = Some(current);
                return Ok(());
            }
            // Only a panic ends the loop without close()
            match current.handle.now_or_never() {
                Some(Ok(store)) => *self.store.lock() = Some(store),
                Some(Err(e)) => tracing::error!("Connection loop ended abnormally: {}", e),
                None => {}
            }
            self.link.detach();
            self.status_tx.send_replace(ConnectionStatus::Disconnected);
        }

        let Some(store) = self.store.lock().take() else {
            tracing::error!("Status store is gone, cannot start connection loop");
            return Err(ConnectionError::LoopAborted);
        };

        tracing::info!("Starting connection to {}", self.connector.endpoint());

        let cancel = CancellationToken::new();
        let event_loop = EventLoop {
            backoff: ExponentialBackoff::from_config(&self.config.backoff),
            connect_timeout: self.config.connect_timeout,
            connector: Arc::clone(&self.connector),
            link: Arc::clone(&self.link),
            status_tx: Arc::clone(&self.status_tx),
            events_tx: self.events_tx.clone(),
            store,
            cancel: cancel.clone(),
            has_connected: false,
        };
        let handle = tokio::spawn(event_loop.run());

        *running = Some(RunningLoop { cancel, handle });
        Ok(())
    }

    /// Stop the connection loop.
    ///
    /// Cancels a pending reconnect, closes the live connection and waits
    /// for the loop to exit. The store is left in its disconnected state and
    /// a later [`connect`](Self::connect) starts over.
    pub async fn close(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        running.cancel.cancel();
        match running.handle.await {
            Ok(store) => *self.store.lock() = Some(store),
            Err(e) => {
                tracing::error!("Connection loop ended abnormally: {}", e);
                self.link.detach();
            }
        }
        self.status_tx.send_replace(ConnectionStatus::Disconnected);
        tracing::info!("Connection closed");
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    /// Watch connection status changes
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Subscribe to lifecycle events. Slow subscribers may miss events
    /// (`RecvError::Lagged`); the status store always has the latest state.
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events_tx.subscribe()
    }

    /// Outbound handle of the live connection
    pub fn link(&self) -> Arc<Link> {
        Arc::clone(&self.link)
    }

    /// Where the manager connects to
    pub fn endpoint(&self) -> String {
        self.connector.endpoint()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}

/// State owned by the spawned loop task
struct EventLoop {
    backoff: ExponentialBackoff,
    connect_timeout: std::time::Duration,
    connector: Arc<dyn Connector>,
    link: Arc<Link>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    events_tx: broadcast::Sender<ConnectionEvent>,
    store: StatusStore,
    cancel: CancellationToken,
    has_connected: bool,
}

impl EventLoop {
    async fn run(mut self) -> StatusStore {
        let cancel = self.cancel.clone();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.set_status(if self.has_connected || attempt > 1 {
                ConnectionStatus::Reconnecting
            } else {
                ConnectionStatus::Connecting
            });
            self.emit(ConnectionEvent::Connecting { attempt });
            tracing::debug!(
                "Connecting to {} (attempt {})",
                self.connector.endpoint(),
                attempt
            );

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = tokio::time::timeout(self.connect_timeout, self.connector.connect()) => result,
            };

            let reason = match result {
                Ok(Ok((sink, stream))) => {
                    attempt = 0;
                    self.backoff.reset();
                    match self.session(sink, stream).await {
                        Some(reason) => reason,
                        None => break,
                    }
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => ConnectionError::Timeout.to_string(),
            };

            let delay = self.backoff.next_delay();
            tracing::warn!("Disconnected: {}. Reconnecting in {:?}", reason, delay);
            self.set_status(ConnectionStatus::Reconnecting);
            self.emit(ConnectionEvent::Disconnected { reason });

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.store.mark_disconnected();
        self.set_status(ConnectionStatus::Disconnected);
        self.emit(ConnectionEvent::Disconnected {
            reason: "closed".to_string(),
        });
        self.store
    }

    /// Drive one live connection. Returns why it ended, or `None` if the
    /// loop was cancelled.
    async fn session(&mut self, sink: FrameSink, mut stream: FrameStream) -> Option<String> {
        // The sink goes live before the store flips to connected, so any
        // observer that sees `connected` can also send.
        let mut writer = self.link.attach(sink);
        self.store.mark_connected();
        self.has_connected = true;
        self.set_status(ConnectionStatus::Connected);
        self.emit(ConnectionEvent::Connected);
        tracing::info!("Connected to {}", self.connector.endpoint());

        let cancel = self.cancel.clone();
        let mut writer_done = false;
        let end = match self.send_control(&ControlFrame::RequestStatus) {
            Err(e) => Some(e.to_string()),
            Ok(()) => loop {
                let step = tokio::select! {
                    _ = cancel.cancelled() => Step::Cancelled,
                    written = &mut writer => Step::WriterEnded(written),
                    next = stream.next() => Step::Inbound(next),
                };

                match step {
                    Step::Cancelled => break None,
                    Step::WriterEnded(written) => {
                        writer_done = true;
                        break Some(writer_end_reason(written));
                    }
                    Step::Inbound(Some(Ok(text))) => self.handle_frame(&text),
                    Step::Inbound(Some(Err(e))) => break Some(e.to_string()),
                    Step::Inbound(None) => break Some(ConnectionError::Closed.to_string()),
                }
            },
        };

        self.link.detach();
        if !writer_done {
            match tokio::time::timeout(WRITER_CLOSE_GRACE, &mut writer).await {
                Ok(Ok(Err(e))) => tracing::debug!("Error closing connection: {}", e),
                Ok(_) => {}
                Err(_) => {
                    tracing::debug!("Connection did not close within {:?}", WRITER_CLOSE_GRACE);
                    writer.abort();
                }
            }
        }
        self.store.mark_disconnected();

        end
    }

    /// Decode and apply one inbound frame. Malformed frames are logged and
    /// dropped.
    fn handle_frame(&mut self, text: &str) {
        let frame = match gm_protocol::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Dropping malformed frame: {}", e);
                return;
            }
        };

        tracing::trace!("Received {}", frame.tp());

        if let InboundFrame::Ping { ts } = &frame {
            if let Err(e) = self.send_control(&ControlFrame::Pong { ts: *ts }) {
                tracing::warn!("Could not answer ping: {}", e);
            }
        }

        if self.store.apply(&frame) {
            tracing::debug!("Applied {}", frame.tp());
        }
        self.emit(ConnectionEvent::FrameReceived(frame));
    }

    fn send_control(&self, frame: &ControlFrame) -> Result<(), CommandError> {
        let text = gm_protocol::encode_control(frame)?;
        self.link.try_send(text)
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status_tx.send_replace(status);
    }

    fn emit(&self, event: ConnectionEvent) {
        // No subscribers is fine
        let _ = self.events_tx.send(event);
    }
}

/// What woke the session up
enum Step {
    Cancelled,
    WriterEnded(Result<Result<(), ConnectionError>, JoinError>),
    Inbound(Option<Result<String, ConnectionError>>),
}

fn writer_end_reason(written: Result<Result<(), ConnectionError>, JoinError>) -> String {
    match written {
        Ok(Ok(())) => ConnectionError::Closed.to_string(),
        Ok(Err(e)) => e.to_string(),
        Err(e) => format!("writer task failed: {}", e),
    }
}
