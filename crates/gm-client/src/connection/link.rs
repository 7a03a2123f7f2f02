//! Outbound half of the live connection

use futures::SinkExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use gm_core::{CommandError, ConnectionError};

use super::transport::FrameSink;

/// Frames that may wait for the writer of one connection
pub(crate) const OUTBOUND_QUEUE_CAPACITY: usize = 32;

/// Shared handle to the outbound queue of the current connection.
///
/// Each connection gets its own writer task that owns the sink. The event
/// loop attaches a fresh queue when a connection comes up and detaches it
/// the moment the connection ends, so a frame is either queued for the
/// connection that was live when `send` was called or rejected. Nothing is
/// buffered across connections, and no lock is held while the sink writes.
#[derive(Debug, Default)]
pub struct Link {
    tx: Mutex<Option<mpsc::Sender<String>>>,
}

impl Link {
    /// Create a link with no connection attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a writer task for `sink` and route sends to it.
    ///
    /// The task drains the queue into the sink and closes the sink once
    /// the link is detached. It ends early with the sink's error.
    pub(crate) fn attach(&self, sink: FrameSink) -> JoinHandle<Result<(), ConnectionError>> {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        *self.tx.lock() = Some(tx);
        tokio::spawn(write_frames(sink, rx))
    }

    /// Stop routing sends to the current connection. Returns whether one
    /// was attached.
    pub(crate) fn detach(&self) -> bool {
        self.tx.lock().take().is_some()
    }

    /// Queue a frame without waiting. Used by the event loop, which must
    /// never block on its own connection.
    pub(crate) fn try_send(&self, frame: String) -> Result<(), CommandError> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(CommandError::NotConnected)?;
        tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => CommandError::Transport(ConnectionError::ConnectionLost(
                "outbound queue full".to_string(),
            )),
            TrySendError::Closed(_) => CommandError::NotConnected,
        })
    }

    /// Queue one text frame for the live connection.
    ///
    /// Waits only for queue space. Fails with
    /// [`CommandError::NotConnected`] if no connection is attached or the
    /// connection ends before the frame is queued.
    pub async fn send(&self, frame: String) -> Result<(), CommandError> {
        let tx = self.tx.lock().clone().ok_or(CommandError::NotConnected)?;
        tx.send(frame)
            .await
            .map_err(|_| CommandError::NotConnected)
    }
}

async fn write_frames(
    mut sink: FrameSink,
    mut rx: mpsc::Receiver<String>,
) -> Result<(), ConnectionError> {
    while let Some(frame) = rx.recv().await {
        sink.send(frame).await?;
    }
    sink.close().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc as fmpsc;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_writer_closes_sink_on_detach() {
        let link = Link::new();
        let (tx, mut rx) = fmpsc::unbounded::<String>();
        let sink: FrameSink =
            Box::pin(tx.sink_map_err(|e| ConnectionError::ConnectionLost(e.to_string())));
        let writer = link.attach(sink);

        link.send("one".to_string()).await.unwrap();
        link.try_send("two".to_string()).unwrap();
        assert!(link.detach());
        assert!(!link.detach());

        writer.await.unwrap().unwrap();
        assert_eq!(rx.next().await.as_deref(), Some("one"));
        assert_eq!(rx.next().await.as_deref(), Some("two"));
        assert_eq!(rx.next().await, None);
    }

    #[tokio::test]
    async fn test_send_after_writer_aborted_is_not_connected() {
        let link = Link::new();
        let (tx, _rx) = fmpsc::unbounded::<String>();
        let sink: FrameSink =
            Box::pin(tx.sink_map_err(|e| ConnectionError::ConnectionLost(e.to_string())));
        let writer = link.attach(sink);
        writer.abort();
        let _ = writer.await;

        let err = link.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, CommandError::NotConnected));
        let err = link.try_send("late".to_string()).unwrap_err();
        assert!(matches!(err, CommandError::NotConnected));
    }
}
