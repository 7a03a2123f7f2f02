//! Reactive status store
//!
//! Holds the canonical mirror of the machine state. The store is split in
//! two halves:
//!
//! - [`StatusStore`] is the single writer. It is not `Clone`, and its
//!   mutating methods take `&mut self`, so exactly one owner (the connection
//!   event loop) can apply frames.
//! - [`StatusView`] is a cheap, cloneable read handle for any number of
//!   consumers.
//!
//! Both sit on a `tokio::sync::watch` channel. A merge runs entirely under
//! the channel's write lock, so a reader sees either the previous snapshot or
//! the new one, never a half-applied merge. Subscribers may coalesce rapid
//! updates but always observe the latest value.

use gm_protocol::{
    BrewTarget, Capabilities, InboundFrame, Mode, ProcessField, ProcessInfo, StatusUpdate,
};
use serde::Serialize;
use tokio::sync::watch;

use crate::process::ProcessState;

/// Machine telemetry as last reported by the device
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// Boiler temperature (°C)
    pub current_temperature: f64,
    /// Target temperature (°C)
    pub target_temperature: f64,
    /// Pressure (bar)
    pub current_pressure: f64,
    /// Target pressure (bar)
    pub target_pressure: f64,
    /// Pump flow (ml/s)
    pub current_flow: f64,
    /// Scale weight (g), if a scale is reporting
    pub current_weight: Option<f64>,
    /// Label of the selected profile
    pub selected_profile: Option<String>,
    /// Operating mode
    pub mode: Mode,
    /// Brew stop condition
    pub brew_target: BrewTarget,
    /// Whether a weight-based target can be used
    pub volumetric_available: bool,
    /// Running or most recently finished process
    pub process: Option<ProcessInfo>,
}

/// The store's value at a point in time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    /// A transport connection is live
    pub connected: bool,
    /// Connected, but the first full report has not arrived yet. Values are
    /// placeholders until it does.
    pub resync_pending: bool,
    /// Machine telemetry
    pub status: MachineStatus,
    /// Connection-scoped capability flags
    pub capabilities: Capabilities,
}

impl Snapshot {
    /// Derived control-surface state of the process
    pub fn process_state(&self) -> ProcessState {
        ProcessState::from_process(self.status.process.as_ref())
    }

    /// Whether values reflect the device rather than placeholders
    pub fn is_live(&self) -> bool {
        self.connected && !self.resync_pending
    }
}

/// Create a store and its first read handle
pub fn channel() -> (StatusStore, StatusView) {
    let (tx, rx) = watch::channel(Snapshot::default());
    (StatusStore { tx }, StatusView { rx })
}

/// Write half of the store
#[derive(Debug)]
pub struct StatusStore {
    tx: watch::Sender<Snapshot>,
}

impl StatusStore {
    /// Another read handle onto this store
    pub fn view(&self) -> StatusView {
        StatusView {
            rx: self.tx.subscribe(),
        }
    }

    /// Current value
    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    /// A connection came up. Values stay as placeholders until the first
    /// full report replaces them.
    pub fn mark_connected(&mut self) {
        self.tx.send_modify(|snap| {
            *snap = Snapshot {
                connected: true,
                resync_pending: true,
                ..Snapshot::default()
            };
        });
    }

    /// The transport failed or was closed. Reset to connection-lost
    /// defaults, capabilities included.
    pub fn mark_disconnected(&mut self) {
        self.tx.send_modify(|snap| *snap = Snapshot::default());
    }

    /// Apply a decoded frame. Returns `true` if the snapshot changed.
    pub fn apply(&mut self, frame: &InboundFrame) -> bool {
        match frame {
            InboundFrame::Status(update) => {
                self.apply_status(update.clone());
                true
            }
            InboundFrame::Delta(update) => self.merge(update.clone()),
            InboundFrame::Ping { .. } | InboundFrame::Other { .. } => false,
        }
    }

    /// Apply a full status report.
    ///
    /// The first report after a (re)connect replaces the snapshot wholesale
    /// so nothing from the previous session survives.
    pub fn apply_status(&mut self, update: StatusUpdate) {
        self.tx.send_modify(|snap| {
            if snap.resync_pending {
                tracing::debug!("Resync snapshot received, replacing state");
                *snap = Snapshot {
                    connected: true,
                    resync_pending: false,
                    ..Snapshot::default()
                };
            }
            merge_into(snap, update);
        });
    }

    /// Merge a partial update. Dropped while a resync is pending, since a
    /// delta cannot be trusted without the full report it is relative to.
    pub fn merge(&mut self, update: StatusUpdate) -> bool {
        if self.tx.borrow().resync_pending {
            tracing::debug!("Dropping delta received before resync snapshot");
            return false;
        }
        self.tx.send_modify(|snap| merge_into(snap, update));
        true
    }
}

/// Scalars are merged key by key; `process` is replaced as a whole.
fn merge_into(snap: &mut Snapshot, update: StatusUpdate) {
    let status = &mut snap.status;

    if let Some(v) = update.current_temperature {
        status.current_temperature = v;
    }
    if let Some(v) = update.target_temperature {
        status.target_temperature = v;
    }
    if let Some(v) = update.current_pressure {
        status.current_pressure = v;
    }
    if let Some(v) = update.target_pressure {
        status.target_pressure = v;
    }
    if let Some(v) = update.current_flow {
        status.current_flow = v;
    }
    if let Some(v) = update.current_weight {
        status.current_weight = Some(v);
    }
    if let Some(v) = update.selected_profile {
        status.selected_profile = Some(v);
    }
    if let Some(v) = update.mode {
        status.mode = v;
    }
    if let Some(v) = update.brew_target {
        status.brew_target = v;
    }
    if let Some(v) = update.volumetric_available {
        status.volumetric_available = v;
    }

    match update.process {
        ProcessField::Unchanged => {}
        ProcessField::Cleared => status.process = None,
        ProcessField::Set(next) => status.process = Some(next),
    }

    update.capabilities.apply_to(&mut snap.capabilities);
}

/// Read half of the store
#[derive(Debug, Clone)]
pub struct StatusView {
    rx: watch::Receiver<Snapshot>,
}

impl StatusView {
    /// Copy of the current snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.rx.borrow().clone()
    }

    /// Borrow the current snapshot without copying. Hold the guard briefly:
    /// the writer waits for it.
    pub fn borrow(&self) -> watch::Ref<'_, Snapshot> {
        self.rx.borrow()
    }

    /// Wait until the snapshot changes, returning the new value. Returns
    /// `None` once the writer is gone.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the snapshot satisfies `predicate`
    pub async fn wait_for(&mut self, predicate: impl FnMut(&Snapshot) -> bool) -> Option<Snapshot> {
        self.rx.wait_for(predicate).await.ok().map(|snap| snap.clone())
    }

    /// Independent receiver for consumers that want raw watch semantics
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.rx.clone()
    }
}
