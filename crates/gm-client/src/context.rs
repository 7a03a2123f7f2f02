//! Client context
//!
//! Everything a consumer needs, built once and passed around explicitly:
//! the connection manager, a read handle onto the status store and the
//! command dispatcher.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use gm_core::config::ClientConfig;
use gm_core::{store, ConnectionError, ConnectionStatus, StatusView};

use crate::connection::{ConnectionEvent, ConnectionManager, Connector, WsConnector};
use crate::dispatcher::CommandDispatcher;

/// Handle bundle for one device
pub struct ClientContext {
    manager: ConnectionManager,
    view: StatusView,
    dispatcher: CommandDispatcher,
}

impl ClientContext {
    /// Context talking WebSocket to `config.device_url`
    pub fn new(config: ClientConfig) -> Self {
        let connector = WsConnector::new(config.device_url.clone());
        Self::with_connector(config, connector)
    }

    /// Context over an arbitrary transport
    pub fn with_connector(config: ClientConfig, connector: impl Connector) -> Self {
        let (store, view) = store::channel();
        let manager = ConnectionManager::new(config, Arc::new(connector), store);
        let dispatcher = CommandDispatcher::new(manager.link());

        Self {
            manager,
            view,
            dispatcher,
        }
    }

    /// Read handle onto the status store
    pub fn view(&self) -> StatusView {
        self.view.clone()
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn status(&self) -> ConnectionStatus {
        self.manager.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.manager.watch_status()
    }

    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.manager.events()
    }

    /// Start connecting (idempotent). See [`ConnectionManager::connect`].
    pub fn connect(&self) -> Result<(), ConnectionError> {
        self.manager.connect()
    }

    /// Close the connection and stop reconnecting
    pub async fn shutdown(&self) {
        self.manager.close().await;
    }
}
