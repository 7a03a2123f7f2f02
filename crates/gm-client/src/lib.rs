//! gm-client: Live client for a GaggiMate espresso controller
//!
//! The client keeps one WebSocket connection to the controller, mirrors its
//! status into a [`gm_core::StatusStore`], and sends control commands. It
//! reconnects with exponential backoff and requests a full status report on
//! every connect, so the mirror never carries values across connections.
//!
//! ```no_run
//! use gm_client::ClientContext;
//! use gm_core::config::ClientConfig;
//! use gm_protocol::Mode;
//!
//! # async fn demo() -> Result<(), gm_core::CommandError> {
//! let ctx = ClientContext::new(ClientConfig::default());
//! ctx.connect()?;
//!
//! let mut view = ctx.view();
//! view.wait_for(|s| s.is_live()).await;
//! ctx.dispatcher().change_mode(Mode::Steam).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod context;
pub mod dispatcher;

pub use connection::{ConnectionEvent, ConnectionManager, Connector, WsConnector};
pub use context::ClientContext;
pub use dispatcher::CommandDispatcher;
