//! Device connection: transport, backoff and the reconnecting event loop

mod backoff;
mod link;
mod manager;
mod transport;

pub use backoff::ExponentialBackoff;
pub use link::Link;
pub use manager::{ConnectionEvent, ConnectionManager};
pub use transport::{Connector, FrameSink, FrameStream, WsConnector};
