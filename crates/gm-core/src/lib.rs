//! gm-core: Status store, derived views and configuration
//!
//! This crate holds the canonical mirror of the machine state and the
//! pieces shared by every consumer of it: configuration, error types and
//! the process view used by control surfaces.

pub mod config;
pub mod error;
pub mod process;
pub mod store;
pub mod types;

pub use error::{CommandError, ConfigError, ConnectionError, GmError};
pub use process::{ProcessProgress, ProcessState};
pub use store::{MachineStatus, Snapshot, StatusStore, StatusView};
pub use types::ConnectionStatus;
