//! Tracing initialization shared by hosts embedding the viaduct relayer.
pub mod logging;

pub use logging::{init, LogConfig, LogFormat, LogOutput};
