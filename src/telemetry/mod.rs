//! Observability setup for the client and CLI
//!
//! Logging goes through `tracing`; see [`logging::init_logging`].

pub mod logging;

pub use logging::{init_logging, LoggingConfig, LoggingGuard};
