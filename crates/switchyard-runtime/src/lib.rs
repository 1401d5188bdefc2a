//! Switchyard Runtime - host layer for processors and lifecycle controllers.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `SwitchyardConfig`)
//! - Logging setup (`LoggingBuilder`, `init_from_config`)
//! - A tick scheduler for lifecycle controllers (`TickScheduler`)
//! - A runtime host that builds processors and controllers from the
//!   configuration and drives ticks (`Runtime`)

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod scheduler;

pub use config::{ConfigError, ConfigLoader, ConfigResult, Profile, SwitchyardConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{Runtime, RuntimeBuilder};
pub use scheduler::TickScheduler;

pub use tracing;
pub use tracing_subscriber;
