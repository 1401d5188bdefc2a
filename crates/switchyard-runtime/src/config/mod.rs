//! Configuration for the Switchyard runtime.
//!
//! Layered loading with figment, the configuration schema and its validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LifecycleConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, ProcessorConfig, SpanEventConfig,
    SwitchyardConfig,
};
pub use validation::validate_config;
