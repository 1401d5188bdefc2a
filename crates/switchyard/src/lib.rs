//! # Switchyard
//!
//! Type-indexed processors for actions and events, and a phased lifecycle for
//! the components that react to them.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐  process(payload)  ┌──────────────────────────────────────┐
//! │    caller     │───────────────────▶│ ActionProcessor / EventProcessor     │
//! └───────────────┘                    │  validators[type] → handlers[type]   │
//!                                      └──────────────────────────────────────┘
//! ┌───────────────┐   tick(dt)   ┌───────────────┐   update(dt)   ┌─────────────────────┐
//! │    Runtime    │─────────────▶│ TickScheduler │───────────────▶│ LifecycleController │──▶ components
//! └───────────────┘              └───────────────┘                └─────────────────────┘
//! ```
//!
//! - **Payloads**: plain structs; a payload may embed its parent type, and
//!   derived dispatch then also runs the callbacks registered for the parent
//! - **Action processor**: validators then handlers, stopping at the first failure
//! - **Event processor**: the same pipeline over a snapshot of the tables, so
//!   callbacks may register, unregister and dispatch while it runs
//! - **Lifecycle controller**: `Setup → Start → Update`, cleanup on dispose,
//!   cooperative cancellation during setup
//! - **Runtime**: configuration, logging and the tick loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use switchyard::prelude::*;
//!
//! #[derive(Payload)]
//! struct Damage {
//!     amount: u32,
//! }
//!
//! let actions: ActionProcessor<u32> = ActionProcessor::new();
//! actions.state_validator(|hp: &u32, damage: &Damage| *hp >= damage.amount)?;
//! actions.on_state(|hp: &mut u32, damage: &Damage| *hp -= damage.amount)?;
//!
//! let mut hp = 10;
//! assert!(actions.process_with(&mut hp, &Damage { amount: 4 })?.success);
//! assert_eq!(hp, 6);
//! ```
//!
//! ## Features
//!
//! - `macros`: `#[derive(Payload)]` and `#[derive(Component)]` (default)
//! - `toml-config`: read `switchyard.toml` (default)
//! - `yaml-config`: read `switchyard.yaml`
//! - `json-log`: JSON log output

pub use switchyard_core as core;
pub use switchyard_lifecycle as lifecycle;
pub use switchyard_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use switchyard::prelude::*;
/// ```
pub mod prelude {
    // Processors and registration
    pub use switchyard_core::{
        ActionProcessor, Apply, Dispatch, DynResult, EventProcessor, Payload, Processed, RegistrationKey, Registry,
        RegistryExt, Verdict,
    };

    // Lifecycle
    pub use switchyard_lifecycle::{
        CancelComponent, CancelListener, CleanupComponent, Component, ComponentError, ErrorDispatcher, ErrorHandler,
        LifecycleController, Phase, SetupComponent, StartComponent, TimeMode, UpdateComponent,
    };

    // Runtime
    pub use switchyard_runtime::{Runtime, TickScheduler};

    #[cfg(feature = "macros")]
    pub use switchyard_macros::{Component, Payload};

    // Logging macros
    pub use switchyard_runtime::tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
