//! # Switchyard Lifecycle
//!
//! A [`LifecycleController`] drives pluggable components through ordered
//! phases:
//!
//! ```text
//! Stopped ──start()──▶ Setup ──▶ Start ──▶ Update
//!    ▲                   │                   │
//!    └── cancel() ok ────┘                   ▼
//!                              dispose() / error ──▶ Cleanup
//! ```
//!
//! Components declare the roles they play ([`SetupComponent`],
//! [`UpdateComponent`], [`CleanupComponent`], ...) and expose them through
//! [`Component`], usually via `#[derive(Component)]`.
//!
//! The controller is ticked either by its owner calling
//! [`LifecycleController::update`] or by a [`Scheduler`] it registers itself
//! with on start.

// Lets derive output refer to `::switchyard_lifecycle` from inside this crate.
extern crate self as switchyard_lifecycle;

pub mod component;
pub mod controller;
pub mod error;
pub mod phase;
pub mod scheduler;

pub use component::{
    CancelComponent, CancelListener, CleanupComponent, Component, ErrorDispatcher, ErrorHandler, SetupComponent,
    StartComponent, UpdateComponent,
};
pub use controller::{CancelState, LifecycleController, LifecycleOptions};
pub use error::{ComponentError, LifecycleError, LifecycleResult};
pub use phase::Phase;
pub use scheduler::{Scheduler, TimeMode, Updateable, same_target};
