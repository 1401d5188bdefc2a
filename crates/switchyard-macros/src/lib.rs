//! Procedural macros for Switchyard.
//!
//! This crate provides:
//!
//! - `#[derive(Payload)]` - Implements `switchyard_core::Payload`, including the
//!   parent chain used by derived dispatch
//! - `#[derive(Component)]` - Implements `switchyard_lifecycle::Component` by
//!   advertising the roles a type plays in a lifecycle
//!
//! # Payload Derive Macro
//!
//! ```rust,ignore
//! use switchyard::prelude::*;
//!
//! #[derive(Payload)]
//! pub struct Attack {
//!     pub power: u32,
//! }
//!
//! #[derive(Payload)]
//! #[payload(name = "attack.critical")]
//! pub struct CriticalAttack {
//!     #[payload(parent)]
//!     pub base: Attack,
//!     pub multiplier: f32,
//! }
//! ```
//!
//! # Component Derive Macro
//!
//! ```rust,ignore
//! use switchyard::prelude::*;
//!
//! #[derive(Component)]
//! #[component(setup, cleanup)]
//! struct AssetLoader { /* ... */ }
//! ```

mod component;
mod payload;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `switchyard_core::Payload` for structs and enums.
///
/// Generates:
/// - `payload_name(&self) -> &'static str` - the `name` attribute, or the type path
/// - `as_any(&self) -> &dyn Any`
/// - `upcast(&self, TypeId) -> Option<&dyn Any>` - walks the parent chain
/// - `Deref`/`DerefMut` to the parent when a parent field exists
///
/// # Attributes
///
/// - `#[payload(name = "...")]` - Override the payload name
/// - `#[payload(parent)]` on a field - Marks the embedded base payload
#[proc_macro_derive(Payload, attributes(payload))]
pub fn derive_payload(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match payload::derive_payload(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derives `switchyard_lifecycle::Component`.
///
/// Every role listed in `#[component(...)]` must be implemented separately;
/// the derive only wires up the capability queries.
///
/// Recognised roles: `setup`, `start`, `update`, `cleanup`, `cancel`,
/// `cancel_listener`, `error_dispatcher`, `error_handler`.
#[proc_macro_derive(Component, attributes(component))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match component::derive_component(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
