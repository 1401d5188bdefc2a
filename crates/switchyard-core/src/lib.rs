//! # Switchyard Core
//!
//! Type-indexed dispatch of payloads through a validate-then-handle pipeline.
//!
//! ## Building Blocks
//!
//! - **Payloads**: Type-erased values routed by runtime type ([`Payload`], [`PayloadType`])
//! - **Tables**: Callbacks bound to one payload type, keyed by [`RegistrationKey`]
//! - **Processors**: [`ActionProcessor`] (fail-fast) and [`EventProcessor`]
//!   (snapshot-isolated, aggregating errors), both implementing [`Dispatch`]
//! - **Catalogue**: Convenience registrations in [`RegistryExt`]
//!
//! ## Pipeline
//!
//! ```text
//! payload ──▶ validator tables ──▶ Verdict ──▶ handler tables ──▶ Processed
//!             (stop at first false)            (all run, see verdict)
//! ```
//!
//! With derived dispatch disabled only the tables of the payload's exact type
//! take part. With it enabled, every table whose type lies on the payload's
//! parent chain does, in the order the tables were first registered.
//!
//! ## Example
//!
//! ```rust,ignore
//! use switchyard_core::{ActionProcessor, Dispatch, Payload, RegistryExt};
//!
//! #[derive(Payload)]
//! struct Damage { amount: u32 }
//!
//! let processor: ActionProcessor<u32> = ActionProcessor::new();
//! processor.validator(|d: &Damage| d.amount > 0)?;
//! processor.on_state(|hp: &mut u32, d: &Damage| *hp = hp.saturating_sub(d.amount))?;
//!
//! let mut hp = 10;
//! let outcome = processor.process_with(&mut hp, &Damage { amount: 3 })?;
//! assert!(outcome.handled && outcome.success);
//! assert_eq!(hp, 7);
//! ```

// Lets derive output refer to `::switchyard_core` from inside this crate.
extern crate self as switchyard_core;

pub mod action;
pub mod catalogue;
pub mod error;
pub mod event;
pub mod key;
pub mod outcome;
pub mod payload;
pub mod registry;
mod table;

pub use action::ActionProcessor;
pub use catalogue::{Apply, RegistryExt};
pub use error::{DispatchError, DispatchResult, RegisterError, RegisterResult};
pub use event::EventProcessor;
pub use key::RegistrationKey;
pub use outcome::{BoxError, DynResult, IntoHandlerResult, IntoVerdict, Processed, Verdict, cast_result};
pub use payload::{Payload, PayloadType};
pub use registry::{Dispatch, Handle, Registry, Validate};
