//! Payload system for Switchyard.
//!
//! A payload is any value dispatched through a processor. Payloads are
//! type-erased as `&dyn Payload` and routed by their runtime [`TypeId`]:
//!
//! - [`Payload`] - Base trait for everything a processor can dispatch
//! - [`PayloadType`] - Identity and display name of a payload type
//!
//! # Parent Chain
//!
//! Rust has no subtyping, so "is-a" relations between payloads are expressed by
//! embedding the base payload as a field. [`Payload::upcast`] walks that chain
//! and yields a view of the payload as any of its ancestors:
//!
//! ```rust,ignore
//! #[derive(Payload)]
//! struct Attack { power: u32 }
//!
//! #[derive(Payload)]
//! struct CriticalAttack {
//!     #[payload(parent)]
//!     base: Attack,
//! }
//!
//! let crit = CriticalAttack { base: Attack { power: 7 } };
//! let payload: &dyn Payload = &crit;
//! assert_eq!(payload.view::<Attack>().map(|a| a.power), Some(7));
//! ```

use std::any::{Any, TypeId, type_name};
use std::fmt;

// ============================================================================
// Core Payload Trait
// ============================================================================

/// The base trait for everything dispatched through a processor.
///
/// Use `#[derive(Payload)]` rather than implementing this by hand; the derive
/// generates the parent chain traversal for `#[payload(parent)]` fields.
pub trait Payload: Any {
    /// Returns the human-readable name of this payload, used in logs and errors.
    fn payload_name(&self) -> &'static str;

    /// Returns this payload as `&dyn Any` for downcasting to its exact type.
    fn as_any(&self) -> &dyn Any;

    /// Returns a view of this payload as the type identified by `target`.
    ///
    /// Yields `Some` when `target` is the payload's own type or one of the
    /// types along its parent chain.
    fn upcast(&self, target: TypeId) -> Option<&dyn Any>;
}

impl dyn Payload {
    /// Returns the [`TypeId`] of the concrete payload type.
    #[inline]
    pub fn exact_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    /// Returns `true` if the payload is exactly of type `K`.
    #[inline]
    pub fn is<K: Any>(&self) -> bool {
        self.as_any().is::<K>()
    }

    /// Downcasts to the exact payload type.
    #[inline]
    pub fn downcast_ref<K: Any>(&self) -> Option<&K> {
        self.as_any().downcast_ref::<K>()
    }

    /// Returns a view of the payload as `K`, following the parent chain.
    pub fn view<K: Any>(&self) -> Option<&K> {
        self.upcast(TypeId::of::<K>())?.downcast_ref::<K>()
    }

    /// Returns `true` if the payload is `K` or has `K` as an ancestor.
    pub fn is_a<K: Any>(&self) -> bool {
        self.upcast(TypeId::of::<K>()).is_some()
    }
}

impl fmt::Debug for dyn Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&self.payload_name()).finish()
    }
}

// ============================================================================
// Payload Type Identity
// ============================================================================

/// Identity of a payload type: its [`TypeId`] plus a name for diagnostics.
///
/// Tables are keyed by `PayloadType`; two values compare equal exactly when
/// their type ids do.
#[derive(Clone, Copy)]
pub struct PayloadType {
    id: TypeId,
    name: &'static str,
}

impl PayloadType {
    /// Returns the payload type of `K`.
    pub fn of<K: Any>() -> Self {
        Self {
            id: TypeId::of::<K>(),
            name: type_name::<K>(),
        }
    }

    /// Returns the type id.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the Rust type name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for PayloadType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PayloadType {}

impl std::hash::Hash for PayloadType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
