//! Registration primitives shared by both processors.
//!
//! - [`Validate`] / [`Handle`] - The callback traits a table stores
//! - [`Registry`] - Keyed registration and removal
//! - [`Dispatch`] - Validation and processing of a payload
//!
//! The convenience catalogue built on top of these lives in
//! [`RegistryExt`](crate::RegistryExt).

use std::any::{Any, type_name};
use std::cell::{Ref, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::{DispatchResult, RegisterError, RegisterResult};
use crate::key::RegistrationKey;
use crate::outcome::{BoxError, IntoHandlerResult, IntoVerdict, Processed, Verdict};
use crate::payload::Payload;
use crate::table::{TableRegistry, TypeTable};

// ============================================================================
// Callback Traits
// ============================================================================

/// A validator bound to payload type `K`.
///
/// Returning `success == false` vetoes the payload; the remaining validators
/// are skipped.
pub trait Validate<S, K, R> {
    fn validate(&self, state: &S, payload: &K) -> Result<Verdict<R>, BoxError>;
}

/// A handler bound to payload type `K`.
///
/// Handlers run for every processed payload and receive the validation
/// outcome; use the filtering registrations of
/// [`RegistryExt`](crate::RegistryExt) to only run on success or failure.
pub trait Handle<S, K, R> {
    fn handle(&self, state: &mut S, payload: &K, success: bool, result: &R) -> Result<(), BoxError>;
}

impl<S, K, R, F, V> Validate<S, K, R> for F
where
    F: Fn(&S, &K) -> V,
    V: IntoVerdict<R>,
{
    fn validate(&self, state: &S, payload: &K) -> Result<Verdict<R>, BoxError> {
        self(state, payload).into_verdict()
    }
}

impl<S, K, R, F, H> Handle<S, K, R> for F
where
    F: Fn(&mut S, &K, bool, &R) -> H,
    H: IntoHandlerResult,
{
    fn handle(&self, state: &mut S, payload: &K, success: bool, result: &R) -> Result<(), BoxError> {
        self(state, payload, success, result).into_handler_result()
    }
}

// ============================================================================
// Type-erased Entries
// ============================================================================

pub(crate) trait ErasedValidator<S, R> {
    fn validate(&self, state: &S, payload: &dyn Any) -> Result<Verdict<R>, BoxError>;
}

pub(crate) trait ErasedHandler<S, R> {
    fn handle(&self, state: &mut S, payload: &dyn Any, success: bool, result: &R) -> Result<(), BoxError>;
}

pub(crate) type ValidatorEntry<S, R> = Rc<dyn ErasedValidator<S, R>>;
pub(crate) type HandlerEntry<S, R> = Rc<dyn ErasedHandler<S, R>>;

/// A callback bound to the payload type `K` of the table holding it.
struct Bound<K, T> {
    inner: T,
    _payload: PhantomData<fn(&K)>,
}

impl<K, T> Bound<K, T> {
    fn new(inner: T) -> Self {
        Self {
            inner,
            _payload: PhantomData,
        }
    }
}

// Tables are keyed by `K`, so the view handed to an entry always downcasts.
impl<S, K: Any, R: Default, T: Validate<S, K, R>> ErasedValidator<S, R> for Bound<K, T> {
    fn validate(&self, state: &S, payload: &dyn Any) -> Result<Verdict<R>, BoxError> {
        match payload.downcast_ref::<K>() {
            Some(payload) => self.inner.validate(state, payload),
            None => Ok(Verdict::pass(R::default())),
        }
    }
}

impl<S, K: Any, R, T: Handle<S, K, R>> ErasedHandler<S, R> for Bound<K, T> {
    fn handle(&self, state: &mut S, payload: &dyn Any, success: bool, result: &R) -> Result<(), BoxError> {
        match payload.downcast_ref::<K>() {
            Some(payload) => self.inner.handle(state, payload, success, result),
            None => Ok(()),
        }
    }
}

/// Validator and handler tables of one processor.
pub(crate) struct Tables<S, R> {
    pub(crate) validators: TableRegistry<ValidatorEntry<S, R>>,
    pub(crate) handlers: TableRegistry<HandlerEntry<S, R>>,
}

impl<S, R> Default for Tables<S, R> {
    fn default() -> Self {
        Self {
            validators: TableRegistry::default(),
            handlers: TableRegistry::default(),
        }
    }
}

impl<S, R> Tables<S, R> {
    pub(crate) fn sync_from(&mut self, live: &Self) {
        self.validators.sync_from(&live.validators);
        self.handlers.sync_from(&live.handlers);
    }

    pub(crate) fn clear(&mut self) {
        self.validators.clear();
        self.handlers.clear();
    }
}

// ============================================================================
// Live Tables
// ============================================================================

/// How a table treats a key that is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Duplicates {
    /// Fail with [`RegisterError::DuplicateKey`].
    Reject,
    /// Keep the existing entry and log a warning.
    Ignore,
}

/// The mutable tables of a processor, guarded against modification while a
/// dispatch holds them.
pub(crate) struct LiveTables<S, R> {
    tables: RefCell<Tables<S, R>>,
    duplicates: Duplicates,
}

impl<S, R> LiveTables<S, R> {
    pub(crate) fn new(duplicates: Duplicates) -> Self {
        Self {
            tables: RefCell::new(Tables::default()),
            duplicates,
        }
    }

    pub(crate) fn borrow(&self) -> Ref<'_, Tables<S, R>> {
        self.tables.borrow()
    }

    fn modify<T>(
        &self,
        payload: &'static str,
        f: impl FnOnce(&mut Tables<S, R>) -> RegisterResult<T>,
    ) -> RegisterResult<T> {
        let mut tables = self
            .tables
            .try_borrow_mut()
            .map_err(|_| RegisterError::dispatch_in_progress(payload))?;
        f(&mut tables)
    }

    fn insert<V>(&self, table: &mut TypeTable<V>, key: RegistrationKey, entry: V) -> RegisterResult<RegistrationKey> {
        match self.duplicates {
            Duplicates::Reject => table.insert_strict(key, entry)?,
            Duplicates::Ignore => {
                if !table.insert_if_absent(key, entry) {
                    warn!(payload = table.name(), %key, "Key already registered, keeping the existing entry");
                    return Ok(key);
                }
            }
        }
        debug!(payload = table.name(), %key, entries = table.len(), "Registered callback");
        Ok(key)
    }
}

impl<S: 'static, R: Default + 'static> LiveTables<S, R> {
    pub(crate) fn register_validator<K, V>(&self, key: RegistrationKey, validator: V) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        V: Validate<S, K, R> + 'static,
    {
        let entry: ValidatorEntry<S, R> = Rc::new(Bound::<K, V>::new(validator));
        self.modify(type_name::<K>(), |tables| {
            self.insert(tables.validators.table_mut::<K>(), key, entry)
        })
    }

    pub(crate) fn register_handler<K, H>(&self, key: RegistrationKey, handler: H) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        H: Handle<S, K, R> + 'static,
    {
        let entry: HandlerEntry<S, R> = Rc::new(Bound::<K, H>::new(handler));
        self.modify(type_name::<K>(), |tables| {
            self.insert(tables.handlers.table_mut::<K>(), key, entry)
        })
    }

    pub(crate) fn unregister_validator<K: Any>(&self, key: RegistrationKey) -> RegisterResult<bool> {
        let removed = self.modify(type_name::<K>(), |tables| {
            Ok(tables.validators.get_mut::<K>().is_some_and(|table| table.remove(&key)))
        })?;
        if removed {
            debug!(payload = type_name::<K>(), %key, "Unregistered validator");
        }
        Ok(removed)
    }

    pub(crate) fn unregister_handler<K: Any>(&self, key: RegistrationKey) -> RegisterResult<bool> {
        let removed = self.modify(type_name::<K>(), |tables| {
            Ok(tables.handlers.get_mut::<K>().is_some_and(|table| table.remove(&key)))
        })?;
        if removed {
            debug!(payload = type_name::<K>(), %key, "Unregistered handler");
        }
        Ok(removed)
    }

    pub(crate) fn unregister_validators<K: Any>(&self) -> RegisterResult<bool> {
        let removed = self.modify(type_name::<K>(), |tables| Ok(tables.validators.remove::<K>()))?;
        if removed {
            debug!(payload = type_name::<K>(), "Dropped validator table");
        }
        Ok(removed)
    }

    pub(crate) fn unregister_handlers<K: Any>(&self) -> RegisterResult<bool> {
        let removed = self.modify(type_name::<K>(), |tables| Ok(tables.handlers.remove::<K>()))?;
        if removed {
            debug!(payload = type_name::<K>(), "Dropped handler table");
        }
        Ok(removed)
    }

    pub(crate) fn clear(&self) -> RegisterResult<()> {
        self.modify("*", |tables| {
            tables.clear();
            Ok(())
        })
    }
}

// ============================================================================
// Public Traits
// ============================================================================

/// Keyed registration of validators and handlers.
///
/// Every method takes `&self`; registering from inside a callback is allowed
/// wherever the processor supports it (see each processor's docs).
pub trait Registry<S, R> {
    /// Registers a validator for payload type `K` under `key`.
    fn register_validator_by_key<K, V>(&self, key: RegistrationKey, validator: V) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        V: Validate<S, K, R> + 'static;

    /// Registers a handler for payload type `K` under `key`.
    fn register_handler_by_key<K, H>(&self, key: RegistrationKey, handler: H) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        H: Handle<S, K, R> + 'static;

    /// Removes the validator registered for `K` under `key`. Returns whether one was removed.
    fn unregister_validator_by_key<K: Any>(&self, key: RegistrationKey) -> RegisterResult<bool>;

    /// Removes the handler registered for `K` under `key`. Returns whether one was removed.
    fn unregister_handler_by_key<K: Any>(&self, key: RegistrationKey) -> RegisterResult<bool>;

    /// Drops the whole validator table of `K`.
    fn unregister_validators<K: Any>(&self) -> RegisterResult<bool>;

    /// Drops the whole handler table of `K`.
    fn unregister_handlers<K: Any>(&self) -> RegisterResult<bool>;

    /// Drops both tables of `K`.
    fn unregister<K: Any>(&self) -> RegisterResult<()> {
        self.unregister_validators::<K>()?;
        self.unregister_handlers::<K>()?;
        Ok(())
    }

    /// Drops every table.
    fn dispose(&self) -> RegisterResult<()>;
}

/// Validation and processing of payloads.
pub trait Dispatch<S, R>: Registry<S, R> {
    /// Returns whether derived dispatch is enabled.
    fn derived_dispatch(&self) -> bool;

    /// Enables or disables derived dispatch.
    ///
    /// When enabled, a payload reaches the tables of every type on its parent
    /// chain instead of only its exact type's.
    fn set_derived_dispatch(&self, enabled: bool);

    /// Runs the validators that `payload` reaches.
    ///
    /// Stops at the first rejecting validator. With no validators at all the
    /// verdict is a pass with a default result.
    fn validate(&self, state: &S, payload: &dyn Payload) -> DispatchResult<Verdict<R>>;

    /// Validates `payload`, then runs every handler it reaches with the verdict.
    fn process_with(&self, state: &mut S, payload: &dyn Payload) -> DispatchResult<Processed<R>>;

    /// Processes `payload` against a default state.
    fn process(&self, payload: &dyn Payload) -> DispatchResult<Processed<R>>
    where
        S: Default,
    {
        let mut state = S::default();
        self.process_with(&mut state, payload)
    }
}
