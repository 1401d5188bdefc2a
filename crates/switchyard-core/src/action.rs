//! The Action Processor: validate-then-handle dispatch with fail-fast errors.
//!
//! Dispatch iterates the live tables directly. A callback may dispatch again
//! on the same processor, but registering or unregistering from inside a
//! callback is refused with
//! [`RegisterError::DispatchInProgress`](crate::RegisterError::DispatchInProgress);
//! use the [`EventProcessor`](crate::EventProcessor) when handlers need to
//! mutate the registry.
//!
//! ```rust,ignore
//! use switchyard::prelude::*;
//!
//! #[derive(Payload)]
//! struct Heal { amount: u32 }
//!
//! let actions: ActionProcessor<Player, String> = ActionProcessor::new();
//! actions.state_validator(|player: &Player, _: &Heal| (player.alive, "dead players cannot heal"))?;
//! actions.on_state(|player: &mut Player, heal: &Heal| player.hp += heal.amount)?;
//!
//! let outcome = actions.process_with(&mut player, &Heal { amount: 5 })?;
//! ```

use std::any::Any;
use std::cell::Cell;
use std::fmt;

use tracing::{Level, span, trace};

use crate::error::{DispatchError, DispatchResult, RegisterResult};
use crate::key::RegistrationKey;
use crate::outcome::{Processed, Verdict};
use crate::payload::Payload;
use crate::registry::{Dispatch, Duplicates, Handle, LiveTables, Registry, Tables, Validate};

/// Type-indexed processor that stops at the first failing callback.
///
/// `S` is the state handed to state-aware callbacks, `R` the validation result.
/// Registering a key that is already present in a table fails with
/// [`RegisterError::DuplicateKey`](crate::RegisterError::DuplicateKey).
pub struct ActionProcessor<S = (), R = ()> {
    tables: LiveTables<S, R>,
    derived: Cell<bool>,
}

impl<S, R> ActionProcessor<S, R> {
    /// Creates an empty processor with derived dispatch disabled.
    pub fn new() -> Self {
        Self {
            tables: LiveTables::new(Duplicates::Reject),
            derived: Cell::new(false),
        }
    }

    /// Enables or disables derived dispatch (builder pattern).
    pub fn with_derived_dispatch(self, enabled: bool) -> Self {
        self.derived.set(enabled);
        self
    }
}

impl<S, R> Default for ActionProcessor<S, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, R: Default> ActionProcessor<S, R> {
    fn run_validators(&self, tables: &Tables<S, R>, state: &S, payload: &dyn Payload) -> DispatchResult<Verdict<R>> {
        let mut verdict = Verdict::pass(R::default());
        for (table, view) in tables.validators.matching(payload, self.derived.get()) {
            trace!(table = table.name(), validators = table.len(), "Validating");
            for validator in table.values() {
                verdict = validator
                    .validate(state, view)
                    .map_err(|source| DispatchError::validator(table.name(), source))?;
                if !verdict.success {
                    return Ok(verdict);
                }
            }
        }
        Ok(verdict)
    }

    fn run_handlers(
        &self,
        tables: &Tables<S, R>,
        state: &mut S,
        payload: &dyn Payload,
        verdict: &Verdict<R>,
    ) -> DispatchResult<bool> {
        let mut handled = false;
        for (table, view) in tables.handlers.matching(payload, self.derived.get()) {
            if table.is_empty() {
                continue;
            }
            handled = true;
            trace!(table = table.name(), handlers = table.len(), "Handling");
            for handler in table.values() {
                handler
                    .handle(state, view, verdict.success, &verdict.result)
                    .map_err(|source| DispatchError::handler(table.name(), source))?;
            }
        }
        Ok(handled)
    }
}

impl<S: 'static, R: Default + 'static> Registry<S, R> for ActionProcessor<S, R> {
    fn register_validator_by_key<K, V>(&self, key: RegistrationKey, validator: V) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        V: Validate<S, K, R> + 'static,
    {
        self.tables.register_validator::<K, V>(key, validator)
    }

    fn register_handler_by_key<K, H>(&self, key: RegistrationKey, handler: H) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        H: Handle<S, K, R> + 'static,
    {
        self.tables.register_handler::<K, H>(key, handler)
    }

    fn unregister_validator_by_key<K: Any>(&self, key: RegistrationKey) -> RegisterResult<bool> {
        self.tables.unregister_validator::<K>(key)
    }

    fn unregister_handler_by_key<K: Any>(&self, key: RegistrationKey) -> RegisterResult<bool> {
        self.tables.unregister_handler::<K>(key)
    }

    fn unregister_validators<K: Any>(&self) -> RegisterResult<bool> {
        self.tables.unregister_validators::<K>()
    }

    fn unregister_handlers<K: Any>(&self) -> RegisterResult<bool> {
        self.tables.unregister_handlers::<K>()
    }

    fn dispose(&self) -> RegisterResult<()> {
        self.tables.clear()
    }
}

impl<S: 'static, R: Default + 'static> Dispatch<S, R> for ActionProcessor<S, R> {
    fn derived_dispatch(&self) -> bool {
        self.derived.get()
    }

    fn set_derived_dispatch(&self, enabled: bool) {
        self.derived.set(enabled);
    }

    fn validate(&self, state: &S, payload: &dyn Payload) -> DispatchResult<Verdict<R>> {
        let tables = self.tables.borrow();
        self.run_validators(&tables, state, payload)
    }

    fn process_with(&self, state: &mut S, payload: &dyn Payload) -> DispatchResult<Processed<R>> {
        let span = span!(Level::DEBUG, "process", payload = payload.payload_name());
        let _enter = span.enter();

        let tables = self.tables.borrow();
        let verdict = self.run_validators(&tables, state, payload)?;
        let handled = self.run_handlers(&tables, state, payload, &verdict)?;

        trace!(handled, success = verdict.success, "Processed");
        Ok(Processed::new(handled, verdict))
    }
}

impl<S, R> fmt::Debug for ActionProcessor<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.borrow();
        f.debug_struct("ActionProcessor")
            .field("validator_tables", &tables.validators.len())
            .field("handler_tables", &tables.handlers.len())
            .field("derived_dispatch", &self.derived.get())
            .finish()
    }
}
