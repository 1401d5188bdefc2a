//! Convenience registrations.
//!
//! Every function here normalises its callback into a [`Validate`] or
//! [`Handle`] and funnels it into one of the keyed primitives of
//! [`Registry`]. Closures get a fresh [`RegistrationKey`], which is returned
//! so the registration can later be removed with
//! [`Registry::unregister_handler_by_key`]; shared objects are keyed by
//! identity and removed with the matching `unregister_*_object`.
//!
//! | Family | Runs when | Sees |
//! |--------|-----------|------|
//! | `on`, `on_success` | validation passed | payload |
//! | `on_failure` | validation failed | payload |
//! | `on_result`, `on_success_result` | passed, result is `E` | payload, result |
//! | `on_failure_result` | failed, result is `E` | payload, result |
//! | `on_validated` | always, result is `E` | payload, verdict, result |
//!
//! Each family has an `on_state_*` twin that also receives `&mut S`.

use std::any::Any;
use std::rc::Rc;

use crate::error::RegisterResult;
use crate::key::RegistrationKey;
use crate::outcome::{BoxError, IntoHandlerResult, IntoVerdict, Verdict, cast_result};
use crate::registry::{Handle, Registry, Validate};

/// A payload that knows how to apply itself to a state.
///
/// Register [`RegistryExt::applier`] once per payload type to have every
/// successfully validated payload of that type applied.
pub trait Apply<S> {
    fn apply(&self, state: &mut S);
}

/// Which validation outcomes a handler runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    Success,
    Failure,
    Always,
}

impl Filter {
    fn admits(self, success: bool) -> bool {
        match self {
            Self::Success => success,
            Self::Failure => !success,
            Self::Always => true,
        }
    }
}

// Pins a closure to the primitive signatures.
fn validator_fn<S, K, R, F>(f: F) -> F
where
    F: Fn(&S, &K) -> Result<Verdict<R>, BoxError>,
{
    f
}

fn handler_fn<S, K, R, F>(f: F) -> F
where
    F: Fn(&mut S, &K, bool, &R) -> Result<(), BoxError>,
{
    f
}

/// A shared object registered under its own identity.
struct Shared<T: ?Sized>(Rc<T>);

impl<S, K, R, T: Validate<S, K, R> + ?Sized> Validate<S, K, R> for Shared<T> {
    fn validate(&self, state: &S, payload: &K) -> Result<Verdict<R>, BoxError> {
        self.0.validate(state, payload)
    }
}

impl<S, K, R, T: Handle<S, K, R> + ?Sized> Handle<S, K, R> for Shared<T> {
    fn handle(&self, state: &mut S, payload: &K, success: bool, result: &R) -> Result<(), BoxError> {
        self.0.handle(state, payload, success, result)
    }
}

fn register_filtered<P, S, R, K, F, H>(registry: &P, filter: Filter, f: F) -> RegisterResult<RegistrationKey>
where
    P: Registry<S, R> + ?Sized,
    S: 'static,
    R: 'static,
    K: Any,
    F: Fn(&mut S, &K) -> H + 'static,
    H: IntoHandlerResult,
{
    registry.register_handler_by_key::<K, _>(
        RegistrationKey::next(),
        handler_fn(move |state: &mut S, payload: &K, success, _result: &R| {
            if filter.admits(success) {
                f(state, payload).into_handler_result()
            } else {
                Ok(())
            }
        }),
    )
}

fn register_result_filtered<P, S, R, K, E, F, H>(
    registry: &P,
    filter: Filter,
    f: F,
) -> RegisterResult<RegistrationKey>
where
    P: Registry<S, R> + ?Sized,
    S: 'static,
    R: 'static,
    K: Any,
    E: Any,
    F: Fn(&mut S, &K, bool, &E) -> H + 'static,
    H: IntoHandlerResult,
{
    registry.register_handler_by_key::<K, _>(
        RegistrationKey::next(),
        handler_fn(move |state: &mut S, payload: &K, success, result: &R| {
            if !filter.admits(success) {
                return Ok(());
            }
            match cast_result::<R, E>(result) {
                Some(result) => f(state, payload, success, result).into_handler_result(),
                None => Ok(()),
            }
        }),
    )
}

/// The registration catalogue, available on every [`Registry`].
pub trait RegistryExt<S: 'static, R: 'static>: Registry<S, R> {
    // ------------------------------------------------------------------
    // Validators
    // ------------------------------------------------------------------

    /// Registers a validator that only looks at the payload.
    fn validator<K, F, V>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        F: Fn(&K) -> V + 'static,
        V: IntoVerdict<R>,
    {
        self.register_validator_by_key::<K, _>(
            RegistrationKey::next(),
            validator_fn(move |_state: &S, payload: &K| f(payload).into_verdict()),
        )
    }

    /// Registers a validator that also reads the state.
    fn state_validator<K, F, V>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        F: Fn(&S, &K) -> V + 'static,
        V: IntoVerdict<R>,
    {
        self.register_validator_by_key::<K, _>(
            RegistrationKey::next(),
            validator_fn(move |state: &S, payload: &K| f(state, payload).into_verdict()),
        )
    }

    /// Registers a shared validator object, keyed by its identity.
    fn validator_object<K, V>(&self, validator: &Rc<V>) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        V: Validate<S, K, R> + ?Sized + 'static,
    {
        self.register_validator_by_key::<K, _>(RegistrationKey::of(validator), Shared(Rc::clone(validator)))
    }

    /// Removes a validator object registered with [`validator_object`](Self::validator_object).
    fn unregister_validator_object<K, V>(&self, validator: &Rc<V>) -> RegisterResult<bool>
    where
        K: Any,
        V: ?Sized,
    {
        self.unregister_validator_by_key::<K>(RegistrationKey::of(validator))
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    /// Registers a handler that runs when validation passed. Same as
    /// [`on_success`](Self::on_success).
    fn on<K, F, H>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        F: Fn(&K) -> H + 'static,
        H: IntoHandlerResult,
    {
        self.on_success(f)
    }

    /// Registers a handler that runs when validation passed.
    fn on_success<K, F, H>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        F: Fn(&K) -> H + 'static,
        H: IntoHandlerResult,
    {
        register_filtered(self, Filter::Success, move |_: &mut S, payload: &K| f(payload))
    }

    /// Registers a handler that runs when validation failed.
    fn on_failure<K, F, H>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        F: Fn(&K) -> H + 'static,
        H: IntoHandlerResult,
    {
        register_filtered(self, Filter::Failure, move |_: &mut S, payload: &K| f(payload))
    }

    /// Registers a handler that runs when validation passed with a result of type `E`.
    fn on_result<K, E, F, H>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        E: Any,
        F: Fn(&K, &E) -> H + 'static,
        H: IntoHandlerResult,
    {
        self.on_success_result(f)
    }

    /// Same as [`on_result`](Self::on_result).
    fn on_success_result<K, E, F, H>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        E: Any,
        F: Fn(&K, &E) -> H + 'static,
        H: IntoHandlerResult,
    {
        register_result_filtered(self, Filter::Success, move |_: &mut S, payload: &K, _, result: &E| {
            f(payload, result)
        })
    }

    /// Registers a handler that runs when validation failed with a result of type `E`.
    fn on_failure_result<K, E, F, H>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        E: Any,
        F: Fn(&K, &E) -> H + 'static,
        H: IntoHandlerResult,
    {
        register_result_filtered(self, Filter::Failure, move |_: &mut S, payload: &K, _, result: &E| {
            f(payload, result)
        })
    }

    /// Registers a handler that always runs when the result is of type `E`,
    /// and observes the verdict.
    fn on_validated<K, E, F, H>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        E: Any,
        F: Fn(&K, bool, &E) -> H + 'static,
        H: IntoHandlerResult,
    {
        register_result_filtered(self, Filter::Always, move |_: &mut S, payload: &K, success, result: &E| {
            f(payload, success, result)
        })
    }

    /// State-aware [`on`](Self::on).
    fn on_state<K, F, H>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        F: Fn(&mut S, &K) -> H + 'static,
        H: IntoHandlerResult,
    {
        self.on_state_success(f)
    }

    /// State-aware [`on_success`](Self::on_success).
    fn on_state_success<K, F, H>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        F: Fn(&mut S, &K) -> H + 'static,
        H: IntoHandlerResult,
    {
        register_filtered(self, Filter::Success, f)
    }

    /// State-aware [`on_failure`](Self::on_failure).
    fn on_state_failure<K, F, H>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        F: Fn(&mut S, &K) -> H + 'static,
        H: IntoHandlerResult,
    {
        register_filtered(self, Filter::Failure, f)
    }

    /// State-aware [`on_result`](Self::on_result).
    fn on_state_result<K, E, F, H>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        E: Any,
        F: Fn(&mut S, &K, &E) -> H + 'static,
        H: IntoHandlerResult,
    {
        self.on_state_success_result(f)
    }

    /// State-aware [`on_success_result`](Self::on_success_result).
    fn on_state_success_result<K, E, F, H>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        E: Any,
        F: Fn(&mut S, &K, &E) -> H + 'static,
        H: IntoHandlerResult,
    {
        register_result_filtered(self, Filter::Success, move |state: &mut S, payload: &K, _, result: &E| {
            f(state, payload, result)
        })
    }

    /// State-aware [`on_failure_result`](Self::on_failure_result).
    fn on_state_failure_result<K, E, F, H>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        E: Any,
        F: Fn(&mut S, &K, &E) -> H + 'static,
        H: IntoHandlerResult,
    {
        register_result_filtered(self, Filter::Failure, move |state: &mut S, payload: &K, _, result: &E| {
            f(state, payload, result)
        })
    }

    /// State-aware [`on_validated`](Self::on_validated).
    fn on_state_validated<K, E, F, H>(&self, f: F) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        E: Any,
        F: Fn(&mut S, &K, bool, &E) -> H + 'static,
        H: IntoHandlerResult,
    {
        register_result_filtered(self, Filter::Always, f)
    }

    /// Registers a shared handler object, keyed by its identity.
    ///
    /// The object receives every processed payload along with the verdict.
    fn handler_object<K, H>(&self, handler: &Rc<H>) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        H: Handle<S, K, R> + ?Sized + 'static,
    {
        self.register_handler_by_key::<K, _>(RegistrationKey::of(handler), Shared(Rc::clone(handler)))
    }

    /// Removes a handler object registered with [`handler_object`](Self::handler_object).
    fn unregister_handler_object<K, H>(&self, handler: &Rc<H>) -> RegisterResult<bool>
    where
        K: Any,
        H: ?Sized,
    {
        self.unregister_handler_by_key::<K>(RegistrationKey::of(handler))
    }

    /// Applies every successfully validated `K` to the state.
    fn applier<K>(&self) -> RegisterResult<RegistrationKey>
    where
        K: Apply<S> + Any,
    {
        self.on_state_success(|state: &mut S, payload: &K| payload.apply(state))
    }
}

impl<S: 'static, R: 'static, T: Registry<S, R> + ?Sized> RegistryExt<S, R> for T {}
