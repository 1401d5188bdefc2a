//! The Event Processor: dispatch that tolerates registry mutation from inside
//! callbacks.
//!
//! # Snapshots
//!
//! Registrations always go to the live tables. Dispatch reads a snapshot that
//! is refreshed from the live tables when an outermost dispatch begins and is
//! left alone by nested dispatches. A handler registered while a dispatch is
//! running therefore first fires on the next outermost call.
//!
//! # Errors
//!
//! Every callback of a table runs even if earlier ones failed. Once the table
//! finishes, the collected errors are raised together as
//! [`DispatchError::Aggregate`] and the dispatch stops there.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;

use tracing::{Level, span, trace, warn};

use crate::error::{DispatchError, DispatchResult, RegisterResult};
use crate::key::RegistrationKey;
use crate::outcome::{Processed, Verdict};
use crate::payload::Payload;
use crate::registry::{Dispatch, Duplicates, Handle, LiveTables, Registry, Tables, Validate};

/// Type-indexed processor that is safe against callbacks registering and
/// unregistering on it, and that aggregates callback errors per table.
///
/// Registering a key that is already present is ignored (with a warning).
pub struct EventProcessor<S = (), R = ()> {
    live: LiveTables<S, R>,
    snapshot: RefCell<Tables<S, R>>,
    depth: Cell<usize>,
    derived: Cell<bool>,
}

/// Tracks dispatch nesting; restores the depth on drop so errors unwind it.
struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> (Self, bool) {
        let outermost = depth.get() == 0;
        depth.set(depth.get() + 1);
        (Self { depth }, outermost)
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

impl<S, R> EventProcessor<S, R> {
    /// Creates an empty processor with derived dispatch disabled.
    pub fn new() -> Self {
        Self {
            live: LiveTables::new(Duplicates::Ignore),
            snapshot: RefCell::new(Tables::default()),
            depth: Cell::new(0),
            derived: Cell::new(false),
        }
    }

    /// Enables or disables derived dispatch (builder pattern).
    pub fn with_derived_dispatch(self, enabled: bool) -> Self {
        self.derived.set(enabled);
        self
    }

    /// Returns how many dispatches are currently running on this processor.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    fn enter(&self) -> DepthGuard<'_> {
        let (guard, outermost) = DepthGuard::enter(&self.depth);
        if outermost {
            self.snapshot.borrow_mut().sync_from(&self.live.borrow());
        }
        guard
    }
}

impl<S, R> Default for EventProcessor<S, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, R: Default> EventProcessor<S, R> {
    fn run_validators(&self, tables: &Tables<S, R>, state: &S, payload: &dyn Payload) -> DispatchResult<Verdict<R>> {
        let mut verdict = Verdict::pass(R::default());
        for (table, view) in tables.validators.matching(payload, self.derived.get()) {
            trace!(table = table.name(), validators = table.len(), "Validating");
            let mut errors = Vec::new();
            for validator in table.values() {
                match validator.validate(state, view) {
                    Ok(next) => {
                        verdict = next;
                        if !verdict.success {
                            break;
                        }
                    }
                    Err(source) => errors.push(DispatchError::validator(table.name(), source)),
                }
            }
            raise(table.name(), errors)?;
            if !verdict.success {
                return Ok(verdict);
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
            let errors: Vec<_> = table
                .values()
                .filter_map(|handler| {
                    handler
                        .handle(state, view, verdict.success, &verdict.result)
                        .err()
                        .map(|source| DispatchError::handler(table.name(), source))
                })
                .collect();
            raise(table.name(), errors)?;
        }
        Ok(handled)
    }
}

fn raise(payload: &'static str, errors: Vec<DispatchError>) -> DispatchResult<()> {
    if errors.is_empty() {
        return Ok(());
    }
    warn!(payload, count = errors.len(), "Callbacks failed during dispatch");
    Err(DispatchError::Aggregate { payload, errors })
}

impl<S: 'static, R: Default + 'static> Registry<S, R> for EventProcessor<S, R> {
    fn register_validator_by_key<K, V>(&self, key: RegistrationKey, validator: V) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        V: Validate<S, K, R> + 'static,
    {
        self.live.register_validator::<K, V>(key, validator)
    }

    fn register_handler_by_key<K, H>(&self, key: RegistrationKey, handler: H) -> RegisterResult<RegistrationKey>
    where
        K: Any,
        H: Handle<S, K, R> + 'static,
    {
        self.live.register_handler::<K, H>(key, handler)
    }

    fn unregister_validator_by_key<K: Any>(&self, key: RegistrationKey) -> RegisterResult<bool> {
        self.live.unregister_validator::<K>(key)
    }

    fn unregister_handler_by_key<K: Any>(&self, key: RegistrationKey) -> RegisterResult<bool> {
        self.live.unregister_handler::<K>(key)
    }

    fn unregister_validators<K: Any>(&self) -> RegisterResult<bool> {
        self.live.unregister_validators::<K>()
    }

    fn unregister_handlers<K: Any>(&self) -> RegisterResult<bool> {
        self.live.unregister_handlers::<K>()
    }

    /// Clears the live tables. The snapshot is cleared too unless a dispatch
    /// is reading it; it is rebuilt on the next outermost dispatch either way.
    fn dispose(&self) -> RegisterResult<()> {
        self.live.clear()?;
        if let Ok(mut snapshot) = self.snapshot.try_borrow_mut() {
            snapshot.clear();
        }
        Ok(())
    }
}

impl<S: 'static, R: Default + 'static> Dispatch<S, R> for EventProcessor<S, R> {
    fn derived_dispatch(&self) -> bool {
        self.derived.get()
    }

    fn set_derived_dispatch(&self, enabled: bool) {
        self.derived.set(enabled);
    }

    fn validate(&self, state: &S, payload: &dyn Payload) -> DispatchResult<Verdict<R>> {
        let _guard = self.enter();
        let tables = self.snapshot.borrow();
        self.run_validators(&tables, state, payload)
    }

    fn process_with(&self, state: &mut S, payload: &dyn Payload) -> DispatchResult<Processed<R>> {
        let span = span!(Level::DEBUG, "process", payload = payload.payload_name(), depth = self.depth.get());
        let _enter = span.enter();

        let _guard = self.enter();
        let tables = self.snapshot.borrow();
        let verdict = self.run_validators(&tables, state, payload)?;
        let handled = self.run_handlers(&tables, state, payload, &verdict)?;

        trace!(handled, success = verdict.success, "Processed");
        Ok(Processed::new(handled, verdict))
    }
}

impl<S, R> fmt::Debug for EventProcessor<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let live = self.live.borrow();
        f.debug_struct("EventProcessor")
            .field("validator_tables", &live.validators.len())
            .field("handler_tables", &live.handlers.len())
            .field("depth", &self.depth.get())
            .field("derived_dispatch", &self.derived.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::RegistryExt;
    use std::rc::Rc;
    use switchyard_macros::Payload;

    #[derive(Payload)]
    struct Ping(u32);

    #[derive(Payload)]
    struct Pong;

    #[derive(Payload)]
    struct LoudPing {
        #[payload(parent)]
        ping: Ping,
    }

    type Log = Rc<RefCell<Vec<String>>>;

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn test_handler_registered_mid_dispatch_fires_next_time() {
        let processor = Rc::new(EventProcessor::<(), ()>::new());
        let calls = log();
        let installed = Rc::new(Cell::new(false));

        let weak = Rc::downgrade(&processor);
        let sink = calls.clone();
        let flag = installed.clone();
        processor
            .on(move |_: &Ping| {
                sink.borrow_mut().push("h1".into());
                if flag.replace(true) {
                    return;
                }
                if let Some(processor) = weak.upgrade() {
                    let sink = sink.clone();
                    processor.on(move |_: &Ping| sink.borrow_mut().push("h2".into())).unwrap();
                }
            })
            .unwrap();

        processor.process(&Ping(1)).unwrap();
        assert_eq!(*calls.borrow(), vec!["h1"]);

        calls.borrow_mut().clear();
        processor.process(&Ping(2)).unwrap();
        assert_eq!(*calls.borrow(), vec!["h1", "h2"]);
    }

    #[test]
    fn test_nested_dispatch_keeps_outer_snapshot() {
        let processor = Rc::new(EventProcessor::<(), ()>::new());
        let calls = log();

        let weak = Rc::downgrade(&processor);
        let sink = calls.clone();
        processor
            .on(move |ping: &Ping| {
                sink.borrow_mut().push(format!("ping {}", ping.0));
                let Some(processor) = weak.upgrade() else { return };
                assert_eq!(processor.depth(), 1);
                let sink = sink.clone();
                processor.on(move |_: &Pong| sink.borrow_mut().push("late pong".into())).unwrap();
                let nested = processor.process(&Pong).unwrap();
                assert!(!nested.handled);
            })
            .unwrap();

        processor.process(&Ping(1)).unwrap();
        assert_eq!(*calls.borrow(), vec!["ping 1"]);
        assert_eq!(processor.depth(), 0);

        assert!(processor.process(&Pong).unwrap().handled);
    }

    #[test]
    fn test_handler_unregistered_mid_dispatch_still_runs_this_time() {
        let processor = Rc::new(EventProcessor::<(), ()>::new());
        let calls = log();

        let sink = calls.clone();
        let weak = Rc::downgrade(&processor);
        processor
            .on(move |_: &Ping| {
                sink.borrow_mut().push("first".into());
                if let Some(processor) = weak.upgrade() {
                    processor.unregister::<Ping>().unwrap();
                }
            })
            .unwrap();
        let sink = calls.clone();
        processor.on(move |_: &Ping| sink.borrow_mut().push("second".into())).unwrap();

        assert!(processor.process(&Ping(0)).unwrap().handled);
        assert_eq!(*calls.borrow(), vec!["first", "second"]);
        assert!(!processor.process(&Ping(0)).unwrap().handled);
    }

    #[test]
    fn test_handler_errors_are_aggregated_per_table() {
        let processor: EventProcessor = EventProcessor::new();
        let calls = log();

        processor.on(|_: &Ping| Err::<(), _>("h1 failed")).unwrap();
        let sink = calls.clone();
        processor.on(move |_: &Ping| sink.borrow_mut().push("h2".into())).unwrap();
        processor.on(|_: &Ping| Err::<(), _>("h3 failed")).unwrap();

        let err = processor.process(&Ping(0)).unwrap_err();

        assert_eq!(*calls.borrow(), vec!["h2"]);
        match &err {
            DispatchError::Aggregate { errors, .. } => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].to_string().contains("h1 failed"));
                assert!(errors[1].to_string().contains("h3 failed"));
            }
            other => panic!("expected aggregate, got {other:?}"),
        }
        assert_eq!(processor.depth(), 0);
    }

    #[test]
    fn test_aggregate_stops_before_next_table() {
        let processor: EventProcessor = EventProcessor::new().with_derived_dispatch(true);
        let calls = log();

        processor.on(|_: &Ping| Err::<(), _>("base failed")).unwrap();
        let sink = calls.clone();
        processor.on(move |_: &LoudPing| sink.borrow_mut().push("loud".into())).unwrap();

        let err = processor.process(&LoudPing { ping: Ping(0) }).unwrap_err();
        assert_eq!(err.errors().len(), 1);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_validator_errors_are_aggregated() {
        let processor: EventProcessor = EventProcessor::new();
        let calls = log();

        processor.validator(|_: &Ping| Err::<bool, _>("v1 failed")).unwrap();
        let sink = calls.clone();
        processor
            .validator(move |_: &Ping| {
                sink.borrow_mut().push("v2".into());
                true
            })
            .unwrap();

        let err = processor.process(&Ping(0)).unwrap_err();
        assert_eq!(*calls.borrow(), vec!["v2"]);
        assert!(matches!(err, DispatchError::Aggregate { ref errors, .. } if errors.len() == 1));
    }

    #[test]
    fn test_validation_short_circuits() {
        let processor: EventProcessor<(), u8> = EventProcessor::new();
        let calls = log();

        processor.validator(|_: &Ping| (false, 3u8)).unwrap();
        let sink = calls.clone();
        processor
            .validator(move |_: &Ping| {
                sink.borrow_mut().push("v2".into());
                true
            })
            .unwrap();

        let verdict = processor.validate(&(), &Ping(0)).unwrap();
        assert_eq!(verdict, Verdict::fail(3));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_duplicate_key_is_ignored() {
        let processor: EventProcessor = EventProcessor::new();
        let calls = log();
        let key = RegistrationKey::next();

        let sink = calls.clone();
        processor
            .register_handler_by_key::<Ping, _>(key, move |_: &mut (), _: &Ping, _: bool, _: &()| {
                sink.borrow_mut().push("first".into())
            })
            .unwrap();
        let sink = calls.clone();
        let again = processor
            .register_handler_by_key::<Ping, _>(key, move |_: &mut (), _: &Ping, _: bool, _: &()| {
                sink.borrow_mut().push("second".into())
            })
            .unwrap();

        assert_eq!(again, key);
        processor.process(&Ping(0)).unwrap();
        assert_eq!(*calls.borrow(), vec!["first"]);
    }

    #[test]
    fn test_dispose_mid_dispatch_finishes_current_call() {
        let processor = Rc::new(EventProcessor::<(), ()>::new());
        let calls = log();

        let weak = Rc::downgrade(&processor);
        let sink = calls.clone();
        processor
            .on(move |_: &Ping| {
                sink.borrow_mut().push("disposing".into());
                if let Some(processor) = weak.upgrade() {
                    processor.dispose().unwrap();
                }
            })
            .unwrap();
        let sink = calls.clone();
        processor.on(move |_: &Ping| sink.borrow_mut().push("still runs".into())).unwrap();

        processor.process(&Ping(0)).unwrap();
        assert_eq!(*calls.borrow(), vec!["disposing", "still runs"]);
        assert!(!processor.process(&Ping(0)).unwrap().handled);
    }
}
