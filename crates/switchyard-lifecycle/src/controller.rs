//! The lifecycle controller.
//!
//! Drives registered components through `Setup → Start → Update`, tears them
//! down on `dispose`, and runs the cancellation protocol during setup.
//!
//! # Reentrancy
//!
//! Components may call back into the controller from any role method: report
//! an error, acknowledge a cancellation, register more components. No borrow
//! of the controller's state is held while a component runs; loops re-read
//! the role lists by index and stop as soon as the phase turns to `Cleanup`.
//!
//! # Cancellation
//!
//! `cancel()` hands every cancel component the controller as its listener and
//! asks each to cancel. Once every component acknowledged, the listeners are
//! told whether all of them succeeded. On success the controller stops (and,
//! with `dispose_after_cancel`, cleans up first). On failure it stays in
//! `Setup` and [`cancel_state`](LifecycleController::cancel_state) reports
//! [`CancelState::Failed`]; calling `cancel()` again retries, `dispose()`
//! gives up.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, info, trace, warn};

use crate::component::{CancelListener, Component, ErrorHandler, Role};
use crate::error::{ComponentError, LifecycleError, LifecycleResult};
use crate::phase::Phase;
use crate::scheduler::{Scheduler, TimeMode, Updateable};

/// Options fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// Dispose the controller after a successful cancellation.
    pub dispose_after_cancel: bool,
    /// Clock the controller is scheduled with.
    pub time_mode: TimeMode,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            dispose_after_cancel: true,
            time_mode: TimeMode::Scaled,
        }
    }
}

/// Progress of the cancellation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelState {
    /// No cancellation is running.
    #[default]
    Idle,
    /// Waiting for acknowledgements.
    Pending {
        /// Acknowledgements received so far.
        acknowledged: usize,
        /// How many of them reported success.
        successful: usize,
        /// Acknowledgements needed to conclude.
        expected: usize,
    },
    /// At least one component failed to cancel; the controller stays in `Setup`.
    Failed,
}

#[derive(Default)]
struct Roles {
    setup: Vec<Rc<dyn Component>>,
    start: Vec<Rc<dyn Component>>,
    update: Vec<Rc<dyn Component>>,
    cleanup: Vec<Rc<dyn Component>>,
    cancel: Vec<Rc<dyn Component>>,
    cancel_listeners: Vec<Rc<dyn Component>>,
    error_dispatchers: Vec<Rc<dyn Component>>,
    error_handlers: Vec<Rc<dyn Component>>,
}

impl Roles {
    fn list(&self, role: Role) -> &Vec<Rc<dyn Component>> {
        match role {
            Role::Setup => &self.setup,
            Role::Start => &self.start,
            Role::Update => &self.update,
            Role::Cleanup => &self.cleanup,
            Role::Cancel => &self.cancel,
            Role::CancelListener => &self.cancel_listeners,
            Role::ErrorDispatcher => &self.error_dispatchers,
            Role::ErrorHandler => &self.error_handlers,
        }
    }

    fn list_mut(&mut self, role: Role) -> &mut Vec<Rc<dyn Component>> {
        match role {
            Role::Setup => &mut self.setup,
            Role::Start => &mut self.start,
            Role::Update => &mut self.update,
            Role::Cleanup => &mut self.cleanup,
            Role::Cancel => &mut self.cancel,
            Role::CancelListener => &mut self.cancel_listeners,
            Role::ErrorDispatcher => &mut self.error_dispatchers,
            Role::ErrorHandler => &mut self.error_handlers,
        }
    }
}

fn same_component(a: &Rc<dyn Component>, b: &Rc<dyn Component>) -> bool {
    Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
}

/// Drives a set of components through their lifecycle.
///
/// Always handled through an `Rc`; the controller hands weak references to
/// itself to its scheduler, cancel components and error dispatchers.
pub struct LifecycleController {
    this: Weak<LifecycleController>,
    scheduler: Option<Rc<dyn Scheduler>>,
    time_mode: TimeMode,
    dispose_after_cancel: Cell<bool>,
    phase: Cell<Phase>,
    roles: RefCell<Roles>,
    setup_cursor: Cell<usize>,
    setup_started: Cell<bool>,
    cancel_state: Cell<CancelState>,
}

impl LifecycleController {
    /// Creates a stopped controller with default options.
    pub fn new(scheduler: Option<Rc<dyn Scheduler>>) -> Rc<Self> {
        Self::with_options(scheduler, LifecycleOptions::default())
    }

    /// Creates a stopped controller.
    pub fn with_options(scheduler: Option<Rc<dyn Scheduler>>, options: LifecycleOptions) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            scheduler,
            time_mode: options.time_mode,
            dispose_after_cancel: Cell::new(options.dispose_after_cancel),
            phase: Cell::new(Phase::Stopped),
            roles: RefCell::new(Roles::default()),
            setup_cursor: Cell::new(0),
            setup_started: Cell::new(false),
            cancel_state: Cell::new(CancelState::Idle),
        })
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    /// Returns the progress of the cancellation protocol.
    pub fn cancel_state(&self) -> CancelState {
        self.cancel_state.get()
    }

    /// Returns whether a successful cancellation disposes the controller.
    pub fn dispose_after_cancel(&self) -> bool {
        self.dispose_after_cancel.get()
    }

    /// Sets whether a successful cancellation disposes the controller.
    pub fn set_dispose_after_cancel(&self, enabled: bool) {
        self.dispose_after_cancel.set(enabled);
    }

    /// Returns the clock the controller is scheduled with.
    pub fn time_mode(&self) -> TimeMode {
        self.time_mode
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Registers `component` for every role it plays and returns it.
    ///
    /// Registering the same component twice has no effect.
    pub fn register_component<C: Component>(&self, component: Rc<C>) -> Rc<C> {
        let erased: Rc<dyn Component> = component.clone();
        for role in Role::ALL {
            self.register_role(role, &erased);
        }
        component
    }

    /// Registers a setup component. Returns `false` if it does not play the
    /// role or is already registered for it.
    pub fn register_setup_component(&self, component: Rc<dyn Component>) -> bool {
        self.register_role(Role::Setup, &component)
    }

    /// Registers a start component.
    pub fn register_start_component(&self, component: Rc<dyn Component>) -> bool {
        self.register_role(Role::Start, &component)
    }

    /// Registers an update component.
    pub fn register_update_component(&self, component: Rc<dyn Component>) -> bool {
        self.register_role(Role::Update, &component)
    }

    /// Registers a cleanup component.
    pub fn register_cleanup_component(&self, component: Rc<dyn Component>) -> bool {
        self.register_role(Role::Cleanup, &component)
    }

    /// Registers a cancel component.
    pub fn register_cancel_component(&self, component: Rc<dyn Component>) -> bool {
        self.register_role(Role::Cancel, &component)
    }

    /// Registers a cancel listener.
    pub fn register_cancel_listener(&self, component: Rc<dyn Component>) -> bool {
        self.register_role(Role::CancelListener, &component)
    }

    /// Registers an error dispatcher and makes the controller its handler.
    pub fn register_error_dispatcher(&self, component: Rc<dyn Component>) -> bool {
        self.register_role(Role::ErrorDispatcher, &component)
    }

    /// Registers an error handler.
    pub fn register_error_handler(&self, component: Rc<dyn Component>) -> bool {
        self.register_role(Role::ErrorHandler, &component)
    }

    fn register_role(&self, role: Role, component: &Rc<dyn Component>) -> bool {
        if !role.supported_by(component.as_ref()) {
            return false;
        }
        {
            let mut roles = self.roles.borrow_mut();
            let list = roles.list_mut(role);
            if list.iter().any(|existing| same_component(existing, component)) {
                return false;
            }
            list.push(Rc::clone(component));
        }
        trace!(role = role.as_str(), "Registered component");

        if role == Role::ErrorDispatcher
            && let Some(dispatcher) = component.as_error_dispatcher()
        {
            dispatcher.set_handler(Some(self.as_error_handler()));
        }
        true
    }

    // ------------------------------------------------------------------
    // Phase control
    // ------------------------------------------------------------------

    /// Enters `Setup` and, with a scheduler, schedules the controller.
    ///
    /// # Errors
    ///
    /// Fails unless the controller is `Stopped`.
    pub fn start(&self) -> LifecycleResult<()> {
        let phase = self.phase.get();
        if phase != Phase::Stopped {
            return Err(LifecycleError::invalid_phase("start", phase, Phase::Stopped));
        }
        self.setup_cursor.set(0);
        self.setup_started.set(false);
        self.cancel_state.set(CancelState::Idle);
        self.transition(Phase::Setup);

        if let Some(scheduler) = &self.scheduler {
            scheduler.add(self.as_updateable(), self.time_mode, 0.0);
        }
        Ok(())
    }

    /// Starts the cancellation protocol.
    ///
    /// # Errors
    ///
    /// Fails unless the controller is in `Setup`.
    pub fn cancel(&self) -> LifecycleResult<()> {
        let phase = self.phase.get();
        if phase != Phase::Setup {
            return Err(LifecycleError::invalid_phase("cancel", phase, Phase::Setup));
        }

        let components = self.roles.borrow().cancel.clone();
        for component in &components {
            if let Some(cancel) = component.as_cancel() {
                cancel.set_listener(Some(self.as_cancel_listener()));
            }
        }
        self.cancel_state.set(CancelState::Pending {
            acknowledged: 0,
            successful: 0,
            expected: components.len(),
        });
        debug!(components = components.len(), "Cancelling setup");

        self.conclude_cancel();
        for component in &components {
            if !matches!(self.cancel_state.get(), CancelState::Pending { .. }) {
                break;
            }
            if let Some(cancel) = component.as_cancel() {
                cancel.cancel();
            }
        }
        Ok(())
    }

    /// Advances the current phase by one tick.
    pub fn update(&self, dt: f32) {
        match self.phase.get() {
            Phase::Setup => self.run_setup(dt),
            Phase::Start => self.run_start(),
            Phase::Update => self.run_update(dt),
            Phase::Stopped | Phase::Cleanup => {}
        }
    }

    /// Reports an error: every error handler is notified, then the controller
    /// is disposed.
    pub fn on_error(&self, error: &ComponentError) {
        warn!(code = ?error.code(), %error, phase = %self.phase.get(), "Component reported an error");
        let mut index = 0;
        while let Some(component) = self.nth(Role::ErrorHandler, index) {
            if let Some(handler) = component.as_error_handler() {
                handler.on_error(error);
            }
            index += 1;
        }
        self.dispose();
    }

    /// Tears the controller down.
    ///
    /// Cleanup components are cleaned in registration order, except those
    /// that are also setup components whose setup step had not completed.
    /// A setup step that was started but never finished is not cleaned
    /// either; such a component must release what it acquired itself.
    /// All registrations are dropped afterwards.
    pub fn dispose(&self) {
        self.transition(Phase::Cleanup);
        self.unschedule();

        let cursor = self.setup_cursor.get();
        let roles = std::mem::take(&mut *self.roles.borrow_mut());
        self.setup_cursor.set(0);
        self.setup_started.set(false);
        self.cancel_state.set(CancelState::Idle);

        for component in &roles.cleanup {
            let Some(cleanup) = component.as_cleanup() else {
                continue;
            };
            let setup_index = component
                .as_setup()
                .and_then(|_| roles.setup.iter().position(|setup| same_component(setup, component)));
            match setup_index {
                Some(index) if index >= cursor => {
                    trace!(index, cursor, "Skipping cleanup of unfinished setup component");
                }
                _ => cleanup.cleanup(),
            }
        }

        for component in &roles.error_dispatchers {
            if let Some(dispatcher) = component.as_error_dispatcher() {
                dispatcher.set_handler(None);
            }
        }
        for component in &roles.cancel {
            if let Some(cancel) = component.as_cancel() {
                cancel.set_listener(None);
            }
        }
    }

    // ------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------

    fn run_setup(&self, dt: f32) {
        let cursor = self.setup_cursor.get();
        if let Some(component) = self.nth(Role::Setup, cursor)
            && let Some(setup) = component.as_setup()
        {
            if !self.setup_started.replace(true) {
                setup.start();
            }
            if self.phase.get() != Phase::Setup {
                return;
            }
            setup.update(dt);
            if self.phase.get() != Phase::Setup {
                return;
            }
            if setup.finished() {
                trace!(step = cursor, "Setup step finished");
                self.setup_cursor.set(cursor + 1);
                self.setup_started.set(false);
            }
        }

        if self.phase.get() == Phase::Setup && self.setup_cursor.get() >= self.roles.borrow().setup.len() {
            self.transition(Phase::Start);
        }
    }

    fn run_start(&self) {
        let mut index = 0;
        while self.phase.get() != Phase::Cleanup
            && let Some(component) = self.nth(Role::Start, index)
        {
            if let Some(start) = component.as_start() {
                start.start();
            }
            index += 1;
        }
        // An error raised by a start component has already disposed the
        // controller; the phase still moves on to `Update`.
        self.transition(Phase::Update);
    }

    fn run_update(&self, dt: f32) {
        let mut index = 0;
        while self.phase.get() != Phase::Cleanup
            && let Some(component) = self.nth(Role::Update, index)
        {
            if let Some(update) = component.as_update() {
                update.update(dt);
            }
            index += 1;
        }
    }

    // ------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------

    fn acknowledge_cancel(&self, successful: bool) {
        let CancelState::Pending {
            acknowledged,
            successful: succeeded,
            expected,
        } = self.cancel_state.get()
        else {
            warn!(successful, "Cancel acknowledgement received with no cancellation pending");
            return;
        };
        self.cancel_state.set(CancelState::Pending {
            acknowledged: acknowledged + 1,
            successful: succeeded + usize::from(successful),
            expected,
        });
        self.conclude_cancel();
    }

    fn conclude_cancel(&self) {
        let CancelState::Pending {
            acknowledged,
            successful,
            expected,
        } = self.cancel_state.get()
        else {
            return;
        };
        if acknowledged < expected {
            return;
        }

        let all_successful = successful == acknowledged;
        info!(acknowledged, successful = all_successful, "Cancellation concluded");
        self.cancel_state.set(if all_successful {
            CancelState::Idle
        } else {
            CancelState::Failed
        });

        let mut index = 0;
        while let Some(component) = self.nth(Role::CancelListener, index) {
            if let Some(listener) = component.as_cancel_listener() {
                listener.on_cancelled(all_successful);
            }
            index += 1;
        }

        if all_successful {
            self.unschedule();
            if self.dispose_after_cancel.get() {
                self.dispose();
            }
            self.transition(Phase::Stopped);
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn nth(&self, role: Role, index: usize) -> Option<Rc<dyn Component>> {
        self.roles.borrow().list(role).get(index).cloned()
    }

    fn transition(&self, next: Phase) {
        let previous = self.phase.replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Lifecycle phase changed");
        }
    }

    fn unschedule(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.remove(&self.as_updateable());
        }
    }

    fn as_updateable(&self) -> Weak<dyn Updateable> {
        self.this.clone()
    }

    fn as_cancel_listener(&self) -> Weak<dyn CancelListener> {
        self.this.clone()
    }

    fn as_error_handler(&self) -> Weak<dyn ErrorHandler> {
        self.this.clone()
    }
}

impl Updateable for LifecycleController {
    fn update(&self, dt: f32) {
        LifecycleController::update(self, dt);
    }
}

impl CancelListener for LifecycleController {
    fn on_cancelled(&self, successful: bool) {
        self.acknowledge_cancel(successful);
    }
}

impl ErrorHandler for LifecycleController {
    fn on_error(&self, error: &ComponentError) {
        LifecycleController::on_error(self, error);
    }
}

impl fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roles = self.roles.borrow();
        let mut debug = f.debug_struct("LifecycleController");
        debug
            .field("phase", &self.phase.get())
            .field("setup_cursor", &self.setup_cursor.get())
            .field("cancel_state", &self.cancel_state.get());
        for role in Role::ALL {
            debug.field(role.as_str(), &roles.list(role).len());
        }
        debug.finish()
    }
}
