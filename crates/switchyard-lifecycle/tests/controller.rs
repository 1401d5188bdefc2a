//! Controller behaviour, driven with recorder components.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use switchyard_lifecycle::{
    CancelComponent, CancelListener, CancelState, CleanupComponent, ComponentError, ErrorDispatcher, ErrorHandler,
    LifecycleController, LifecycleError, LifecycleOptions, Phase, Scheduler, SetupComponent, StartComponent, TimeMode,
    UpdateComponent, Updateable, same_target,
};
use switchyard_macros::Component;

const DT: f32 = 0.33;

type Journal = Rc<RefCell<Vec<String>>>;

fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.borrow().clone()
}

fn record(journal: &Journal, name: &str, event: &str) {
    journal.borrow_mut().push(format!("{name}.{event}"));
}

// ----------------------------------------------------------------------
// Recorder components
// ----------------------------------------------------------------------

/// Setup step that finishes after a fixed number of updates, then ticks.
#[derive(Component)]
#[component(setup, update, cleanup)]
struct Loader {
    name: &'static str,
    journal: Journal,
    ticks_needed: u32,
    ticks: Cell<u32>,
}

impl Loader {
    fn new(name: &'static str, journal: &Journal, ticks_needed: u32) -> Rc<Self> {
        Rc::new(Self {
            name,
            journal: journal.clone(),
            ticks_needed,
            ticks: Cell::new(0),
        })
    }
}

impl SetupComponent for Loader {
    fn start(&self) {
        record(&self.journal, self.name, "setup_start");
    }

    fn update(&self, _dt: f32) {
        self.ticks.set(self.ticks.get() + 1);
        record(&self.journal, self.name, "setup_update");
    }

    fn finished(&self) -> bool {
        self.ticks.get() >= self.ticks_needed
    }
}

impl UpdateComponent for Loader {
    fn update(&self, _dt: f32) {
        record(&self.journal, self.name, "update");
    }
}

impl CleanupComponent for Loader {
    fn cleanup(&self) {
        record(&self.journal, self.name, "cleanup");
    }
}

/// Setup step without an update role.
#[derive(Component)]
#[component(setup, cleanup)]
struct Warmup {
    name: &'static str,
    journal: Journal,
    done: Cell<bool>,
}

impl Warmup {
    fn new(name: &'static str, journal: &Journal, done: bool) -> Rc<Self> {
        Rc::new(Self {
            name,
            journal: journal.clone(),
            done: Cell::new(done),
        })
    }
}

impl SetupComponent for Warmup {
    fn start(&self) {
        record(&self.journal, self.name, "setup_start");
    }

    fn update(&self, _dt: f32) {
        record(&self.journal, self.name, "setup_update");
    }

    fn finished(&self) -> bool {
        self.done.get()
    }
}

impl CleanupComponent for Warmup {
    fn cleanup(&self) {
        record(&self.journal, self.name, "cleanup");
    }
}

#[derive(Component)]
#[component(update)]
struct Ticker {
    name: &'static str,
    journal: Journal,
    last_dt: Cell<f32>,
}

impl Ticker {
    fn new(name: &'static str, journal: &Journal) -> Rc<Self> {
        Rc::new(Self {
            name,
            journal: journal.clone(),
            last_dt: Cell::new(0.0),
        })
    }
}

impl UpdateComponent for Ticker {
    fn update(&self, dt: f32) {
        self.last_dt.set(dt);
        record(&self.journal, self.name, "update");
    }
}

#[derive(Component)]
#[component(start, cleanup)]
struct Greeter {
    journal: Journal,
}

impl StartComponent for Greeter {
    fn start(&self) {
        record(&self.journal, "greeter", "start");
    }
}

impl CleanupComponent for Greeter {
    fn cleanup(&self) {
        record(&self.journal, "greeter", "cleanup");
    }
}

/// Cancel component that answers immediately, or waits to be told.
#[derive(Component)]
#[component(cancel)]
struct Canceller {
    reply: Option<bool>,
    listener: RefCell<Option<Weak<dyn CancelListener>>>,
    cancelled: Cell<u32>,
}

impl Canceller {
    fn new(reply: Option<bool>) -> Rc<Self> {
        Rc::new(Self {
            reply,
            listener: RefCell::new(None),
            cancelled: Cell::new(0),
        })
    }

    fn acknowledge(&self, successful: bool) {
        let listener = self.listener.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(listener) = listener {
            listener.on_cancelled(successful);
        }
    }
}

impl CancelComponent for Canceller {
    fn set_listener(&self, listener: Option<Weak<dyn CancelListener>>) {
        *self.listener.borrow_mut() = listener;
    }

    fn cancel(&self) {
        self.cancelled.set(self.cancelled.get() + 1);
        if let Some(reply) = self.reply {
            self.acknowledge(reply);
        }
    }
}

#[derive(Component)]
#[component(cancel_listener)]
struct Outcomes {
    seen: RefCell<Vec<bool>>,
}

impl CancelListener for Outcomes {
    fn on_cancelled(&self, successful: bool) {
        self.seen.borrow_mut().push(successful);
    }
}

/// Fails on its first update by reporting to its error handler.
#[derive(Component)]
#[component(setup, update, error_dispatcher)]
struct Faulty {
    handler: RefCell<Option<Weak<dyn ErrorHandler>>>,
}

impl Faulty {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            handler: RefCell::new(None),
        })
    }

    fn fail(&self) {
        let handler = self.handler.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(handler) = handler {
            handler.on_error(&ComponentError::with_code(7, "boom"));
        }
    }
}

impl SetupComponent for Faulty {
    fn start(&self) {}

    fn update(&self, _dt: f32) {
        self.fail();
    }

    fn finished(&self) -> bool {
        false
    }
}

impl UpdateComponent for Faulty {
    fn update(&self, _dt: f32) {
        self.fail();
    }
}

impl ErrorDispatcher for Faulty {
    fn set_handler(&self, handler: Option<Weak<dyn ErrorHandler>>) {
        *self.handler.borrow_mut() = handler;
    }
}

/// Start component that reports an error as soon as it starts.
#[derive(Component)]
#[component(start, error_dispatcher)]
struct Misfire {
    journal: Journal,
    handler: RefCell<Option<Weak<dyn ErrorHandler>>>,
}

impl StartComponent for Misfire {
    fn start(&self) {
        record(&self.journal, "misfire", "start");
        let handler = self.handler.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(handler) = handler {
            handler.on_error(&ComponentError::new("misfire"));
        }
    }
}

impl ErrorDispatcher for Misfire {
    fn set_handler(&self, handler: Option<Weak<dyn ErrorHandler>>) {
        *self.handler.borrow_mut() = handler;
    }
}

#[derive(Component)]
#[component(error_handler)]
struct ErrorLog {
    errors: RefCell<Vec<ComponentError>>,
}

impl ErrorHandler for ErrorLog {
    fn on_error(&self, error: &ComponentError) {
        self.errors.borrow_mut().push(error.clone());
    }
}

#[derive(Default)]
struct RecordingScheduler {
    targets: RefCell<Vec<(Weak<dyn Updateable>, TimeMode, f32)>>,
    removals: Cell<u32>,
}

impl RecordingScheduler {
    fn tick(&self, dt: f32) {
        let targets: Vec<_> = self.targets.borrow().iter().map(|(target, ..)| target.clone()).collect();
        for target in targets.iter().filter_map(Weak::upgrade) {
            target.update(dt);
        }
    }
}

impl Scheduler for RecordingScheduler {
    fn add(&self, target: Weak<dyn Updateable>, mode: TimeMode, initial_delay: f32) {
        self.targets.borrow_mut().push((target, mode, initial_delay));
    }

    fn remove(&self, target: &Weak<dyn Updateable>) {
        self.removals.set(self.removals.get() + 1);
        self.targets.borrow_mut().retain(|(existing, ..)| !same_target(existing, target));
    }
}

fn started() -> Rc<LifecycleController> {
    let controller = LifecycleController::new(None);
    controller.start().unwrap();
    controller
}

// ----------------------------------------------------------------------
// Phases
// ----------------------------------------------------------------------

#[test]
fn test_setup_steps_run_in_order_before_updates() {
    let log = journal();
    let controller = started();
    controller.register_component(Loader::new("a", &log, 2));
    controller.register_component(Warmup::new("b", &log, true));
    controller.register_component(Ticker::new("c", &log));

    controller.update(DT);
    controller.update(DT);
    assert_eq!(controller.phase(), Phase::Setup);
    assert_eq!(entries(&log), vec!["a.setup_start", "a.setup_update", "a.setup_update"]);

    log.borrow_mut().clear();
    controller.update(DT);
    assert_eq!(controller.phase(), Phase::Start);
    assert_eq!(entries(&log), vec!["b.setup_start", "b.setup_update"]);

    log.borrow_mut().clear();
    controller.update(DT);
    assert_eq!(controller.phase(), Phase::Update);
    assert!(entries(&log).is_empty());

    controller.update(DT);
    controller.update(DT);
    assert_eq!(entries(&log), vec!["a.update", "c.update", "a.update", "c.update"]);
}

#[test]
fn test_empty_setup_moves_straight_to_start() {
    let log = journal();
    let controller = started();
    let ticker = controller.register_component(Ticker::new("c", &log));

    controller.update(DT);
    controller.update(DT);
    assert!(entries(&log).is_empty());

    controller.update(DT);
    assert_eq!(entries(&log), vec!["c.update"]);
    assert_eq!(ticker.last_dt.get(), DT);
}

#[test]
fn test_start_components_run_once() {
    let log = journal();
    let controller = started();
    controller.register_component(Rc::new(Greeter { journal: log.clone() }));

    for _ in 0..4 {
        controller.update(DT);
    }
    assert_eq!(entries(&log), vec!["greeter.start"]);
    assert_eq!(controller.phase(), Phase::Update);
}

#[test]
fn test_registering_twice_is_idempotent() {
    let log = journal();
    let controller = started();
    let ticker = Ticker::new("c", &log);
    controller.register_component(ticker.clone());
    controller.register_component(ticker.clone());
    assert!(!controller.register_update_component(ticker.clone()));
    assert!(!controller.register_setup_component(ticker));

    for _ in 0..3 {
        controller.update(DT);
    }
    assert_eq!(entries(&log), vec!["c.update"]);
}

#[test]
fn test_start_and_cancel_check_the_phase() {
    let controller = started();
    assert_eq!(
        controller.start(),
        Err(LifecycleError::invalid_phase("start", Phase::Setup, Phase::Stopped))
    );

    controller.update(DT);
    assert_eq!(controller.phase(), Phase::Start);
    assert!(matches!(
        controller.cancel(),
        Err(LifecycleError::InvalidPhase { phase: Phase::Start, .. })
    ));

    let stopped = LifecycleController::new(None);
    assert!(stopped.cancel().is_err());
    stopped.update(DT);
    assert_eq!(stopped.phase(), Phase::Stopped);
}

// ----------------------------------------------------------------------
// Dispose
// ----------------------------------------------------------------------

#[test]
fn test_dispose_skips_cleanup_of_unfinished_setup() {
    let log = journal();
    let controller = started();
    controller.register_component(Loader::new("a", &log, 1));
    controller.register_component(Warmup::new("b", &log, false));

    for _ in 0..3 {
        controller.update(DT);
    }
    log.borrow_mut().clear();

    controller.dispose();
    assert_eq!(entries(&log), vec!["a.cleanup"]);
    assert_eq!(controller.phase(), Phase::Cleanup);
}

#[test]
fn test_dispose_before_start_only_cleans_components_without_setup() {
    let log = journal();
    let controller = LifecycleController::new(None);
    controller.register_component(Warmup::new("b", &log, true));
    controller.register_component(Rc::new(Greeter { journal: log.clone() }));

    controller.dispose();
    assert_eq!(entries(&log), vec!["greeter.cleanup"]);
}

#[test]
fn test_dispose_drops_registrations() {
    let log = journal();
    let controller = started();
    controller.register_component(Ticker::new("c", &log));
    controller.dispose();

    for _ in 0..3 {
        controller.update(DT);
    }
    assert!(entries(&log).is_empty());
}

// ----------------------------------------------------------------------
// Errors
// ----------------------------------------------------------------------

#[test]
fn test_error_during_setup_tears_down() {
    let log = journal();
    let controller = started();
    let errors = Rc::new(ErrorLog {
        errors: RefCell::new(Vec::new()),
    });
    controller.register_component(Faulty::new());
    controller.register_component(Ticker::new("c", &log));
    controller.register_component(errors.clone());

    controller.update(DT);
    controller.update(DT);

    assert_eq!(controller.phase(), Phase::Cleanup);
    assert!(entries(&log).is_empty());
    assert_eq!(*errors.errors.borrow(), vec![ComponentError::with_code(7, "boom")]);
}

#[test]
fn test_error_during_update_stops_the_tick() {
    let log = journal();
    let controller = started();
    let errors = Rc::new(ErrorLog {
        errors: RefCell::new(Vec::new()),
    });
    let faulty = Faulty::new();
    controller.register_update_component(faulty.clone());
    controller.register_error_dispatcher(faulty);
    controller.register_component(Ticker::new("c", &log));
    controller.register_component(errors.clone());

    controller.update(DT);
    controller.update(DT);
    controller.update(DT);
    controller.update(DT);

    assert!(entries(&log).is_empty());
    assert_eq!(errors.errors.borrow().len(), 1);
    assert_eq!(controller.phase(), Phase::Cleanup);
}

#[test]
fn test_error_during_start_aborts_remaining_starts() {
    let log = journal();
    let controller = started();
    controller.register_component(Rc::new(Misfire {
        journal: log.clone(),
        handler: RefCell::new(None),
    }));
    controller.register_component(Rc::new(Greeter { journal: log.clone() }));

    controller.update(DT);
    assert_eq!(controller.phase(), Phase::Start);
    controller.update(DT);

    assert_eq!(entries(&log), vec!["misfire.start", "greeter.cleanup"]);
    assert_eq!(controller.phase(), Phase::Update);

    controller.update(DT);
    assert_eq!(entries(&log), vec!["misfire.start", "greeter.cleanup"]);
}

#[test]
fn test_dispose_detaches_error_dispatchers() {
    let controller = started();
    let faulty = controller.register_component(Faulty::new());
    assert!(faulty.handler.borrow().is_some());

    controller.dispose();
    assert!(faulty.handler.borrow().is_none());
}

// ----------------------------------------------------------------------
// Cancellation
// ----------------------------------------------------------------------

fn outcomes() -> Rc<Outcomes> {
    Rc::new(Outcomes {
        seen: RefCell::new(Vec::new()),
    })
}

#[test]
fn test_successful_cancel_stops_and_disposes() {
    let log = journal();
    let controller = started();
    let listener = controller.register_component(outcomes());
    controller.register_component(Canceller::new(Some(true)));
    controller.register_component(Canceller::new(Some(true)));
    controller.register_component(Rc::new(Greeter { journal: log.clone() }));

    controller.cancel().unwrap();

    assert_eq!(*listener.seen.borrow(), vec![true]);
    assert_eq!(controller.phase(), Phase::Stopped);
    assert_eq!(controller.cancel_state(), CancelState::Idle);
    assert_eq!(entries(&log), vec!["greeter.cleanup"]);
}

#[test]
fn test_failed_cancel_leaves_controller_in_setup() {
    let log = journal();
    let controller = started();
    let listener = controller.register_component(outcomes());
    controller.register_component(Canceller::new(Some(true)));
    controller.register_component(Canceller::new(Some(false)));
    controller.register_component(Rc::new(Greeter { journal: log.clone() }));

    controller.cancel().unwrap();

    assert_eq!(*listener.seen.borrow(), vec![false]);
    assert_eq!(controller.phase(), Phase::Setup);
    assert_eq!(controller.cancel_state(), CancelState::Failed);
    assert!(entries(&log).is_empty());
}

#[test]
fn test_cancel_waits_for_every_acknowledgement() {
    let controller = started();
    let listener = controller.register_component(outcomes());
    let first = controller.register_component(Canceller::new(None));
    let second = controller.register_component(Canceller::new(None));

    controller.cancel().unwrap();
    assert_eq!(first.cancelled.get(), 1);
    assert_eq!(second.cancelled.get(), 1);
    assert_eq!(
        controller.cancel_state(),
        CancelState::Pending {
            acknowledged: 0,
            successful: 0,
            expected: 2
        }
    );

    first.acknowledge(true);
    assert!(listener.seen.borrow().is_empty());
    assert_eq!(controller.phase(), Phase::Setup);

    second.acknowledge(true);
    assert_eq!(*listener.seen.borrow(), vec![true]);
    assert_eq!(controller.phase(), Phase::Stopped);
    assert!(first.listener.borrow().is_none());
}

#[test]
fn test_cancel_without_components_succeeds_immediately() {
    let controller = started();
    let listener = controller.register_component(outcomes());

    controller.cancel().unwrap();

    assert_eq!(*listener.seen.borrow(), vec![true]);
    assert_eq!(controller.phase(), Phase::Stopped);
}

#[test]
fn test_cancel_can_keep_components_for_a_restart() {
    let log = journal();
    let controller = LifecycleController::with_options(
        None,
        LifecycleOptions {
            dispose_after_cancel: false,
            ..LifecycleOptions::default()
        },
    );
    controller.register_component(Ticker::new("c", &log));
    controller.register_component(Canceller::new(Some(true)));

    controller.start().unwrap();
    controller.cancel().unwrap();
    assert_eq!(controller.phase(), Phase::Stopped);

    controller.start().unwrap();
    for _ in 0..3 {
        controller.update(DT);
    }
    assert_eq!(entries(&log), vec!["c.update"]);
}

#[test]
fn test_failed_cancel_can_be_retried() {
    let controller = started();
    let canceller = controller.register_component(Canceller::new(None));

    controller.cancel().unwrap();
    canceller.acknowledge(false);
    assert_eq!(controller.cancel_state(), CancelState::Failed);

    controller.cancel().unwrap();
    canceller.acknowledge(true);
    assert_eq!(controller.phase(), Phase::Stopped);
}

// ----------------------------------------------------------------------
// Scheduler
// ----------------------------------------------------------------------

#[test]
fn test_scheduler_drives_the_controller() {
    let log = journal();
    let scheduler = Rc::new(RecordingScheduler::default());
    let controller = LifecycleController::new(Some(scheduler.clone()));
    controller.register_component(Ticker::new("c", &log));

    controller.start().unwrap();
    {
        let targets = scheduler.targets.borrow();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].1, TimeMode::Scaled);
        assert_eq!(targets[0].2, 0.0);
    }

    for _ in 0..3 {
        scheduler.tick(DT);
    }
    assert_eq!(entries(&log), vec!["c.update"]);

    controller.dispose();
    assert!(scheduler.targets.borrow().is_empty());
    assert_eq!(scheduler.removals.get(), 1);
}

#[test]
fn test_successful_cancel_unschedules() {
    let scheduler = Rc::new(RecordingScheduler::default());
    let controller = LifecycleController::with_options(
        Some(scheduler.clone()),
        LifecycleOptions {
            dispose_after_cancel: false,
            time_mode: TimeMode::Unscaled,
        },
    );

    controller.start().unwrap();
    assert_eq!(scheduler.targets.borrow()[0].1, TimeMode::Unscaled);

    controller.cancel().unwrap();
    assert!(scheduler.targets.borrow().is_empty());
}
