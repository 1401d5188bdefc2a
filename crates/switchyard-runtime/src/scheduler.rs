//! A single-threaded tick scheduler.
//!
//! The host calls [`TickScheduler::tick`] with the frame time; every
//! registered target is updated with either the scaled or the raw time,
//! depending on the [`TimeMode`] it was added with.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use switchyard_lifecycle::{Scheduler, TimeMode, Updateable, same_target};
use tracing::trace;

struct Entry {
    target: Weak<dyn Updateable>,
    mode: TimeMode,
    delay: Cell<f32>,
    removed: Cell<bool>,
}

impl Entry {
    /// Consumes `dt` from the remaining delay; returns whether the target is due.
    fn advance(&self, dt: f32) -> bool {
        let remaining = self.delay.get();
        if remaining <= 0.0 {
            return true;
        }
        let remaining = remaining - dt;
        self.delay.set(remaining.max(0.0));
        remaining <= 0.0
    }
}

/// Drives [`Updateable`] targets from a host loop.
///
/// Targets may add or remove targets while being ticked. Targets added during
/// a tick are first ticked on the next one; targets removed during a tick are
/// not ticked again, even later in the same tick. Dropped targets are pruned.
pub struct TickScheduler {
    time_scale: Cell<f32>,
    entries: RefCell<Vec<Rc<Entry>>>,
}

impl TickScheduler {
    /// Creates a scheduler with a time scale of 1.
    pub fn new() -> Self {
        Self::with_time_scale(1.0)
    }

    /// Creates a scheduler with the given time scale.
    pub fn with_time_scale(time_scale: f32) -> Self {
        Self {
            time_scale: Cell::new(time_scale),
            entries: RefCell::new(Vec::new()),
        }
    }

    /// Returns the multiplier applied to scaled time.
    pub fn time_scale(&self) -> f32 {
        self.time_scale.get()
    }

    /// Sets the multiplier applied to scaled time. Zero pauses scaled targets.
    pub fn set_time_scale(&self, time_scale: f32) {
        self.time_scale.set(time_scale);
    }

    /// Returns the number of live targets.
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| entry.target.strong_count() > 0)
            .count()
    }

    /// Returns `true` if no live target is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `target` is registered.
    pub fn contains(&self, target: &Weak<dyn Updateable>) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|entry| same_target(&entry.target, target))
    }

    /// Advances every target by `dt` seconds of unscaled time.
    pub fn tick(&self, dt: f32) {
        let scaled = dt * self.time_scale.get();
        let due: Vec<Rc<Entry>> = {
            let mut entries = self.entries.borrow_mut();
            entries.retain(|entry| entry.target.strong_count() > 0);
            entries.clone()
        };
        trace!(dt, scaled, targets = due.len(), "Tick");

        for entry in due {
            if entry.removed.get() {
                continue;
            }
            let dt = match entry.mode {
                TimeMode::Scaled => scaled,
                TimeMode::Unscaled => dt,
            };
            if !entry.advance(dt) {
                continue;
            }
            if let Some(target) = entry.target.upgrade() {
                target.update(dt);
            }
        }
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TickScheduler {
    fn add(&self, target: Weak<dyn Updateable>, mode: TimeMode, initial_delay: f32) {
        if self.contains(&target) {
            trace!("Target already scheduled");
            return;
        }
        self.entries.borrow_mut().push(Rc::new(Entry {
            target,
            mode,
            delay: Cell::new(initial_delay.max(0.0)),
            removed: Cell::new(false),
        }));
    }

    fn remove(&self, target: &Weak<dyn Updateable>) {
        self.entries.borrow_mut().retain(|entry| {
            let matches = same_target(&entry.target, target);
            if matches {
                entry.removed.set(true);
            }
            !matches
        });
    }
}

impl fmt::Debug for TickScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickScheduler")
            .field("time_scale", &self.time_scale.get())
            .field("targets", &self.entries.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        ticks: RefCell<Vec<f32>>,
    }

    impl Updateable for Counter {
        fn update(&self, dt: f32) {
            self.ticks.borrow_mut().push(dt);
        }
    }

    fn weak(counter: &Rc<Counter>) -> Weak<dyn Updateable> {
        let target: Rc<dyn Updateable> = counter.clone();
        Rc::downgrade(&target)
    }

    #[test]
    fn test_time_modes() {
        let scheduler = TickScheduler::with_time_scale(0.5);
        let scaled = Rc::new(Counter::default());
        let unscaled = Rc::new(Counter::default());
        scheduler.add(weak(&scaled), TimeMode::Scaled, 0.0);
        scheduler.add(weak(&unscaled), TimeMode::Unscaled, 0.0);

        scheduler.tick(1.0);
        scheduler.set_time_scale(0.0);
        scheduler.tick(1.0);

        assert_eq!(*scaled.ticks.borrow(), vec![0.5, 0.0]);
        assert_eq!(*unscaled.ticks.borrow(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_initial_delay() {
        let scheduler = TickScheduler::new();
        let counter = Rc::new(Counter::default());
        scheduler.add(weak(&counter), TimeMode::Scaled, 1.0);

        scheduler.tick(0.5);
        assert!(counter.ticks.borrow().is_empty());
        scheduler.tick(0.5);
        scheduler.tick(0.25);
        assert_eq!(*counter.ticks.borrow(), vec![0.5, 0.25]);
    }

    #[test]
    fn test_add_is_idempotent_and_remove_by_identity() {
        let scheduler = TickScheduler::new();
        let first = Rc::new(Counter::default());
        let second = Rc::new(Counter::default());
        scheduler.add(weak(&first), TimeMode::Scaled, 0.0);
        scheduler.add(weak(&first), TimeMode::Scaled, 0.0);
        scheduler.add(weak(&second), TimeMode::Scaled, 0.0);
        assert_eq!(scheduler.len(), 2);

        scheduler.remove(&weak(&first));
        scheduler.tick(1.0);
        assert!(first.ticks.borrow().is_empty());
        assert_eq!(second.ticks.borrow().len(), 1);
        assert!(!scheduler.contains(&weak(&first)));
    }

    #[test]
    fn test_dropped_targets_are_pruned() {
        let scheduler = TickScheduler::new();
        let counter = Rc::new(Counter::default());
        scheduler.add(weak(&counter), TimeMode::Scaled, 0.0);
        drop(counter);

        assert!(scheduler.is_empty());
        scheduler.tick(1.0);
        assert_eq!(scheduler.entries.borrow().len(), 0);
    }

    struct Remover {
        scheduler: Rc<TickScheduler>,
        victim: Weak<dyn Updateable>,
        ticks: Cell<u32>,
    }

    impl Updateable for Remover {
        fn update(&self, _dt: f32) {
            self.ticks.set(self.ticks.get() + 1);
            self.scheduler.remove(&self.victim);
        }
    }

    #[test]
    fn test_removal_during_tick() {
        let scheduler = Rc::new(TickScheduler::new());
        let victim = Rc::new(Counter::default());
        let remover = Rc::new(Remover {
            scheduler: scheduler.clone(),
            victim: weak(&victim),
            ticks: Cell::new(0),
        });
        let remover_target: Rc<dyn Updateable> = remover.clone();
        scheduler.add(Rc::downgrade(&remover_target), TimeMode::Scaled, 0.0);
        scheduler.add(weak(&victim), TimeMode::Scaled, 0.0);

        scheduler.tick(1.0);
        scheduler.tick(1.0);

        assert_eq!(remover.ticks.get(), 2);
        assert!(victim.ticks.borrow().is_empty());
    }
}
