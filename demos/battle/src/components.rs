//! Lifecycle components of the skirmish.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use switchyard::prelude::*;

use crate::payloads::{Arena, Attack, CriticalAttack, Defeated};

pub type Actions = ActionProcessor<Arena, DynResult>;
pub type Events = EventProcessor;

/// Gathers the troops over a few ticks before the fighting starts.
#[derive(Component)]
#[component(setup, cleanup)]
pub struct Muster {
    needed: u32,
    gathered: Cell<u32>,
}

impl Muster {
    pub fn new(needed: u32) -> Rc<Self> {
        Rc::new(Self {
            needed,
            gathered: Cell::new(0),
        })
    }
}

impl SetupComponent for Muster {
    fn start(&self) {
        info!(needed = self.needed, "Mustering troops");
    }

    fn update(&self, _dt: f32) {
        self.gathered.set(self.gathered.get() + 1);
        debug!(gathered = self.gathered.get(), "Squad arrived");
    }

    fn finished(&self) -> bool {
        self.gathered.get() >= self.needed
    }
}

impl CleanupComponent for Muster {
    fn cleanup(&self) {
        info!(squads = self.gathered.get(), "Troops dismissed");
    }
}

/// Runs one attack per tick until a single unit is left.
#[derive(Component)]
#[component(update, error_dispatcher)]
pub struct Combat {
    actions: Rc<Actions>,
    events: Rc<Events>,
    arena: RefCell<Arena>,
    turn: Cell<u32>,
    done: Cell<bool>,
    handler: RefCell<Option<Weak<dyn ErrorHandler>>>,
}

impl Combat {
    pub fn new(actions: Rc<Actions>, events: Rc<Events>, arena: Arena) -> Rc<Self> {
        Rc::new(Self {
            actions,
            events,
            arena: RefCell::new(arena),
            turn: Cell::new(0),
            done: Cell::new(false),
            handler: RefCell::new(None),
        })
    }

    pub fn is_done(&self) -> bool {
        self.done.get()
    }

    pub fn turns(&self) -> u32 {
        self.turn.get()
    }

    pub fn survivors(&self) -> Vec<&'static str> {
        self.arena.borrow().alive()
    }

    pub fn misses(&self) -> u32 {
        self.arena.borrow().misses
    }

    fn fail(&self, error: impl ToString) {
        self.done.set(true);
        let handler = self.handler.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(handler) = handler {
            handler.on_error(&ComponentError::new(error.to_string()));
        }
    }

    fn strike(&self, turn: u32) -> Result<(), switchyard_core::DispatchError> {
        let Some((attacker, target)) = self.arena.borrow().matchup(turn) else {
            self.done.set(true);
            return Ok(());
        };
        let attack = Attack {
            attacker,
            target,
            damage: 3 + (turn % 4) as i32,
        };

        let mut arena = self.arena.borrow_mut();
        let processed = if turn % 3 == 2 {
            let critical = CriticalAttack { attack, multiplier: 2 };
            self.actions.process_with(&mut arena, &critical)?
        } else {
            self.actions.process_with(&mut arena, &attack)?
        };
        trace!(turn, success = processed.success, "Attack resolved");

        let fallen = arena.take_fallen();
        let survivors = arena.alive();
        drop(arena);

        for unit in fallen {
            self.events.process(&Defeated {
                unit,
                survivors: survivors.clone(),
            })?;
        }
        if survivors.len() <= 1 {
            self.done.set(true);
        }
        Ok(())
    }
}

impl UpdateComponent for Combat {
    fn update(&self, _dt: f32) {
        if self.done.get() {
            return;
        }
        let turn = self.turn.get();
        self.turn.set(turn + 1);
        if let Err(error) = self.strike(turn) {
            self.fail(error);
        }
    }
}

impl ErrorDispatcher for Combat {
    fn set_handler(&self, handler: Option<Weak<dyn ErrorHandler>>) {
        *self.handler.borrow_mut() = handler;
    }
}

/// Calls the troops back when the setup is cancelled.
#[derive(Component)]
#[component(cancel)]
pub struct Retreat {
    listener: RefCell<Option<Weak<dyn CancelListener>>>,
}

impl Retreat {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            listener: RefCell::new(None),
        })
    }
}

impl CancelComponent for Retreat {
    fn set_listener(&self, listener: Option<Weak<dyn CancelListener>>) {
        *self.listener.borrow_mut() = listener;
    }

    fn cancel(&self) {
        info!("Sounding the retreat");
        let listener = self.listener.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(listener) = listener {
            listener.on_cancelled(true);
        }
    }
}

/// Reports how the battle ended.
#[derive(Component, Default)]
#[component(cancel_listener, error_handler)]
pub struct Herald {
    retreated: Cell<bool>,
    errors: Cell<u32>,
}

impl Herald {
    pub fn retreated(&self) -> bool {
        self.retreated.get()
    }

    pub fn errors(&self) -> u32 {
        self.errors.get()
    }
}

impl CancelListener for Herald {
    fn on_cancelled(&self, successful: bool) {
        self.retreated.set(successful);
        if successful {
            info!("The army withdrew before the battle");
        } else {
            warn!("The retreat failed");
        }
    }
}

impl ErrorHandler for Herald {
    fn on_error(&self, error: &ComponentError) {
        self.errors.set(self.errors.get() + 1);
        error!(%error, "The battle was interrupted");
    }
}
