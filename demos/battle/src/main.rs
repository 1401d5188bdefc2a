//! Battle Demo
//!
//! A small skirmish showing the pieces of Switchyard working together:
//!
//! - an action processor validates and applies attacks to the arena, with
//!   derived dispatch so a `CriticalAttack` also runs the `Attack` handlers
//! - an event processor announces defeats, and its handler dispatches a
//!   nested `Victory` event
//! - a lifecycle controller musters the troops during setup, then runs the
//!   combat every tick under the runtime's tick scheduler
//!
//! # Usage
//!
//! ```bash
//! cargo run --package battle
//! cargo run --package battle -- --retreat
//! SWITCHYARD_LOGGING__LEVEL=debug cargo run --package battle
//! ```

mod components;
mod payloads;

use std::path::PathBuf;
use std::rc::{Rc, Weak};

use anyhow::{Result, bail};
use clap::Parser;
use switchyard::prelude::*;
use switchyard::runtime::config::SwitchyardConfig;

use crate::components::{Actions, Combat, Events, Herald, Muster, Retreat};
use crate::payloads::{Arena, Attack, CriticalAttack, Defeated, Miss, Victory};

#[derive(Debug, Parser)]
#[command(name = "battle", about = "Run a small skirmish")]
struct Args {
    /// Configuration file to load instead of searching for `switchyard.toml`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Configuration profile.
    #[arg(long, default_value = "development")]
    profile: String,

    /// Seconds per tick.
    #[arg(long, default_value_t = 0.1)]
    dt: f32,

    /// Give up after this many ticks.
    #[arg(long, default_value_t = 500)]
    max_ticks: u64,

    /// Cancel the setup phase instead of fighting.
    #[arg(long)]
    retreat: bool,
}

// ============================================================================
// Wiring
// ============================================================================

fn wire_actions(actions: &Actions) -> Result<()> {
    actions.state_validator(|arena: &Arena, attack: &Attack| {
        if !arena.is_alive(attack.attacker) {
            let reason = format!("{} has already fallen", attack.attacker);
            return (false, DynResult::new(Miss { reason }));
        }
        if !arena.is_alive(attack.target) {
            let reason = format!("{} is no longer standing", attack.target);
            return (false, DynResult::new(Miss { reason }));
        }
        (true, DynResult::default())
    })?;

    actions.on_state(|arena: &mut Arena, attack: &Attack| {
        arena.hit(attack.target, attack.damage);
        debug!(attacker = attack.attacker, target = attack.target, damage = attack.damage, "Hit");
    })?;

    // the Attack handler above already dealt the base damage once
    actions.on_state(|arena: &mut Arena, critical: &CriticalAttack| {
        let bonus = critical.damage * (critical.multiplier - 1);
        arena.hit(critical.target, bonus);
        info!(attacker = critical.attacker, target = critical.target, bonus, "Critical hit");
    })?;

    actions.on_state_failure_result(|arena: &mut Arena, attack: &Attack, miss: &Miss| {
        arena.misses += 1;
        debug!(attacker = attack.attacker, reason = %miss.reason, "Missed");
    })?;
    Ok(())
}

fn wire_events(events: &Rc<Events>) -> Result<()> {
    let nested: Weak<Events> = Rc::downgrade(events);
    events.on(move |defeated: &Defeated| -> Result<(), switchyard_core::DispatchError> {
        info!(unit = defeated.unit, remaining = defeated.survivors.len(), "Unit defeated");
        if let [winner] = defeated.survivors.as_slice()
            && let Some(events) = nested.upgrade()
        {
            events.process(&Victory { winner: *winner })?;
        }
        Ok(())
    })?;

    events.on(|victory: &Victory| info!(winner = victory.winner, "Victory"))?;
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = Runtime::builder().profile(&args.profile);
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    let runtime = builder.build()?;
    runtime.init_logging();
    log_config(runtime.config());

    let actions: Rc<Actions> = Rc::new(runtime.action_processor());
    actions.set_derived_dispatch(true);
    let events: Rc<Events> = Rc::new(runtime.event_processor());
    wire_actions(&actions)?;
    wire_events(&events)?;

    let arena = Arena::new(&[("knight", 24), ("archer", 16), ("rogue", 18)]);
    let controller = runtime.controller();
    let herald = controller.register_component(Rc::new(Herald::default()));
    controller.register_component(Muster::new(3));
    let combat = controller.register_component(Combat::new(actions.clone(), events.clone(), arena));
    controller.register_component(Retreat::new());

    controller.start()?;
    if args.retreat {
        controller.cancel()?;
    }

    let ticks = runtime.run_until(
        || combat.is_done() || matches!(controller.phase(), Phase::Stopped | Phase::Cleanup),
        args.dt,
        args.max_ticks,
    )?;

    if herald.errors() > 0 {
        bail!("the battle was interrupted after {ticks} ticks");
    }
    if herald.retreated() {
        info!(ticks, "Battle called off");
    } else {
        info!(
            ticks,
            turns = combat.turns(),
            misses = combat.misses(),
            survivors = ?combat.survivors(),
            "Battle over"
        );
    }

    if controller.phase() != Phase::Stopped {
        controller.dispose();
    }
    actions.dispose()?;
    events.dispose()?;
    Ok(())
}

fn log_config(config: &SwitchyardConfig) {
    debug!(
        level = %config.logging.level,
        derived_dispatch = config.processors.derived_dispatch,
        time_scale = config.lifecycle.time_scale,
        "Configuration"
    );
}
