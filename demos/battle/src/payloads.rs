//! What happens on the battlefield.

use switchyard::prelude::*;

/// One unit striking another.
#[derive(Debug, Clone, Payload)]
#[payload(name = "battle.attack")]
pub struct Attack {
    pub attacker: &'static str,
    pub target: &'static str,
    pub damage: i32,
}

/// An attack that deals its damage `multiplier` times.
///
/// Handlers for [`Attack`] see it too when derived dispatch is on.
#[derive(Debug, Clone, Payload)]
#[payload(name = "battle.critical_attack")]
pub struct CriticalAttack {
    #[payload(parent)]
    pub attack: Attack,
    pub multiplier: i32,
}

/// A unit dropped to zero hit points.
#[derive(Debug, Payload)]
#[payload(name = "battle.defeated")]
pub struct Defeated {
    pub unit: &'static str,
    pub survivors: Vec<&'static str>,
}

/// Only one unit is left standing.
#[derive(Debug, Payload)]
#[payload(name = "battle.victory")]
pub struct Victory {
    pub winner: &'static str,
}

/// Why an attack did not land.
#[derive(Debug)]
pub struct Miss {
    pub reason: String,
}

#[derive(Debug)]
pub struct Unit {
    pub name: &'static str,
    pub hp: i32,
    announced: bool,
}

/// The shared state attacks are applied to.
#[derive(Debug, Default)]
pub struct Arena {
    pub units: Vec<Unit>,
    pub misses: u32,
}

impl Arena {
    pub fn new(roster: &[(&'static str, i32)]) -> Self {
        Self {
            units: roster
                .iter()
                .map(|&(name, hp)| Unit {
                    name,
                    hp,
                    announced: false,
                })
                .collect(),
            misses: 0,
        }
    }

    pub fn is_alive(&self, name: &str) -> bool {
        self.units.iter().any(|unit| unit.name == name && unit.hp > 0)
    }

    pub fn alive(&self) -> Vec<&'static str> {
        self.units.iter().filter(|unit| unit.hp > 0).map(|unit| unit.name).collect()
    }

    pub fn hit(&mut self, target: &str, damage: i32) {
        if let Some(unit) = self.units.iter_mut().find(|unit| unit.name == target) {
            unit.hp -= damage;
        }
    }

    /// Returns the attacker and target for `turn`, if two units still stand.
    pub fn matchup(&self, turn: u32) -> Option<(&'static str, &'static str)> {
        let alive = self.alive();
        if alive.len() < 2 {
            return None;
        }
        let turn = turn as usize;
        Some((alive[turn % alive.len()], alive[(turn + 1) % alive.len()]))
    }

    /// Returns the units that fell since the last call.
    pub fn take_fallen(&mut self) -> Vec<&'static str> {
        self.units
            .iter_mut()
            .filter(|unit| unit.hp <= 0 && !unit.announced)
            .map(|unit| {
                unit.announced = true;
                unit.name
            })
            .collect()
    }
}
