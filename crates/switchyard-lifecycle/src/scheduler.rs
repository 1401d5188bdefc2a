//! The boundary between a controller and whatever drives it.
//!
//! A controller created with a scheduler adds itself on `start()` and removes
//! itself when it stops or is disposed. Without one, the owner calls
//! `update(dt)` directly.

use std::rc::Weak;

use serde::{Deserialize, Serialize};

/// Which clock a scheduled target follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeMode {
    /// Time multiplied by the scheduler's time scale.
    #[default]
    Scaled,
    /// Wall-clock time, ignoring the time scale.
    Unscaled,
}

/// Something that wants a tick with the elapsed time.
pub trait Updateable {
    fn update(&self, dt: f32);
}

/// Drives [`Updateable`] targets.
///
/// Targets are held weakly and identified by their allocation, so the
/// scheduler never keeps a controller alive.
pub trait Scheduler {
    /// Adds `target`, first ticking it after `initial_delay` seconds.
    fn add(&self, target: Weak<dyn Updateable>, mode: TimeMode, initial_delay: f32);

    /// Removes `target`. Removing an unknown target does nothing.
    fn remove(&self, target: &Weak<dyn Updateable>);
}

/// Returns `true` if both weak pointers refer to the same allocation.
pub fn same_target(a: &Weak<dyn Updateable>, b: &Weak<dyn Updateable>) -> bool {
    a.as_ptr().cast::<()>() == b.as_ptr().cast::<()>()
}
