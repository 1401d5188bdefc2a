//! Lifecycle phases.
//!
//! | From | To | Trigger |
//! |------|----|---------|
//! | `Stopped` | `Setup` | `start()` |
//! | `Setup` | `Start` | every setup component finished |
//! | `Setup` | `Stopped` | cancellation acknowledged as successful |
//! | `Start` | `Update` | start components ran |
//! | any | `Cleanup` | `dispose()` or a reported error |

use std::fmt;

/// The phase a [`LifecycleController`](crate::LifecycleController) is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Not running; `start()` is allowed.
    #[default]
    Stopped,
    /// Driving setup components one at a time; `cancel()` is allowed.
    Setup,
    /// Running start components on the next tick.
    Start,
    /// Updating every update component each tick.
    Update,
    /// Torn down.
    Cleanup,
}

impl Phase {
    /// Returns the lowercase name of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Setup => "setup",
            Self::Start => "start",
            Self::Update => "update",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
