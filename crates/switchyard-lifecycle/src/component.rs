//! Component roles.
//!
//! A component is any type that plays one or more roles in a lifecycle. The
//! controller discovers the roles through the capability queries of
//! [`Component`], which `#[derive(Component)]` generates:
//!
//! ```rust,ignore
//! use switchyard::prelude::*;
//!
//! #[derive(Component)]
//! #[component(setup, cleanup)]
//! struct AssetLoader {
//!     loaded: Cell<bool>,
//! }
//!
//! impl SetupComponent for AssetLoader {
//!     fn start(&self) {}
//!     fn update(&self, _dt: f32) { self.loaded.set(true); }
//!     fn finished(&self) -> bool { self.loaded.get() }
//! }
//!
//! impl CleanupComponent for AssetLoader {
//!     fn cleanup(&self) { self.loaded.set(false); }
//! }
//! ```
//!
//! Role methods take `&self`: the controller may call back into a component
//! while another of its methods is still on the stack (an error reported from
//! `update` disposes the controller, which cleans the same component up), so
//! components keep their state in `Cell`/`RefCell`.

use std::rc::Weak;

use crate::error::ComponentError;

/// A step of the setup phase. Setup components run one at a time, in
/// registration order, until each reports [`finished`](Self::finished).
pub trait SetupComponent {
    /// Called once, on the first tick this component is the current step.
    fn start(&self);

    /// Called every tick while this component is the current step.
    fn update(&self, dt: f32);

    /// Polled after each `update`.
    fn finished(&self) -> bool;
}

/// Runs once when setup has completed.
pub trait StartComponent {
    fn start(&self);
}

/// Ticked every update while the lifecycle runs.
pub trait UpdateComponent {
    fn update(&self, dt: f32);
}

/// Releases resources on dispose.
pub trait CleanupComponent {
    fn cleanup(&self);
}

/// Takes part in cancelling the setup phase.
///
/// `cancel` may finish asynchronously; the component reports back through the
/// listener it was handed, possibly many ticks later.
pub trait CancelComponent {
    fn set_listener(&self, listener: Option<Weak<dyn CancelListener>>);

    fn cancel(&self);
}

/// Receives the outcome of a cancellation.
pub trait CancelListener {
    fn on_cancelled(&self, successful: bool);
}

/// Something that can fail and reports failures to a handler.
pub trait ErrorDispatcher {
    fn set_handler(&self, handler: Option<Weak<dyn ErrorHandler>>);
}

/// Receives component errors.
pub trait ErrorHandler {
    fn on_error(&self, error: &ComponentError);
}

/// Capability queries for every role.
///
/// Each query returns `Some` when the component plays that role. Prefer
/// `#[derive(Component)]` over implementing this by hand.
pub trait Component: 'static {
    fn as_setup(&self) -> Option<&dyn SetupComponent> {
        None
    }

    fn as_start(&self) -> Option<&dyn StartComponent> {
        None
    }

    fn as_update(&self) -> Option<&dyn UpdateComponent> {
        None
    }

    fn as_cleanup(&self) -> Option<&dyn CleanupComponent> {
        None
    }

    fn as_cancel(&self) -> Option<&dyn CancelComponent> {
        None
    }

    fn as_cancel_listener(&self) -> Option<&dyn CancelListener> {
        None
    }

    fn as_error_dispatcher(&self) -> Option<&dyn ErrorDispatcher> {
        None
    }

    fn as_error_handler(&self) -> Option<&dyn ErrorHandler> {
        None
    }
}

/// The roles a controller keeps a list for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Setup,
    Start,
    Update,
    Cleanup,
    Cancel,
    CancelListener,
    ErrorDispatcher,
    ErrorHandler,
}

impl Role {
    pub(crate) const ALL: [Role; 8] = [
        Role::Setup,
        Role::Start,
        Role::Update,
        Role::Cleanup,
        Role::Cancel,
        Role::CancelListener,
        Role::ErrorDispatcher,
        Role::ErrorHandler,
    ];

    pub(crate) fn supported_by(self, component: &dyn Component) -> bool {
        match self {
            Role::Setup => component.as_setup().is_some(),
            Role::Start => component.as_start().is_some(),
            Role::Update => component.as_update().is_some(),
            Role::Cleanup => component.as_cleanup().is_some(),
            Role::Cancel => component.as_cancel().is_some(),
            Role::CancelListener => component.as_cancel_listener().is_some(),
            Role::ErrorDispatcher => component.as_error_dispatcher().is_some(),
            Role::ErrorHandler => component.as_error_handler().is_some(),
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Role::Setup => "setup",
            Role::Start => "start",
            Role::Update => "update",
            Role::Cleanup => "cleanup",
            Role::Cancel => "cancel",
            Role::CancelListener => "cancel_listener",
            Role::ErrorDispatcher => "error_dispatcher",
            Role::ErrorHandler => "error_handler",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_macros::Component;

    #[derive(Component)]
    #[component(update, cleanup)]
    struct Ticker;

    impl UpdateComponent for Ticker {
        fn update(&self, _dt: f32) {}
    }

    impl CleanupComponent for Ticker {
        fn cleanup(&self) {}
    }

    #[test]
    fn test_derive_advertises_listed_roles_only() {
        let supported: Vec<_> = Role::ALL
            .into_iter()
            .filter(|role| role.supported_by(&Ticker))
            .map(Role::as_str)
            .collect();
        assert_eq!(supported, vec!["update", "cleanup"]);
    }
}
