//! The runtime host.
//!
//! A [`Runtime`] owns the loaded configuration and a [`TickScheduler`], builds
//! processors and lifecycle controllers with the configured defaults, and
//! drives ticks.
//!
//! ```rust,ignore
//! use switchyard_runtime::Runtime;
//!
//! let runtime = Runtime::builder().profile("production").build()?;
//! runtime.init_logging();
//!
//! let controller = runtime.controller();
//! controller.register_component(loader);
//! controller.start()?;
//!
//! runtime.run_until(|| controller.phase() == Phase::Update, 1.0 / 60.0, 600)?;
//! ```

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use switchyard_core::{ActionProcessor, EventProcessor};
use switchyard_lifecycle::{LifecycleController, Scheduler};
use tracing::{debug, info};

use crate::config::{ConfigLoader, SwitchyardConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::scheduler::TickScheduler;

/// Hosts processors and controllers built from one configuration.
#[derive(Debug)]
pub struct Runtime {
    config: SwitchyardConfig,
    scheduler: Rc<TickScheduler>,
    ticks: Cell<u64>,
}

impl Runtime {
    /// Creates a runtime from an already loaded configuration.
    ///
    /// # Errors
    ///
    /// Fails if the configuration does not validate.
    pub fn from_config(config: SwitchyardConfig) -> RuntimeResult<Self> {
        validate_config(&config)?;
        let scheduler = Rc::new(TickScheduler::with_time_scale(config.lifecycle.time_scale));
        info!(
            derived_dispatch = config.processors.derived_dispatch,
            time_mode = ?config.lifecycle.time_mode,
            time_scale = config.lifecycle.time_scale,
            "Runtime initialized from configuration"
        );
        Ok(Self {
            config,
            scheduler,
            ticks: Cell::new(0),
        })
    }

    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SwitchyardConfig {
        &self.config
    }

    /// Installs the global subscriber described by the logging configuration.
    pub fn init_logging(&self) {
        logging::init_from_config(&self.config.logging);
    }

    /// Returns the scheduler that drives the controllers of this runtime.
    pub fn scheduler(&self) -> &Rc<TickScheduler> {
        &self.scheduler
    }

    /// Builds an action processor with the configured derived dispatch.
    pub fn action_processor<S, R>(&self) -> ActionProcessor<S, R> {
        ActionProcessor::new().with_derived_dispatch(self.config.processors.derived_dispatch)
    }

    /// Builds an event processor with the configured derived dispatch.
    pub fn event_processor<S, R>(&self) -> EventProcessor<S, R> {
        EventProcessor::new().with_derived_dispatch(self.config.processors.derived_dispatch)
    }

    /// Builds a lifecycle controller scheduled on this runtime.
    pub fn controller(&self) -> Rc<LifecycleController> {
        let scheduler: Rc<dyn Scheduler> = self.scheduler.clone();
        LifecycleController::with_options(Some(scheduler), self.config.lifecycle.options())
    }

    /// Returns how many ticks have run.
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    /// Advances every scheduled target by `dt` seconds.
    ///
    /// # Errors
    ///
    /// Fails if `dt` is negative or not finite.
    pub fn tick(&self, dt: f32) -> RuntimeResult<()> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(RuntimeError::InvalidDelta(dt));
        }
        self.scheduler.tick(dt);
        self.ticks.set(self.ticks.get() + 1);
        Ok(())
    }

    /// Ticks until `done` returns `true`, checking before every tick.
    /// Returns the number of ticks run.
    ///
    /// # Errors
    ///
    /// Fails with [`RuntimeError::TickLimit`] if `done` still returns `false`
    /// after `max_ticks` ticks.
    pub fn run_until(&self, mut done: impl FnMut() -> bool, dt: f32, max_ticks: u64) -> RuntimeResult<u64> {
        let mut ticks = 0;
        while !done() {
            if ticks == max_ticks {
                return Err(RuntimeError::TickLimit { ticks });
            }
            self.tick(dt)?;
            ticks += 1;
        }
        debug!(ticks, "Run condition reached");
        Ok(ticks)
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`Runtime`] that loads its configuration.
///
/// ```rust,ignore
/// let runtime = Runtime::builder()
///     .config_file("config/switchyard.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    loader: ConfigLoader,
}

impl RuntimeBuilder {
    /// Creates a builder that searches the default configuration locations.
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
        }
    }

    /// Loads this file instead of searching.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    /// Enables environment variable overrides (the default).
    pub fn with_env(mut self) -> Self {
        self.loader = self.loader.with_env();
        self
    }

    /// Disables environment variable overrides.
    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Merges a configuration over every other source.
    pub fn merge(mut self, config: SwitchyardConfig) -> Self {
        self.loader = self.loader.merge(config);
        self
    }

    /// Loads the configuration and creates the runtime.
    ///
    /// # Errors
    ///
    /// Fails if the configuration cannot be loaded or does not validate.
    pub fn build(self) -> RuntimeResult<Runtime> {
        Runtime::from_config(self.loader.load()?)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
