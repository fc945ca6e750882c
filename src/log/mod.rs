//! The `log` module is the crate's interface to logging. It (re)exports the five logging macros
//! of the `log` facade, `error!`, `warn!`, `info!`, `debug!` and `trace!`, and lets the host
//! decide what is emitted.
//!
//! The engine itself logs sparingly: property synthesis and cache hits at `trace`, and every
//! report of runtime misuse (see [`channel`](crate::channel)) at `warn`.
//!
//! Logging is _disabled_ by default. It is controlled with:
//!
//!  - `enable_logging()`: turns on all log messages
//!  - `disable_logging()`: turns off all log messages
//!  - `set_log_level(level: LevelFilter)`: enables only log messages with priority at least `level`
//!
//! Per-module filters are set with `set_module_filter()` / `set_module_filters()` and removed
//! with `remove_module_filter()`:
//!
//! ```rust
//! use synths::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! pub fn setup_logging() {
//!     set_log_level(LevelFilter::Info);
//!     // Silence reports of misuse while keeping everything else.
//!     set_module_filter("synths::channel", LevelFilter::Off);
//! }
//! ```
//!
//! A [`Config`](crate::config::Config) can apply the same settings from a JSON file.
#[cfg(feature = "logging")]
mod standard_logger;

#[cfg(not(feature = "logging"))]
mod null_logger;

pub use log::{debug, error, info, trace, warn, LevelFilter};
use std::collections::hash_map::Entry;
use std::str::FromStr;

use crate::{HashMap, SynthsError};
#[cfg(feature = "logging")]
use log4rs::Handle;
use std::sync::LazyLock;
use std::sync::{Mutex, MutexGuard, PoisonError};

const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;

/// The process-wide logging configuration. The logger installed through `log` is global, so
/// this is the one piece of engine state that is not per thread.
static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// A level filter applied to log messages whose target starts with `module`
/// (e.g. `"synths::evaluate"`).
#[derive(Debug, PartialEq)]
struct ModuleLogConfiguration {
    module: String,
    level: LevelFilter,
}

impl From<(&str, LevelFilter)> for ModuleLogConfiguration {
    fn from((module, level): (&str, LevelFilter)) -> Self {
        Self {
            module: module.to_string(),
            level,
        }
    }
}

/// Tracks the global level, the module filters and the handle of the installed logger. The
/// public API are free functions operating on the singleton.
#[derive(Debug)]
pub(in crate::log) struct LogConfiguration {
    /// Level for targets without a module filter. `LevelFilter::Off` disables logging.
    pub(in crate::log) global_log_level: LevelFilter,
    pub(in crate::log) module_configurations: HashMap<String, ModuleLogConfiguration>,

    #[cfg(feature = "logging")]
    root_handle: Option<Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        Self {
            global_log_level: DEFAULT_LOG_LEVEL,
            module_configurations: HashMap::default(),

            #[cfg(feature = "logging")]
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    pub(in crate::log) fn set_log_level(&mut self, level: LevelFilter) {
        self.global_log_level = level;
        self.set_config();
    }

    /// Returns true if the configuration changed.
    fn insert_module_filter(&mut self, module: &str, level: LevelFilter) -> bool {
        match self.module_configurations.entry(module.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().level == level {
                    return false;
                }
                entry.get_mut().level = level;
            }
            Entry::Vacant(entry) => {
                entry.insert((module, level).into());
            }
        }
        true
    }

    pub(in crate::log) fn set_module_filters<S: AsRef<str>>(
        &mut self,
        module_filters: &[(S, LevelFilter)],
    ) {
        let mut mutated = false;
        for (module, level) in module_filters {
            mutated |= self.insert_module_filter(module.as_ref(), *level);
        }
        if mutated {
            self.set_config();
        }
    }

    pub(in crate::log) fn remove_module_filter(&mut self, module: &str) {
        if self.module_configurations.remove(module).is_some() {
            self.set_config();
        }
    }
}

/// Enables all log messages. Equivalent to `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Disables logging completely. Equivalent to `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the global log level.
pub fn set_log_level(level: LevelFilter) {
    get_log_configuration().set_log_level(level);
}

/// Sets a level filter for the given module path.
pub fn set_module_filter(module_path: &str, level_filter: LevelFilter) {
    get_log_configuration().set_module_filters(&[(module_path, level_filter)]);
}

/// Sets the level filters for several modules at once.
pub fn set_module_filters<S: AsRef<str>>(module_filters: &[(S, LevelFilter)]) {
    get_log_configuration().set_module_filters(module_filters);
}

/// Removes a module-specific level filter. The global level applies to the module again.
pub fn remove_module_filter(module_path: &str) {
    get_log_configuration().remove_module_filter(module_path);
}

/// Parses a level name (`off`, `error`, `warn`, `info`, `debug`, `trace`, any case).
pub fn parse_level(name: &str) -> Result<LevelFilter, SynthsError> {
    LevelFilter::from_str(name.trim())
        .map_err(|_| SynthsError::SynthsError(format!("Invalid log level: {name}")))
}

fn get_log_configuration() -> MutexGuard<'static, LogConfiguration> {
    // A panic while holding the lock leaves the configuration itself consistent.
    LOG_CONFIGURATION
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}
