use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::runtime::ConfigBuilder;
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;

use crate::log::{LogConfiguration, ModuleLogConfiguration};

// Reports are diagnostics, so they go to stderr with the emitting module as target.
const DEFAULT_LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S%.3fZ)} {h({l})} {t} - {m}{n}";
const APPENDER: &str = "stderr";

impl From<&ModuleLogConfiguration> for Logger {
    fn from(module_config: &ModuleLogConfiguration) -> Self {
        Logger::builder().build(module_config.module.clone(), module_config.level)
    }
}

impl LogConfiguration {
    /// Installs or reconfigures the `log4rs` logger to match this [`LogConfiguration`].
    pub(in crate::log) fn set_config(&mut self) {
        let encoder = Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN));
        let stderr = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(encoder)
            .build();
        let mut config: ConfigBuilder =
            Config::builder().appender(Appender::builder().build(APPENDER, Box::new(stderr)));

        for module_config in self.module_configurations.values() {
            config = config.logger(module_config.into());
        }

        let root = Root::builder()
            .appender(APPENDER)
            .build(self.global_log_level);
        let new_config = match config.build(root) {
            Ok(config) => config,
            Err(error) => {
                // Keep whatever logger is installed but honor the level.
                eprintln!("synths: invalid log configuration: {error}");
                log::set_max_level(self.global_log_level);
                return;
            }
        };

        if let Some(handle) = self.root_handle.as_ref() {
            handle.set_config(new_config);
            return;
        }
        match log4rs::init_config(new_config) {
            Ok(handle) => self.root_handle = Some(handle),
            // Another logger owns the `log` facade; only the level can be adjusted.
            Err(_) => log::set_max_level(self.global_log_level),
        }
    }
}
