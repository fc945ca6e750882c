//! Host configuration for the engine, loaded from JSON.
//!
//! ```json
//! {
//!   "strict": false,
//!   "log_level": "warn",
//!   "module_filters": { "synths::channel": "error" }
//! }
//! ```
//!
//! Every field is optional. [`Config::apply`] installs the settings for the calling thread
//! (strict mode) and for the process (logging).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::channel::set_strict;
use crate::log::{parse_level, set_log_level, set_module_filters, trace, LevelFilter};
use crate::SynthsError;

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Turn reported misuse into `SynthsError::Misuse` errors.
    pub strict: bool,
    /// Global log level name. `None` leaves logging as it is.
    pub log_level: Option<String>,
    /// Per-module log level names.
    pub module_filters: BTreeMap<String, String>,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Config, SynthsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Config, SynthsError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Validates every level name before changing anything, then installs the settings.
    pub fn apply(&self) -> Result<(), SynthsError> {
        let level = self.log_level.as_deref().map(parse_level).transpose()?;
        let filters = self
            .module_filters
            .iter()
            .map(|(module, name)| Ok((module.as_str(), parse_level(name)?)))
            .collect::<Result<Vec<(&str, LevelFilter)>, SynthsError>>()?;

        set_strict(self.strict);
        if let Some(level) = level {
            set_log_level(level);
        }
        if !filters.is_empty() {
            set_module_filters(&filters);
        }
        trace!("applied configuration {self:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::is_strict;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert!(!config.strict);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = Config::from_json_str(r#"{"stric": true}"#);
        assert!(matches!(result, Err(SynthsError::JsonError(_))));
    }

    #[test]
    fn loads_from_file_and_applies_strict_mode() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"strict": true}}"#).unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert!(config.strict);

        config.apply().unwrap();
        assert!(is_strict());
        Config::default().apply().unwrap();
        assert!(!is_strict());
    }

    #[test]
    fn invalid_level_changes_nothing() {
        let config = Config {
            strict: true,
            log_level: Some("shouty".to_string()),
            module_filters: BTreeMap::new(),
        };
        assert!(config.apply().is_err());
        assert!(!is_strict());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_file(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(SynthsError::IoError(_))));
    }
}
