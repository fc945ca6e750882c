use std::fmt::{self, Debug, Display};
use std::io;

use crate::channel::ReportKind;

/// Provides `SynthsError` and maps other errors to it.
///
/// The variants fall into three groups. Definition-time errors (`InvalidVarName`,
/// `UnknownType`, `InvalidOptions`, `InvalidSerializerKey`, `MutableDefault`) are raised while
/// an entity type is being declared. Dispatch errors (`InvalidMethod`, `InvalidArguments`,
/// `InvalidKey`, `InvalidReceiver`) stop the accessor call that hit them. `Misuse` is only
/// produced by the report channel in strict mode.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SynthsError {
    InvalidVarName(String),
    UnknownType(String),
    InvalidOptions(String),
    InvalidSerializerKey(String),
    MutableDefault(String),
    InvalidMethod(String),
    InvalidArguments(String),
    InvalidKey(String),
    InvalidReceiver(String),
    Misuse { kind: ReportKind, message: String },
    IoError(io::Error),
    JsonError(serde_json::Error),
    SynthsError(String),
}

impl SynthsError {
    /// Whether the error was raised while declaring properties or entity types, as opposed to
    /// while dispatching an accessor call.
    #[must_use]
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            SynthsError::InvalidVarName(_)
                | SynthsError::UnknownType(_)
                | SynthsError::InvalidOptions(_)
                | SynthsError::InvalidSerializerKey(_)
                | SynthsError::MutableDefault(_)
        )
    }
}

impl From<io::Error> for SynthsError {
    fn from(error: io::Error) -> Self {
        SynthsError::IoError(error)
    }
}

impl From<serde_json::Error> for SynthsError {
    fn from(error: serde_json::Error) -> Self {
        SynthsError::JsonError(error)
    }
}

impl From<String> for SynthsError {
    fn from(error: String) -> Self {
        SynthsError::SynthsError(error)
    }
}

impl From<&str> for SynthsError {
    fn from(error: &str) -> Self {
        SynthsError::SynthsError(error.to_string())
    }
}

impl std::error::Error for SynthsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SynthsError::IoError(error) => Some(error),
            SynthsError::JsonError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for SynthsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SynthsError::InvalidVarName(msg) => write!(f, "Invalid var name: {msg}"),
            SynthsError::UnknownType(name) => write!(f, "Invalid type name: {name}"),
            SynthsError::InvalidOptions(msg) => write!(f, "Invalid options: {msg}"),
            SynthsError::InvalidSerializerKey(msg) => write!(f, "Invalid toJSON key: {msg}"),
            SynthsError::MutableDefault(msg) => write!(f, "Invalid default: {msg}"),
            SynthsError::InvalidMethod(name) => write!(f, "Invalid method {name}"),
            SynthsError::InvalidArguments(msg) => write!(f, "Wrong arguments: {msg}"),
            SynthsError::InvalidKey(key) => write!(f, "Invalid key: {key}"),
            SynthsError::InvalidReceiver(msg) => write!(f, "Invalid receiver: {msg}"),
            SynthsError::Misuse { kind, message } => write!(f, "{kind}: {message}"),
            SynthsError::IoError(error) => write!(f, "Error: {error}"),
            SynthsError::JsonError(error) => write!(f, "Error: {error}"),
            SynthsError::SynthsError(msg) => write!(f, "Error: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_errors_are_classified() {
        assert!(SynthsError::UnknownType("foo".into()).is_definition_error());
        assert!(SynthsError::MutableDefault("x".into()).is_definition_error());
        assert!(!SynthsError::InvalidKey("x".into()).is_definition_error());
        assert!(!SynthsError::from("plain").is_definition_error());
    }

    #[test]
    fn converts_json_errors() {
        let error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: SynthsError = error.into();
        assert!(matches!(error, SynthsError::JsonError(_)));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn displays_dispatch_errors() {
        assert_eq!(
            SynthsError::InvalidMethod("fooBar".into()).to_string(),
            "Invalid method fooBar"
        );
        assert_eq!(SynthsError::InvalidKey("3".into()).to_string(), "Invalid key: 3");
    }
}
