//! A property-synthesis and dynamic-dispatch engine
//!
//! Synths builds accessors for dynamically typed entities from short declarative descriptors.
//! An entity type declares its properties once, through a [`Synthesizer`], and every instance
//! then exposes them as accessors that can be called in several ways:
//!
//! * with no arguments, to read the property;
//! * with a value, to write it;
//! * with an *instruction* and operands, to compute from the current value without storing
//!   (`"+", 3`), or to compute and store (`"+=", 3`);
//! * with a `#method` instruction, to call a method of the current value (`"#to-upper-case"`);
//! * with keys, to read, assign or descend into nested sequences, records and entities
//!   (`"tags", -1`).
//!
//! Properties have a fixed mode. Constants, read-only and write-only properties reject the
//! calls their mode forbids; such misuse is announced through the report [`channel`] instead of
//! failing the call. Errors in declarations, and dispatch failures such as an unknown method,
//! are returned as [`SynthsError`].
//!
//! A simple consumer might declare:
//! * a `Pitch` type with a basic `_step` property and a derived, custom `octave` property;
//! * a `Note` type with a typed `pitch` property that constructs its own `Pitch`, a constant
//!   `kind` and a serializer choosing which properties end up in its JSON form.
//!
//! The engine is single-threaded. Values, entity types and instances are reference counted and
//! none of them can cross threads; the report handler and strict mode are per thread.
pub mod channel;
pub mod config;
pub mod entity;
pub mod error;
pub mod evaluate;
pub mod hashing;
pub mod instruction;
pub mod log;
pub mod macros;
pub mod methods;
pub mod operator;
pub mod prelude;
pub mod property;
pub mod serialize;
pub mod synthesize;
pub mod types;
pub mod value;

pub use crate::channel::{report, set_report_handler, ReportKind};
pub use crate::config::Config;
pub use crate::entity::{EntityType, Instance};
pub use crate::error::SynthsError;
pub use crate::hashing::HashMap;
pub use crate::log::{debug, error, info, trace, warn};
pub use crate::operator::BinOp;
pub use crate::property::{Mode, Property};
pub use crate::serialize::Serializer;
pub use crate::synthesize::{Descriptor, Options, Synthesizer, TypeRef};
pub use crate::value::Value;
