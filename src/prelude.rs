pub use crate::channel::{set_report_handler, ReportKind};
pub use crate::entity::{EntityType, Instance};
pub use crate::error::SynthsError;
pub use crate::log::{debug, error, info, trace, warn};
pub use crate::operator::BinOp;
pub use crate::property::{Mode, Property};
pub use crate::serialize::Serializer;
pub use crate::synthesize::{Descriptor, Options, Synthesizer, TypeRef};
pub use crate::value::Value;
pub use crate::{record, vals};
