/*!

The report channel is the single place runtime misuse of a synthesized property is announced:
writing a constant or read-only property, reading a write-only property, passing several values
to a write-only setter, or naming something that is not a readable property in a serializer.

Misuse never aborts the accessor call. The call degrades (returns the owning instance unchanged,
returns `Undefined`, or leaves a key out of a serialized record) and the report is handed to the
installed handler. No handler is installed by default; reports are still logged at `warn`.

Hosts that prefer failures can turn on strict mode, in which case [`report`] returns
[`SynthsError::Misuse`] and the accessor call propagates it.

The handler and the strict flag are per thread, like the rest of the engine's runtime state.

*/

use std::cell::{Cell, RefCell};
use std::fmt::{self, Display};
use std::rc::Rc;

use crate::log::warn;
use crate::SynthsError;

/// The category of a report.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReportKind {
    /// An accessor was used against its mode.
    TypeError,
    /// Anything else, currently bad serializer keys.
    Error,
}

impl Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::TypeError => write!(f, "typeError"),
            ReportKind::Error => write!(f, "error"),
        }
    }
}

type ReportHandler = Rc<dyn Fn(ReportKind, &str)>;

thread_local! {
    static HANDLER: RefCell<Option<ReportHandler>> = const { RefCell::new(None) };
    static STRICT: Cell<bool> = const { Cell::new(false) };
}

/// Installs `handler` as the receiver of every report on this thread, replacing any previous
/// handler.
pub fn set_report_handler(handler: impl Fn(ReportKind, &str) + 'static) {
    HANDLER.with(|cell| *cell.borrow_mut() = Some(Rc::new(handler)));
}

/// Removes the installed handler. Reports are only logged afterwards.
pub fn clear_report_handler() {
    HANDLER.with(|cell| *cell.borrow_mut() = None);
}

/// Turns strict mode on or off for this thread.
pub fn set_strict(strict: bool) {
    STRICT.with(|cell| cell.set(strict));
}

#[must_use]
pub fn is_strict() -> bool {
    STRICT.with(Cell::get)
}

/// Announces a misuse. Returns an error only in strict mode.
pub fn report(kind: ReportKind, message: &str) -> Result<(), SynthsError> {
    warn!("{kind}: {message}");
    // The handler may replace or clear itself.
    let handler = HANDLER.with(|cell| cell.borrow().clone());
    if let Some(handler) = handler {
        handler(kind, message);
    }
    if is_strict() {
        return Err(SynthsError::Misuse {
            kind,
            message: message.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn write_to_constant(constant: &impl Display) -> Result<(), SynthsError> {
    report(
        ReportKind::TypeError,
        &format!("Write to a constant property, which is always {constant}"),
    )
}

pub(crate) fn write_to_read_only() -> Result<(), SynthsError> {
    report(ReportKind::TypeError, "Write to a read only property")
}

pub(crate) fn write_more_than_one_arg() -> Result<(), SynthsError> {
    report(ReportKind::TypeError, "Write more than one argument")
}

pub(crate) fn read_a_write_only() -> Result<(), SynthsError> {
    report(ReportKind::TypeError, "Read a write only property")
}

pub(crate) fn not_a_property(key: &str) -> Result<(), SynthsError> {
    report(
        ReportKind::Error,
        &format!("Invalid key for toJSON: {key} is not a property"),
    )
}

/// Collects reports for the duration of a test.
#[cfg(test)]
pub(crate) fn capture_reports() -> Rc<RefCell<Vec<(ReportKind, String)>>> {
    let reports = Rc::new(RefCell::new(Vec::new()));
    let sink = reports.clone();
    set_report_handler(move |kind, message| sink.borrow_mut().push((kind, message.to_string())));
    reports
}
