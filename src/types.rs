/*!

The type registry maps the type names a property descriptor may use to constructors.

| name                     | constructs                                             |
|--------------------------|--------------------------------------------------------|
| `string`                 | text, from the display form of the first argument      |
| `number`, `double`       | a number, by numeric coercion                          |
| `boolean`                | a boolean, by truthiness                               |
| `integer`                | a number truncated to an integer, parsed leniently     |
| `object`, `plainObject`  | a record, copied from a record argument                |
| `array`                  | a sequence                                             |
| `date`                   | a date, from components, a timestamp or ISO text       |

Names are camel-cased before lookup, so `plain-object` and `plain_object` resolve too. The
registry is fixed; entity types take part in typed properties through
[`Constructor::Entity`] instead of by name.

Dates also carry a behavior table: properties `year`, `month` (1-based), `date`, `day`
(read-only weekday, 0 is Sunday), `hour`, `minute`, `second`, `millisecond` and `time`
(milliseconds since the epoch). Setting a component rebuilds the date and lets out-of-range
values carry over, so setting `month` to 13 moves to January of the next year.

*/

use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};

use crate::entity::EntityType;
use crate::instruction::camel;
use crate::property::{getter, setter, Accessor, Property};
use crate::value::{RecordMap, Value};
use crate::SynthsError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NativeType {
    String,
    Number,
    Double,
    Boolean,
    Integer,
    Object,
    PlainObject,
    Array,
    Date,
}

const REGISTRY: [(&str, NativeType); 9] = [
    ("string", NativeType::String),
    ("number", NativeType::Number),
    ("double", NativeType::Double),
    ("boolean", NativeType::Boolean),
    ("integer", NativeType::Integer),
    ("object", NativeType::Object),
    ("plainObject", NativeType::PlainObject),
    ("array", NativeType::Array),
    ("date", NativeType::Date),
];

impl NativeType {
    /// Looks up an already camel-cased name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<NativeType> {
        REGISTRY
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, native)| *native)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, native)| *native == self)
            .map_or("unknown", |(name, _)| name)
    }

    /// Whether `value` can be stored as it is.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            NativeType::String => matches!(value, Value::Str(_)),
            NativeType::Number | NativeType::Double => matches!(value, Value::Number(_)),
            NativeType::Boolean => matches!(value, Value::Bool(_)),
            // Integers are always normalized.
            NativeType::Integer => false,
            NativeType::Object | NativeType::PlainObject => matches!(value, Value::Record(_)),
            NativeType::Array => matches!(value, Value::Seq(_)),
            NativeType::Date => matches!(value, Value::Date(_)),
        }
    }

    pub fn construct(self, args: &[Value]) -> Result<Value, SynthsError> {
        let first = args.first();
        Ok(match self {
            NativeType::String => Value::Str(first.map(ToString::to_string).unwrap_or_default()),
            NativeType::Number | NativeType::Double => {
                Value::Number(first.map_or(0.0, Value::to_number))
            }
            NativeType::Boolean => Value::Bool(first.is_some_and(Value::is_truthy)),
            NativeType::Integer => Value::Number(first.map_or(f64::NAN, parse_int)),
            NativeType::Object | NativeType::PlainObject => match first {
                Some(record @ Value::Record(_)) => record.shallow_copy(),
                _ => Value::record(RecordMap::new()),
            },
            NativeType::Array => construct_array(args),
            NativeType::Date => Value::date(construct_date(args)?),
        })
    }
}

impl Display for NativeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What a typed property constructs its values with.
#[derive(Clone, Debug)]
pub enum Constructor {
    Native(NativeType),
    Entity(Rc<EntityType>),
}

impl Constructor {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Constructor::Native(native) => native.name(),
            Constructor::Entity(entity_type) => entity_type.name(),
        }
    }

    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Constructor::Native(native), value) => native.accepts(value),
            (Constructor::Entity(entity_type), Value::Entity(instance)) => {
                Rc::ptr_eq(entity_type, instance.entity_type())
            }
            (Constructor::Entity(_), _) => false,
        }
    }

    pub fn construct(&self, args: &[Value]) -> Result<Value, SynthsError> {
        match self {
            Constructor::Native(native) => native.construct(args),
            Constructor::Entity(entity_type) => Ok(Value::Entity(entity_type.construct(args)?)),
        }
    }

    /// The shared behavior table values of this type can be looked up in.
    #[must_use]
    pub fn behavior(&self) -> Option<Rc<EntityType>> {
        match self {
            Constructor::Native(NativeType::Date) => Some(date_behavior()),
            Constructor::Native(_) => None,
            Constructor::Entity(entity_type) => Some(Rc::clone(entity_type)),
        }
    }
}

impl From<NativeType> for Constructor {
    fn from(native: NativeType) -> Self {
        Constructor::Native(native)
    }
}

impl From<Rc<EntityType>> for Constructor {
    fn from(entity_type: Rc<EntityType>) -> Self {
        Constructor::Entity(entity_type)
    }
}

/// Resolves a registered type name, camel-casing it first.
pub fn resolve(name: &str) -> Result<Constructor, SynthsError> {
    NativeType::from_name(&camel(name))
        .map(Constructor::Native)
        .ok_or_else(|| SynthsError::UnknownType(name.to_string()))
}

#[must_use]
pub fn is_registered(name: &str) -> bool {
    NativeType::from_name(&camel(name)).is_some()
}

/// Leading-integer parse: numbers are truncated, text is read up to the first character that
/// cannot continue an integer.
fn parse_int(value: &Value) -> f64 {
    match value {
        Value::Number(n) if n.is_finite() => n.trunc(),
        Value::Number(_) => f64::NAN,
        Value::Str(text) => {
            let text = text.trim_start();
            let (sign, digits) = match text.as_bytes().first() {
                Some(b'-') => (-1.0, &text[1..]),
                Some(b'+') => (1.0, &text[1..]),
                _ => (1.0, text),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            digits[..end]
                .parse::<f64>()
                .map_or(f64::NAN, |n| sign * n)
        }
        other => parse_int(&Value::Str(other.to_string())),
    }
}

fn construct_array(args: &[Value]) -> Value {
    match args {
        [Value::Str(text)] => Value::seq(text.chars().map(|c| Value::Str(c.to_string())).collect()),
        [seq @ Value::Seq(_)] => seq.shallow_copy(),
        [Value::Record(map)] => Value::seq(map.borrow().values().cloned().collect()),
        _ => Value::seq(args.to_vec()),
    }
}

fn construct_date(args: &[Value]) -> Result<NaiveDateTime, SynthsError> {
    match args {
        [] => Ok(Utc::now().naive_utc()),
        [Value::Date(date)] => Ok(*date.borrow()),
        [Value::Str(text)] => parse_date(text)
            .ok_or_else(|| SynthsError::InvalidArguments(format!("not a date: {text}"))),
        [single] => from_epoch_millis(single.to_number())
            .ok_or_else(|| SynthsError::InvalidArguments(format!("not a timestamp: {single}"))),
        components => {
            let mut parts = [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
            for (part, value) in parts.iter_mut().zip(components) {
                *part = value.to_number();
            }
            from_components(parts)
                .ok_or_else(|| SynthsError::InvalidArguments("date out of range".to_string()))
        }
    }
}

fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|date| date.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[allow(clippy::cast_possible_truncation)]
fn from_epoch_millis(millis: f64) -> Option<NaiveDateTime> {
    if !millis.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(millis.trunc() as i64).map(|date| date.naive_utc())
}

/// Builds a date from year, zero-based month, day, hour, minute, second and millisecond,
/// carrying out-of-range components into the next larger one.
#[allow(clippy::cast_possible_truncation)]
fn from_components(parts: [f64; 7]) -> Option<NaiveDateTime> {
    if parts.iter().any(|part| !part.is_finite()) {
        return None;
    }
    let [year, month, day, hour, minute, second, milli] = parts.map(|part| part.trunc() as i64);
    let months = year.checked_mul(12)?.checked_add(month)?;
    let first = NaiveDate::from_ymd_opt(
        i32::try_from(months.div_euclid(12)).ok()?,
        u32::try_from(months.rem_euclid(12) + 1).ok()?,
        1,
    )?
    .and_hms_opt(0, 0, 0)?;
    let offset = (day - 1)
        .checked_mul(86_400_000)?
        .checked_add(hour.checked_mul(3_600_000)?)?
        .checked_add(minute.checked_mul(60_000)?)?
        .checked_add(second.checked_mul(1000)?)?
        .checked_add(milli)?;
    first.checked_add_signed(TimeDelta::try_milliseconds(offset)?)
}

#[allow(clippy::cast_precision_loss)]
fn components(date: &NaiveDateTime) -> [f64; 7] {
    [
        f64::from(date.year()),
        f64::from(date.month0()),
        f64::from(date.day()),
        f64::from(date.hour()),
        f64::from(date.minute()),
        f64::from(date.second()),
        f64::from(date.nanosecond() / 1_000_000),
    ]
}

#[derive(Copy, Clone)]
enum Component {
    Year,
    Month,
    Date,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl Component {
    fn index(self) -> usize {
        self as usize
    }

    /// Months are exposed 1-based.
    fn offset(self) -> f64 {
        match self {
            Component::Month => 1.0,
            _ => 0.0,
        }
    }
}

fn date_handle(this: &Value) -> Result<&std::cell::RefCell<NaiveDateTime>, SynthsError> {
    match this {
        Value::Date(date) => Ok(&**date),
        other => Err(SynthsError::InvalidReceiver(format!(
            "date property on a {}",
            other.kind_name()
        ))),
    }
}

fn component_property(component: Component) -> Property {
    Property::custom(
        getter(move |this| {
            let date = *date_handle(this)?.borrow();
            Ok(Value::Number(
                components(&date)[component.index()] + component.offset(),
            ))
        }),
        setter(move |this, value| {
            let handle = date_handle(this)?;
            let mut parts = components(&handle.borrow());
            parts[component.index()] = value.to_number() - component.offset();
            let rebuilt = from_components(parts).ok_or_else(|| {
                SynthsError::InvalidArguments(format!("date component out of range: {value}"))
            })?;
            *handle.borrow_mut() = rebuilt;
            Ok(())
        }),
    )
}

fn build_date_behavior() -> Rc<EntityType> {
    EntityType::builder("Date")
        .property("year", component_property(Component::Year))
        .property("month", component_property(Component::Month))
        .property("date", component_property(Component::Date))
        .property(
            "day",
            Property::read_only(Accessor::Getter(getter(|this| {
                let date = *date_handle(this)?.borrow();
                Ok(Value::from(date.weekday().num_days_from_sunday()))
            }))),
        )
        .property("hour", component_property(Component::Hour))
        .property("minute", component_property(Component::Minute))
        .property("second", component_property(Component::Second))
        .property("millisecond", component_property(Component::Millisecond))
        .property(
            "time",
            Property::custom(
                getter(|this| {
                    let date = *date_handle(this)?.borrow();
                    Ok(Value::from(date.and_utc().timestamp_millis()))
                }),
                setter(|this, value| {
                    let handle = date_handle(this)?;
                    let rebuilt = from_epoch_millis(value.to_number()).ok_or_else(|| {
                        SynthsError::InvalidArguments(format!("not a timestamp: {value}"))
                    })?;
                    *handle.borrow_mut() = rebuilt;
                    Ok(())
                }),
            ),
        )
        .finish()
}

thread_local! {
    static DATE_BEHAVIOR: Rc<EntityType> = build_date_behavior();
}

/// The behavior table shared by every date value.
#[must_use]
pub fn date_behavior() -> Rc<EntityType> {
    DATE_BEHAVIOR.with(Rc::clone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{record, vals};

    #[test]
    fn resolves_camel_cased_names() {
        assert!(matches!(
            resolve("plain-object").unwrap(),
            Constructor::Native(NativeType::PlainObject)
        ));
        assert!(matches!(
            resolve("date").unwrap(),
            Constructor::Native(NativeType::Date)
        ));
        assert!(matches!(
            resolve("float"),
            Err(SynthsError::UnknownType(name)) if name == "float"
        ));
        assert!(is_registered("double"));
    }

    #[test]
    fn integer_parses_leniently() {
        let integer = NativeType::Integer;
        assert_eq!(integer.construct(&vals![5.7]).unwrap(), Value::from(5));
        assert_eq!(integer.construct(&vals!["12px"]).unwrap(), Value::from(12));
        assert_eq!(integer.construct(&vals![" -3"]).unwrap(), Value::from(-3));
        assert!(integer.construct(&vals!["px"]).unwrap().to_number().is_nan());
    }

    #[test]
    fn scalar_constructors() {
        assert_eq!(NativeType::String.construct(&[]).unwrap(), Value::from(""));
        assert_eq!(NativeType::String.construct(&vals![4]).unwrap(), Value::from("4"));
        assert_eq!(NativeType::Number.construct(&vals!["2.5"]).unwrap(), Value::from(2.5));
        assert_eq!(NativeType::Boolean.construct(&vals![""]).unwrap(), Value::from(false));
    }

    #[test]
    fn array_constructor() {
        assert_eq!(
            NativeType::Array.construct(&vals!["ab"]).unwrap(),
            Value::seq(vals!["a", "b"])
        );
        assert_eq!(
            NativeType::Array.construct(&vals![1, 2]).unwrap(),
            Value::seq(vals![1, 2])
        );
        assert_eq!(
            NativeType::Array.construct(&[record! { "x" => 1 }]).unwrap(),
            Value::seq(vals![1])
        );
    }

    #[test]
    fn date_from_components_carries_over() {
        let date = NativeType::Date.construct(&vals![2020, 12, 1]).unwrap();
        let date = date.as_date().unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2021, 1, 1));
    }

    #[test]
    fn date_from_text_and_timestamp() {
        let parsed = construct_date(&vals!["2020-02-29T10:30:00Z"]).unwrap();
        assert_eq!((parsed.month(), parsed.day(), parsed.hour()), (2, 29, 10));
        let epoch = construct_date(&vals![0]).unwrap();
        assert_eq!(epoch.year(), 1970);
        assert!(construct_date(&vals!["yesterday"]).is_err());
    }

    #[test]
    fn date_behavior_reads_and_writes_components() {
        let behavior = date_behavior();
        let date = Value::date(construct_date(&vals!["2021-03-15"]).unwrap());
        let month = behavior.property("month").unwrap();
        assert_eq!(month.invoke(&date, &[]).unwrap(), Value::from(3));

        month.invoke(&date, &vals![13]).unwrap();
        let updated = date.as_date().unwrap();
        assert_eq!((updated.year(), updated.month()), (2022, 1));

        let day = behavior.property("day").unwrap();
        // 2022-01-15 is a Saturday.
        assert_eq!(day.invoke(&date, &[]).unwrap(), Value::from(6));
    }

    #[test]
    fn entity_constructor_accepts_only_its_instances() {
        let a = EntityType::builder("A").build().unwrap();
        let b = EntityType::builder("B").build().unwrap();
        let constructor = Constructor::Entity(Rc::clone(&a));
        assert!(constructor.accepts(&Value::Entity(a.construct(&[]).unwrap())));
        assert!(!constructor.accepts(&Value::Entity(b.construct(&[]).unwrap())));
        assert!(!constructor.accepts(&Value::from(1)));
    }
}
