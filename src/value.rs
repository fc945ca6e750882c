/*!

`Value` is the dynamic value that flows through every synthesized accessor.

Scalars (`Undefined`, `Null`, `Bool`, `Number`, `Str`) are plain data. Composite values
(`Seq`, `Record`, `Date`, `Entity`) are shared handles: cloning a `Value` clones the handle, so
a sequence read out of a property and then mutated through keyed access is mutated in place.
This is what makes per-instance copying of defaults necessary, see
[`ClonePolicy`](crate::property::ClonePolicy).

Coercions (`to_number`, `is_truthy`, `Display`) follow the loose rules of dynamic scripting
languages, because the built-in operator table is defined in terms of them.

*/

use std::cell::RefCell;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

use chrono::NaiveDateTime;
use indexmap::IndexMap;

use crate::entity::Instance;

/// An insertion-ordered string-keyed map, the payload of `Value::Record`.
pub type RecordMap = IndexMap<String, Value>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Seq(Rc<RefCell<Vec<Value>>>),
    Record(Rc<RefCell<RecordMap>>),
    Date(Rc<RefCell<NaiveDateTime>>),
    Entity(Instance),
}

impl Value {
    pub fn seq(items: Vec<Value>) -> Value {
        Value::Seq(Rc::new(RefCell::new(items)))
    }

    pub fn record(map: RecordMap) -> Value {
        Value::Record(Rc::new(RefCell::new(map)))
    }

    /// Builds a record from `(key, value)` pairs, keeping their order.
    pub fn record_from<K, V, I>(pairs: I) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::record(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn date(date: NaiveDateTime) -> Value {
        Value::Date(Rc::new(RefCell::new(date)))
    }

    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Sequences, records and entities can be indexed by key.
    #[must_use]
    pub fn is_keyed(&self) -> bool {
        matches!(self, Value::Seq(_) | Value::Record(_) | Value::Entity(_))
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Seq(_) | Value::Record(_) | Value::Date(_) | Value::Entity(_) => true,
        }
    }

    /// Numeric coercion. Text is trimmed and parsed, empty text is `0`, anything unparsable
    /// is `NaN`.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => parse_number(s),
            Value::Seq(items) => {
                let items = items.borrow();
                match items.as_slice() {
                    [] => 0.0,
                    [only] => only.to_number(),
                    _ => f64::NAN,
                }
            }
            #[allow(clippy::cast_precision_loss)]
            Value::Date(date) => date.borrow().and_utc().timestamp_millis() as f64,
            Value::Record(_) | Value::Entity(_) => f64::NAN,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_entity(&self) -> Option<&Instance> {
        match self {
            Value::Entity(instance) => Some(instance),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(date) => Some(*date.borrow()),
            _ => None,
        }
    }

    /// A copy of the items of a sequence, `None` for anything else.
    #[must_use]
    pub fn seq_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::Seq(items) => Some(items.borrow().clone()),
            _ => None,
        }
    }

    /// Identity comparison: composite values are the same when they share their handle,
    /// scalars when they are equal.
    #[must_use]
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Seq(a), Value::Seq(b)) => Rc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b),
            (Value::Date(a), Value::Date(b)) => Rc::ptr_eq(a, b),
            (Value::Entity(a), Value::Entity(b)) => a.ptr_eq(b),
            (Value::Seq(_) | Value::Record(_) | Value::Date(_) | Value::Entity(_), _)
            | (_, Value::Seq(_) | Value::Record(_) | Value::Date(_) | Value::Entity(_)) => false,
            (a, b) => a == b,
        }
    }

    /// A new sequence holding the same items; the items themselves are shared.
    #[must_use]
    pub fn shallow_copy(&self) -> Value {
        match self {
            Value::Seq(items) => Value::seq(items.borrow().clone()),
            Value::Record(map) => Value::record(map.borrow().clone()),
            Value::Date(date) => Value::date(*date.borrow()),
            other => other.clone(),
        }
    }

    /// Recursively copies sequences, records and dates. Entities stay shared.
    #[must_use]
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Seq(items) => Value::seq(items.borrow().iter().map(Value::deep_copy).collect()),
            Value::Record(map) => Value::record(
                map.borrow()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.deep_copy()))
                    .collect(),
            ),
            Value::Date(date) => Value::date(*date.borrow()),
            other => other.clone(),
        }
    }

    /// Whether `key` can be looked up on this value, i.e. whether a nested instruction could be
    /// applied to it.
    #[must_use]
    pub fn has_key(&self, key: &Value) -> bool {
        match self {
            Value::Seq(items) => {
                if key.as_str() == Some("length") {
                    return true;
                }
                let len = items.borrow().len();
                index_of(key, len).is_some_and(|index| index < len)
            }
            Value::Record(map) => map.borrow().contains_key(&key.to_string()),
            Value::Entity(instance) => instance.has_member(&key.to_string()),
            _ => false,
        }
    }

    /// A short name of the variant for messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Seq(_) => "array",
            Value::Record(_) => "object",
            Value::Date(_) => "date",
            Value::Entity(_) => "entity",
        }
    }
}

/// Resolves an index key against a length: non-negative integers are returned as they are and
/// negative ones count from the end. Non-numeric keys yield `None`.
pub(crate) fn index_of(key: &Value, len: usize) -> Option<usize> {
    let index = match key {
        Value::Number(n) => *n,
        Value::Str(s) => s.trim().parse::<i64>().ok()? as f64,
        _ => return None,
    };
    if index.is_nan() || index.fract() != 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let index = index as i64;
    if index >= 0 {
        usize::try_from(index).ok()
    } else {
        let resolved = i64::try_from(len).ok()? + index;
        usize::try_from(resolved).ok()
    }
}

fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(n) = parse_prefixed_integer(trimmed) {
        return n;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.chars().any(char::is_alphabetic)
            && !trimmed.contains(['e', 'E']) =>
        {
            f64::NAN
        }
        _ => trimmed.parse().unwrap_or(f64::NAN),
    }
}

/// Unsigned `0x`, `0o` and `0b` integer literals. Text with such a prefix but invalid digits is
/// `NaN`; text without one is `None`.
fn parse_prefixed_integer(text: &str) -> Option<f64> {
    let radix = match text.get(..2)? {
        "0x" | "0X" => 16,
        "0o" | "0O" => 8,
        "0b" | "0B" => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() {
        return Some(f64::NAN);
    }
    let mut value = 0.0_f64;
    for c in digits.chars() {
        let Some(digit) = c.to_digit(radix) else {
            return Some(f64::NAN);
        };
        value = value * f64::from(radix) + f64::from(digit);
    }
    Some(value)
}

/// Formats like script numbers: plain decimal notation for magnitudes from `1e-6` up to `1e21`,
/// exponent notation with an explicit sign outside that range.
pub(crate) fn format_number(n: f64) -> String {
    if n == 0.0 {
        "0".to_string()
    } else if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        let formatted = format!("{n:e}");
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        }
    } else if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "{s}"),
            Value::Seq(items) => {
                let items = items.borrow();
                let mut first = true;
                for item in items.iter() {
                    if !first {
                        write!(f, ",")?;
                    }
                    first = false;
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Value::Record(_) => write!(f, "[object Object]"),
            Value::Date(date) => write!(f, "{}", date.borrow().format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            Value::Entity(instance) => write!(f, "[object {}]", instance.entity_type().name()),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::Seq(items) => f.debug_tuple("Seq").field(&*items.borrow()).finish(),
            Value::Record(map) => f.debug_tuple("Record").field(&*map.borrow()).finish(),
            Value::Date(date) => f.debug_tuple("Date").field(&*date.borrow()).finish(),
            Value::Entity(instance) => f
                .debug_tuple("Entity")
                .field(&instance.entity_type().name())
                .finish(),
        }
    }
}

/// Structural equality. Entities compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Date(a), Value::Date(b)) => *a.borrow() == *b.borrow(),
            (Value::Entity(a), Value::Entity(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

macro_rules! impl_from_integer {
    ($($int:ty),*) => {
        $(
            impl From<$int> for Value {
                #[allow(clippy::cast_precision_loss, clippy::cast_lossless)]
                fn from(value: $int) -> Self {
                    Value::Number(value as f64)
                }
            }
        )*
    };
}
impl_from_integer!(i32, i64, u8, u32, u64, usize);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::seq(value)
    }
}

impl From<RecordMap> for Value {
    fn from(value: RecordMap) -> Self {
        Value::record(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::date(value)
    }
}

impl From<Instance> for Value {
    fn from(value: Instance) -> Self {
        Value::Entity(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Undefined, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vals;

    #[test]
    fn numbers_display_like_script_numbers() {
        assert_eq!(Value::from(4).to_string(), "4");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::from(-0.25).to_string(), "-0.25");
        assert_eq!(Value::seq(vals![1, "a", ()]).to_string(), "1,a,");
        assert_eq!(Value::from(1e-7).to_string(), "1e-7");
        assert_eq!(Value::from(1.5e21).to_string(), "1.5e+21");
        assert_eq!(Value::from(-0.0).to_string(), "0");
        assert_eq!(Value::from(123_456.0).to_string(), "123456");
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(Value::from(" 12 ").to_number(), 12.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("abc").to_number().is_nan());
        assert_eq!(Value::from("1e3").to_number(), 1000.0);
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
        assert_eq!(Value::from(true).to_number(), 1.0);
        assert_eq!(Value::from("0x1F").to_number(), 31.0);
        assert_eq!(Value::from(" 0b101 ").to_number(), 5.0);
        assert_eq!(Value::from("0o17").to_number(), 15.0);
        assert!(Value::from("0x").to_number().is_nan());
        assert!(Value::from("0xZZ").to_number().is_nan());
        assert!(Value::from("-0x1F").to_number().is_nan());
    }

    #[test]
    fn truthiness() {
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::seq(vec![]).is_truthy());
        assert!(Value::from("0").is_truthy());
    }

    #[test]
    fn shared_handles_and_copies() {
        let original = Value::seq(vals![1, 2]);
        let alias = original.clone();
        let copy = original.shallow_copy();
        assert!(original.same(&alias));
        assert!(!original.same(&copy));
        assert_eq!(original, copy);

        if let Value::Seq(items) = &alias {
            items.borrow_mut().push(Value::from(3));
        }
        assert_eq!(original.seq_items().unwrap().len(), 3);
        assert_eq!(copy.seq_items().unwrap().len(), 2);
    }

    #[test]
    fn deep_copy_detaches_nested_collections() {
        let inner = Value::seq(vals![1]);
        let outer = Value::record_from([("inner", inner.clone())]);
        let copy = outer.deep_copy();
        if let Value::Record(map) = &copy {
            assert!(!map.borrow()["inner"].same(&inner));
        } else {
            panic!("expected a record");
        }
    }

    #[test]
    fn negative_indices_resolve_from_the_end() {
        assert_eq!(index_of(&Value::from(-1), 5), Some(4));
        assert_eq!(index_of(&Value::from("-2"), 5), Some(3));
        assert_eq!(index_of(&Value::from(2), 5), Some(2));
        assert_eq!(index_of(&Value::from(-6), 5), None);
        assert_eq!(index_of(&Value::from("name"), 5), None);
    }

    #[test]
    fn has_key_on_sequences_and_records() {
        let seq = Value::seq(vals!["a", "b"]);
        assert!(seq.has_key(&Value::from(1)));
        assert!(seq.has_key(&Value::from(-1)));
        assert!(!seq.has_key(&Value::from(2)));
        assert!(seq.has_key(&Value::from("length")));

        let record = Value::record_from([("x", 1)]);
        assert!(record.has_key(&Value::from("x")));
        assert!(!record.has_key(&Value::from("y")));
        assert!(!Value::from(3).has_key(&Value::from("x")));
    }
}
