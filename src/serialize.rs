/*!

Serializers turn an entity instance into a JSON object built from its readable properties.
A serializer is chosen once per entity type from *mode arguments*:

| mode arguments            | mode      | output                                              |
|---------------------------|-----------|-----------------------------------------------------|
| none                      | basic     | every readable property, in declaration order       |
| `"-", "a", "b"`           | exclusive | like basic, without `a` and `b`                     |
| a record `{out: "prop"}`  | map       | `out` holds the value of property `prop`            |
| `"a", "b"`                | inclusive | exactly `a` and `b`, in that order                  |

Naming something that is not a readable property of the instance is reported through the
[channel](crate::channel) and the entry is left out. Map mode reports the output key, and also
accepts sources that are not text at all: those never name a property, so they are reported
every time the instance is serialized.

Values are converted as follows: integral numbers become JSON integers, `Undefined` entries
are left out (inside sequences they become `null`), dates become ISO-8601 text with
millisecond precision, and nested entities are serialized with their own serializer.

*/

use indexmap::IndexMap;
use serde_json::{Map, Number};

use crate::channel::{self, ReportKind};
use crate::entity::Instance;
use crate::property::Property;
use crate::value::Value;
use crate::SynthsError;

const EXCLUSIVE_MARKER: &str = "-";
/// Largest magnitude at which every integer is exactly representable as an `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Serializer {
    Basic,
    Exclusive(Vec<String>),
    /// Output key to source property name; `None` when the declared source was not text.
    Map(IndexMap<String, Option<String>>),
    Inclusive(Vec<String>),
}

impl Serializer {
    pub fn basic() -> Serializer {
        Serializer::Basic
    }

    pub fn exclusive<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Serializer {
        Serializer::Exclusive(keys.into_iter().map(Into::into).collect())
    }

    pub fn map<K: Into<String>, V: Into<String>>(
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Serializer {
        Serializer::Map(
            entries
                .into_iter()
                .map(|(key, source)| (key.into(), Some(source.into())))
                .collect(),
        )
    }

    pub fn inclusive<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Serializer {
        Serializer::Inclusive(keys.into_iter().map(Into::into).collect())
    }

    pub fn serialize(
        &self,
        instance: &Instance,
    ) -> Result<Map<String, serde_json::Value>, SynthsError> {
        let this = Value::Entity(instance.clone());
        let entity_type = instance.entity_type();
        let mut output = Map::new();

        match self {
            Serializer::Basic | Serializer::Exclusive(_) => {
                let excluded: &[String] = match self {
                    Serializer::Exclusive(keys) => keys,
                    _ => &[],
                };
                for (name, property) in entity_type.properties() {
                    if !property.mode().is_readable() || excluded.iter().any(|key| key == name) {
                        continue;
                    }
                    insert(&mut output, name, property.invoke(&this, &[])?)?;
                }
            }
            Serializer::Map(entries) => {
                for (key, source) in entries {
                    match source.as_deref().and_then(|source| readable(instance, source)) {
                        Some(property) => insert(&mut output, key, property.invoke(&this, &[])?)?,
                        None => channel::not_a_property(key)?,
                    }
                }
            }
            Serializer::Inclusive(keys) => {
                for key in keys {
                    if let Some(property) = readable(instance, key) {
                        insert(&mut output, key, property.invoke(&this, &[])?)?;
                    } else {
                        channel::not_a_property(key)?;
                    }
                }
            }
        }
        Ok(output)
    }
}

/// Chooses a serializer from mode arguments. Inclusive and exclusive keys must be text.
pub fn make_serializer(mode_args: &[Value]) -> Result<Serializer, SynthsError> {
    match mode_args {
        [] => Ok(Serializer::Basic),
        [Value::Str(marker), keys @ ..] if marker == EXCLUSIVE_MARKER => {
            Ok(Serializer::Exclusive(text_keys(keys)?))
        }
        [Value::Record(map), ..] => {
            let entries = map
                .borrow()
                .iter()
                .map(|(key, source)| (key.clone(), source.as_str().map(str::to_string)))
                .collect();
            Ok(Serializer::Map(entries))
        }
        keys => Ok(Serializer::Inclusive(text_keys(keys)?)),
    }
}

fn text_keys(keys: &[Value]) -> Result<Vec<String>, SynthsError> {
    keys.iter()
        .map(|key| match key {
            Value::Str(key) => Ok(key.clone()),
            other => Err(SynthsError::InvalidSerializerKey(format!("{other:?}"))),
        })
        .collect()
}

fn readable(instance: &Instance, name: &str) -> Option<Property> {
    instance
        .entity_type()
        .property(name)
        .filter(|property| property.mode().is_readable())
        .cloned()
}

fn insert(
    output: &mut Map<String, serde_json::Value>,
    key: &str,
    value: Value,
) -> Result<(), SynthsError> {
    if let Some(json) = to_json_value(&value)? {
        output.insert(key.to_string(), json);
    }
    Ok(())
}

/// Converts a value to JSON. `None` means the value is left out.
pub fn to_json_value(value: &Value) -> Result<Option<serde_json::Value>, SynthsError> {
    Ok(Some(match value {
        Value::Undefined => return Ok(None),
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number(*n),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Seq(items) => {
            let items = items.borrow().clone();
            let mut array = Vec::with_capacity(items.len());
            for item in &items {
                array.push(to_json_value(item)?.unwrap_or(serde_json::Value::Null));
            }
            serde_json::Value::Array(array)
        }
        Value::Record(map) => {
            let entries = map.borrow().clone();
            let mut object = Map::new();
            for (key, item) in &entries {
                if let Some(json) = to_json_value(item)? {
                    object.insert(key.clone(), json);
                }
            }
            serde_json::Value::Object(object)
        }
        Value::Date(_) => serde_json::Value::String(value.to_string()),
        Value::Entity(instance) => match instance.entity_type().serializer() {
            Some(serializer) => serde_json::Value::Object(serializer.serialize(instance)?),
            None => {
                channel::report(
                    ReportKind::Error,
                    &format!(
                        "Invalid value for toJSON: {} has no serializer",
                        instance.entity_type().name()
                    ),
                )?;
                return Ok(None);
            }
        },
    }))
}

#[allow(clippy::cast_possible_truncation)]
fn number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::capture_reports;
    use crate::entity::EntityType;
    use crate::property::{Mutator, StorageKey};
    use crate::{record, vals};
    use serde_json::json;

    fn sample(serializer: Serializer) -> Instance {
        EntityType::builder("Sample")
            .property("a", Property::constant(Value::from(1)))
            .property("b", Property::constant(Value::from("two")))
            .property("c", Property::constant(Value::from(3.5)))
            .property(
                "hidden",
                Property::write_only(Mutator::Var(StorageKey::Named("_hidden".into()))),
            )
            .serializer(serializer)
            .build()
            .unwrap()
            .construct(&[])
            .unwrap()
    }

    #[test]
    fn chooses_mode_from_arguments() {
        assert_eq!(make_serializer(&[]).unwrap(), Serializer::Basic);
        assert_eq!(
            make_serializer(&vals!["-", "a"]).unwrap(),
            Serializer::exclusive(["a"])
        );
        assert_eq!(
            make_serializer(&vals!["b", "a"]).unwrap(),
            Serializer::inclusive(["b", "a"])
        );
        assert_eq!(
            make_serializer(&[record! { "out" => "a" }]).unwrap(),
            Serializer::map([("out", "a")])
        );
        assert!(matches!(
            make_serializer(&vals!["a", 1]),
            Err(SynthsError::InvalidSerializerKey(_))
        ));
        assert_eq!(
            make_serializer(&[record! { "out" => 1 }]).unwrap(),
            Serializer::Map(IndexMap::from([("out".to_string(), None)]))
        );
    }

    #[test]
    fn basic_skips_write_only_properties() {
        let json = sample(Serializer::Basic).to_json().unwrap();
        assert_eq!(json, json!({"a": 1, "b": "two", "c": 3.5}));
    }

    #[test]
    fn exclusive_drops_named_keys() {
        let json = sample(Serializer::exclusive(["b"])).to_json().unwrap();
        assert_eq!(json, json!({"a": 1, "c": 3.5}));
    }

    #[test]
    fn map_renames() {
        let json = sample(Serializer::map([("x", "c"), ("y", "a")])).to_json().unwrap();
        assert_eq!(json, json!({"x": 3.5, "y": 1}));
    }

    #[test]
    fn output_keeps_key_order() {
        let keys = |serializer: Serializer| {
            sample(serializer)
                .to_json()
                .unwrap()
                .as_object()
                .unwrap()
                .keys()
                .cloned()
                .collect::<Vec<_>>()
        };
        assert_eq!(keys(Serializer::Basic), ["a", "b", "c"]);
        assert_eq!(keys(Serializer::inclusive(["c", "a"])), ["c", "a"]);
    }

    #[test]
    fn map_reports_unknown_sources_by_output_key() {
        let reports = capture_reports();
        let serializer =
            make_serializer(&[record! { "x" => "c", "missing" => "nope", "odd" => 1 }]).unwrap();
        let json = sample(serializer).to_json().unwrap();
        assert_eq!(json, json!({"x": 3.5}));
        let reports = reports.borrow();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].0, ReportKind::Error);
        assert_eq!(reports[0].1, "Invalid key for toJSON: missing is not a property");
        assert_eq!(reports[1].1, "Invalid key for toJSON: odd is not a property");
    }

    #[test]
    fn inclusive_reports_unknown_keys() {
        let reports = capture_reports();
        let json = sample(Serializer::inclusive(["c", "nope", "hidden"]))
            .to_json()
            .unwrap();
        assert_eq!(json, json!({"c": 3.5}));
        let reports = reports.borrow();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].0, ReportKind::Error);
        assert_eq!(reports[0].1, "Invalid key for toJSON: nope is not a property");
    }

    #[test]
    fn converts_values() {
        assert_eq!(to_json_value(&Value::Undefined).unwrap(), None);
        assert_eq!(to_json_value(&Value::from(2.0)).unwrap(), Some(json!(2)));
        assert_eq!(to_json_value(&Value::from(f64::NAN)).unwrap(), Some(json!(null)));
        assert_eq!(
            to_json_value(&Value::seq(vals![1, ()])).unwrap(),
            Some(json!([1, null]))
        );
        assert_eq!(
            to_json_value(&record! { "x" => (), "y" => true }).unwrap(),
            Some(json!({"y": true}))
        );
        let date = chrono::NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(
            to_json_value(&Value::date(date)).unwrap(),
            Some(json!("2020-01-02T03:04:05.000Z"))
        );
    }

    #[test]
    fn nested_entity_without_serializer_is_reported() {
        let reports = capture_reports();
        let bare = EntityType::builder("Bare").build().unwrap();
        let value = Value::Entity(bare.construct(&[]).unwrap());
        assert_eq!(to_json_value(&value).unwrap(), None);
        assert_eq!(reports.borrow().len(), 1);
    }
}
