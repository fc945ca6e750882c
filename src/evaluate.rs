/*!

The evaluator decides what an accessor call with arguments means. It receives the property's
current value, the first call argument (the *key*), the remaining arguments and, for typed
properties, the constructor of the property's type (the *owner*). It returns an [`Outcome`]:

- [`Outcome::Read`]: the call computed a value and the accessor returns it; nothing is stored.
- [`Outcome::Write`]: the accessor should store the value and return its receiver.
- [`Outcome::WriteRequest`]: the call was not an instruction, so it is a plain write of the
  key (or, for typed properties, of a value constructed from all arguments).
- [`Outcome::Done`]: the evaluator already mutated the current value in place, or a nested
  accessor returned its receiver; the accessor returns its receiver.

The rules are tried in order:

1. a nullish current value can only be written;
2. `#name` / `#name=` calls a method: `new` constructs the owner type, otherwise the name is
   resolved on the current value (its methods, then its synthesized properties, then the
   built-ins of its kind), then on the owner's behavior table, then among the
   [utilities](crate::methods);
3. `##text` writes the literal `#text`;
4. an operator symbol with at least one operand folds the operator over the operands;
5. a property of the current entity, of the owner's table or of a date is invoked with the
   remaining arguments;
6. sequences, records and entities support keyed access: read, assign, or descend;
7. anything else is a plain write.

*/

use std::cmp::Ordering;
use std::rc::Rc;

use crate::entity::EntityType;
use crate::instruction::Instruction;
use crate::log::trace;
use crate::methods;
use crate::operator::BinOp;
use crate::property::Property;
use crate::types::{date_behavior, Constructor};
use crate::value::{index_of, Value};
use crate::SynthsError;

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Read(Value),
    Write(Value),
    WriteRequest,
    Done,
}

impl Outcome {
    fn new(value: Value, assign: bool) -> Outcome {
        if assign {
            Outcome::Write(value)
        } else {
            Outcome::Read(value)
        }
    }
}

pub fn evaluate(
    current: &Value,
    key: &Value,
    args: &[Value],
    owner: Option<&Constructor>,
) -> Result<Outcome, SynthsError> {
    if current.is_nullish() {
        return Ok(Outcome::WriteRequest);
    }

    if let Value::Str(text) = key {
        match Instruction::parse(text) {
            Instruction::Method { name, assign } => {
                return apply_method(current, &name, assign, args, owner);
            }
            Instruction::Literal(literal) => {
                if !args.is_empty() {
                    return Err(SynthsError::InvalidArguments(format!(
                        "the literal {text} takes no arguments"
                    )));
                }
                return Ok(Outcome::Write(Value::Str(literal)));
            }
            Instruction::Operator { op, assign } if !args.is_empty() => {
                return apply_operator(current, op, assign, args, owner);
            }
            Instruction::Operator { .. } | Instruction::Key(_) => {}
        }

        if let Some(property) = find_property(current, text, owner) {
            let result = property.invoke(current, args)?;
            return Ok(if result.same(current) {
                Outcome::Done
            } else {
                Outcome::Read(result)
            });
        }
    }

    if current.is_keyed() && matches!(key, Value::Str(_) | Value::Number(_)) {
        return evaluate_keyed(current, key, args);
    }

    Ok(Outcome::WriteRequest)
}

/// The behavior tables a member of `current` is looked up in, most specific first.
fn behavior_tables(current: &Value, owner: Option<&Constructor>) -> Vec<Rc<EntityType>> {
    let mut tables = Vec::with_capacity(2);
    if let Value::Entity(instance) = current {
        tables.push(Rc::clone(instance.entity_type()));
    }
    if let Some(table) = owner.and_then(Constructor::behavior) {
        if !tables.iter().any(|known| Rc::ptr_eq(known, &table)) {
            tables.push(table);
        }
    }
    if matches!(current, Value::Date(_)) && owner.is_none() {
        tables.push(date_behavior());
    }
    tables
}

fn find_property(current: &Value, name: &str, owner: Option<&Constructor>) -> Option<Property> {
    behavior_tables(current, owner)
        .iter()
        .find_map(|table| table.property(name).cloned())
}

fn apply_method(
    current: &Value,
    name: &str,
    assign: bool,
    args: &[Value],
    owner: Option<&Constructor>,
) -> Result<Outcome, SynthsError> {
    if name == "new" {
        let constructor = owner.ok_or_else(|| {
            SynthsError::InvalidMethod("new needs a typed property".to_string())
        })?;
        return Ok(Outcome::Write(constructor.construct(args)?));
    }

    let own = match current {
        Value::Entity(instance) => instance.entity_type().method(name).cloned(),
        _ => None,
    };
    let result = if let Some(method) = own {
        method(current, args)?
    } else if let Some(property) = find_property(current, name, owner) {
        property.invoke(current, args)?
    } else if let Some(builtin) = methods::builtin(current, name) {
        builtin(current, args)?
    } else if let Some(method) = owner
        .and_then(Constructor::behavior)
        .and_then(|table| table.method(name).cloned())
    {
        method(current, args)?
    } else if let Some(utility) = methods::utility(name) {
        let mut utility_args = Vec::with_capacity(args.len() + 1);
        utility_args.push(current.clone());
        utility_args.extend_from_slice(args);
        utility(&utility_args)?
    } else {
        return Err(SynthsError::InvalidMethod(name.to_string()));
    };
    trace!("method {name} applied to a {}", current.kind_name());
    Ok(Outcome::new(result, assign))
}

fn apply_operator(
    current: &Value,
    op: BinOp,
    assign: bool,
    args: &[Value],
    owner: Option<&Constructor>,
) -> Result<Outcome, SynthsError> {
    let override_fn = match owner {
        Some(Constructor::Entity(entity_type)) => entity_type.operator(op).cloned(),
        _ => None,
    };
    let mut accumulated = current.clone();
    for operand in args {
        let method = match &accumulated {
            Value::Entity(instance) => instance.entity_type().method(op.symbol()).cloned(),
            _ => None,
        };
        accumulated = if let Some(method) = method {
            method(&accumulated, std::slice::from_ref(operand))?
        } else if let Some(f) = &override_fn {
            f(&accumulated, operand)?
        } else {
            op.apply(&accumulated, operand)
        };
    }
    Ok(Outcome::new(accumulated, assign))
}

fn evaluate_keyed(current: &Value, key: &Value, args: &[Value]) -> Result<Outcome, SynthsError> {
    match args {
        [] => Ok(Outcome::Read(get_key(current, key))),
        [next] => {
            let existing = get_key(current, key);
            if existing.has_key(next) {
                evaluate(&existing, next, &[], None)
            } else {
                set_key(current, key, next.clone())?;
                Ok(Outcome::Done)
            }
        }
        [next, rest @ ..] => {
            let existing = get_key(current, key);
            if existing.is_nullish() {
                return Err(SynthsError::InvalidKey(key.to_string()));
            }
            evaluate(&existing, next, rest, None)
        }
    }
}

/// Reads `current[key]`. Missing keys read as `Undefined`.
pub(crate) fn get_key(current: &Value, key: &Value) -> Value {
    match current {
        Value::Seq(items) => {
            let items = items.borrow();
            if key.as_str() == Some("length") {
                return Value::from(items.len());
            }
            index_of(key, items.len())
                .and_then(|index| items.get(index).cloned())
                .unwrap_or_default()
        }
        Value::Record(map) => map.borrow().get(&key.to_string()).cloned().unwrap_or_default(),
        Value::Entity(instance) => instance.field(&key.to_string()),
        _ => Value::Undefined,
    }
}

/// Assigns `current[key]`. Only index keys can be assigned on sequences, and a sequence grows
/// by appending at its end, never across a gap.
pub(crate) fn set_key(current: &Value, key: &Value, value: Value) -> Result<(), SynthsError> {
    match current {
        Value::Seq(items) => {
            let mut items = items.borrow_mut();
            let index = index_of(key, items.len())
                .ok_or_else(|| SynthsError::InvalidKey(key.to_string()))?;
            match index.cmp(&items.len()) {
                Ordering::Less => items[index] = value,
                Ordering::Equal => items.push(value),
                Ordering::Greater => {
                    return Err(SynthsError::InvalidKey(format!(
                        "{key} is past the end of a sequence of length {}",
                        items.len()
                    )));
                }
            }
            Ok(())
        }
        Value::Record(map) => {
            map.borrow_mut().insert(key.to_string(), value);
            Ok(())
        }
        Value::Entity(instance) => {
            instance.set_field(&key.to_string(), value);
            Ok(())
        }
        other => Err(SynthsError::InvalidKey(format!(
            "{key} on a {}",
            other.kind_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use crate::types::NativeType;
    use crate::{record, vals};

    fn eval(current: &Value, args: &[Value]) -> Outcome {
        evaluate(current, &args[0], &args[1..], None).unwrap()
    }

    #[test]
    fn nullish_current_is_always_written() {
        assert_eq!(eval(&Value::Undefined, &vals!["+", 1]), Outcome::WriteRequest);
        assert_eq!(eval(&Value::Null, &vals!["#trim"]), Outcome::WriteRequest);
    }

    #[test]
    fn plain_values_are_write_requests() {
        assert_eq!(eval(&Value::from(1), &vals![5]), Outcome::WriteRequest);
        assert_eq!(eval(&Value::from("a"), &vals!["b"]), Outcome::WriteRequest);
        // An operator without operands is a plain value too.
        assert_eq!(eval(&Value::from(1), &vals!["+"]), Outcome::WriteRequest);
    }

    #[test]
    fn operators_read_or_assign() {
        let five = Value::from(5);
        assert_eq!(eval(&five, &vals!["+", 3]), Outcome::Read(Value::from(8)));
        assert_eq!(eval(&five, &vals!["+=", 3]), Outcome::Write(Value::from(8)));
        assert_eq!(eval(&five, &vals!["*", 2, 3]), Outcome::Read(Value::from(30)));
        assert_eq!(
            eval(&Value::from("C"), &vals!["r+", "#"]),
            Outcome::Read(Value::from("#C"))
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            eval(&Value::from("x"), &vals!["##sharp"]),
            Outcome::Write(Value::from("#sharp"))
        );
        assert!(matches!(
            evaluate(&Value::from("x"), &Value::from("##sharp"), &vals![1], None),
            Err(SynthsError::InvalidArguments(_))
        ));
    }

    #[test]
    fn methods_on_builtin_kinds() {
        let text = Value::from("abc");
        assert_eq!(
            eval(&text, &vals!["#to-upper-case"]),
            Outcome::Read(Value::from("ABC"))
        );
        assert_eq!(
            eval(&text, &vals!["#slice=", 1]),
            Outcome::Write(Value::from("bc"))
        );
        assert!(matches!(
            evaluate(&text, &Value::from("#explode"), &[], None),
            Err(SynthsError::InvalidMethod(name)) if name == "explode"
        ));
    }

    #[test]
    fn utilities_receive_the_current_value_first() {
        let items = Value::seq(vals![3, 1, 2]);
        assert_eq!(eval(&items, &vals!["#max"]), Outcome::Read(Value::from(3)));
        assert_eq!(eval(&items, &vals!["#size"]), Outcome::Read(Value::from(3)));
    }

    #[test]
    fn new_constructs_the_owner_type() {
        let owner = Constructor::Native(NativeType::Array);
        let outcome =
            evaluate(&Value::seq(vals![1]), &Value::from("#new"), &vals![7, 8], Some(&owner))
                .unwrap();
        assert_eq!(outcome, Outcome::Write(Value::seq(vals![7, 8])));
        assert!(matches!(
            evaluate(&Value::from(1), &Value::from("#new"), &[], None),
            Err(SynthsError::InvalidMethod(_))
        ));
    }

    #[test]
    fn keyed_access_on_sequences() {
        let items = Value::seq(vals![0, 1, 2, 3, 4]);
        assert_eq!(eval(&items, &vals![-1]), Outcome::Read(Value::from(4)));
        assert_eq!(eval(&items, &vals!["length"]), Outcome::Read(Value::from(5)));
        assert_eq!(eval(&items, &vals![0, "zero"]), Outcome::Done);
        assert_eq!(items.seq_items().unwrap()[0], Value::from("zero"));
        assert_eq!(eval(&items, &vals![5, 5]), Outcome::Done);
        assert_eq!(items.seq_items().unwrap().len(), 6);
        assert!(matches!(
            evaluate(&items, &Value::from("name"), &vals!["x"], None),
            Err(SynthsError::InvalidKey(_))
        ));
    }

    #[test]
    fn keyed_access_descends_into_records() {
        let nested = record! { "inner" => record! { "x" => 1 } };
        assert_eq!(eval(&nested, &vals!["inner", "x"]), Outcome::Read(Value::from(1)));
        assert_eq!(eval(&nested, &vals!["inner", "x", 2]), Outcome::Done);
        assert_eq!(eval(&nested, &vals!["inner", "x"]), Outcome::Read(Value::from(2)));
        assert_eq!(
            eval(&nested, &vals!["inner", "x", "+", 3]),
            Outcome::Read(Value::from(5))
        );
        assert!(matches!(
            evaluate(&nested, &Value::from("missing"), &vals!["a", 1], None),
            Err(SynthsError::InvalidKey(key)) if key == "missing"
        ));
    }

    #[test]
    fn method_instructions_reach_synthesized_properties() {
        let counter = EntityType::builder("Counter")
            .property(
                "count",
                Property::basic(
                    crate::property::StorageKey::generate(),
                    Value::from(1),
                    crate::property::ClonePolicy::Identity,
                ),
            )
            .build()
            .unwrap();
        let owner = Constructor::Entity(Rc::clone(&counter));
        let instance = Value::Entity(counter.construct(&[]).unwrap());

        assert_eq!(
            evaluate(&instance, &Value::from("#count"), &[], Some(&owner)).unwrap(),
            Outcome::Read(Value::from(1))
        );
        // A write through the property returns the instance, which `#name=` then stores.
        assert_eq!(
            evaluate(&instance, &Value::from("#count="), &vals![4], Some(&owner)).unwrap(),
            Outcome::Write(instance.clone())
        );
        assert_eq!(instance.call("count", &[]).unwrap(), Value::from(4));
    }

    #[test]
    fn sequences_grow_by_one_slot_at_most() {
        let items = Value::seq(vals!["a"]);
        assert_eq!(eval(&items, &vals![1, "b"]), Outcome::Done);
        assert_eq!(items, Value::seq(vals!["a", "b"]));
        assert!(matches!(
            evaluate(&items, &Value::from(4.0e18), &vals!["x"], None),
            Err(SynthsError::InvalidKey(_))
        ));
        assert!(matches!(
            evaluate(&items, &Value::from(3), &vals!["x"], None),
            Err(SynthsError::InvalidKey(_))
        ));
        assert_eq!(items.seq_items().unwrap().len(), 2);
    }

    #[test]
    fn properties_of_entities_are_invoked() {
        let holder = EntityType::builder("Holder")
            .property("answer", Property::constant(Value::from(42)))
            .build()
            .unwrap();
        let instance = Value::Entity(holder.construct(&[]).unwrap());
        assert_eq!(eval(&instance, &vals!["answer"]), Outcome::Read(Value::from(42)));
    }

    #[test]
    fn entity_operator_methods_win_over_builtins() {
        let wrapper = EntityType::builder("Wrapper")
            .method("+", |_, args| Ok(Value::from(format!("wrapped {}", args[0]))))
            .build()
            .unwrap();
        let instance = Value::Entity(wrapper.construct(&[]).unwrap());
        assert_eq!(
            eval(&instance, &vals!["+", 1]),
            Outcome::Read(Value::from("wrapped 1"))
        );
    }

    #[test]
    fn owner_operator_overrides_apply() {
        let owner_type = EntityType::builder("Modular")
            .operator(BinOp::Add, |lhs, rhs| {
                Ok(Value::from((lhs.to_number() + rhs.to_number()) % 7.0))
            })
            .build()
            .unwrap();
        let owner = Constructor::Entity(owner_type);
        let outcome =
            evaluate(&Value::from(5), &Value::from("+"), &vals![4], Some(&owner)).unwrap();
        assert_eq!(outcome, Outcome::Read(Value::from(2)));
    }

    #[test]
    fn dates_expose_their_fields() {
        let date = Value::date(
            chrono::NaiveDate::from_ymd_opt(2024, 5, 17)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        );
        assert_eq!(eval(&date, &vals!["month"]), Outcome::Read(Value::from(5)));
        assert_eq!(eval(&date, &vals!["hour", 11]), Outcome::Done);
        assert_eq!(eval(&date, &vals!["hour"]), Outcome::Read(Value::from(11)));
    }
}
