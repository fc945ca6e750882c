//! Built-in methods of the native value kinds and the general-purpose utility functions the
//! evaluator falls back to for `#name` instructions.
//!
//! Built-ins are looked up by receiver kind, so `#slice` on text and `#slice` on a sequence are
//! different functions. Utilities work on any value and receive it as their first argument.
//! Indices follow the usual scripting conventions: negative positions count from the end and
//! out-of-range positions are clamped.

use crate::value::{format_number, Value};
use crate::SynthsError;

/// A built-in method: receiver and arguments.
pub type Builtin = fn(&Value, &[Value]) -> Result<Value, SynthsError>;
/// A utility function: the target value followed by the arguments.
pub type Utility = fn(&[Value]) -> Result<Value, SynthsError>;

/// Finds the built-in method `name` for the kind of `receiver`.
#[must_use]
pub fn builtin(receiver: &Value, name: &str) -> Option<Builtin> {
    let method: Builtin = match (receiver, name) {
        (_, "toString") => |this, _| Ok(Value::Str(this.to_string())),
        (_, "valueOf") => |this, _| Ok(this.clone()),

        (Value::Str(_), "toUpperCase") => |this, _| map_text(this, str::to_uppercase),
        (Value::Str(_), "toLowerCase") => |this, _| map_text(this, str::to_lowercase),
        (Value::Str(_), "trim") => |this, _| map_text(this, |s| s.trim().to_string()),
        (Value::Str(_), "charAt") => text_char_at,
        (Value::Str(_), "indexOf") => text_index_of,
        (Value::Str(_), "slice") => text_slice,
        (Value::Str(_), "includes") => |this, args| {
            Ok(Value::Bool(text(this).contains(&arg(args, 0).to_string())))
        },
        (Value::Str(_), "startsWith") => |this, args| {
            Ok(Value::Bool(text(this).starts_with(&arg(args, 0).to_string())))
        },
        (Value::Str(_), "endsWith") => |this, args| {
            Ok(Value::Bool(text(this).ends_with(&arg(args, 0).to_string())))
        },
        (Value::Str(_), "repeat") => text_repeat,
        (Value::Str(_), "split") => text_split,
        (Value::Str(_), "concat") => |this, args| {
            let mut result = text(this).to_string();
            for value in args {
                result.push_str(&value.to_string());
            }
            Ok(Value::Str(result))
        },

        (Value::Number(_), "toFixed") => number_to_fixed,

        (Value::Seq(_), "push") => seq_push,
        (Value::Seq(_), "pop") => seq_pop,
        (Value::Seq(_), "slice") => seq_slice,
        (Value::Seq(_), "indexOf") => |this, args| {
            let needle = arg(args, 0);
            Ok(items(this)
                .iter()
                .position(|item| *item == needle)
                .map_or(Value::from(-1), Value::from))
        },
        (Value::Seq(_), "includes") => |this, args| {
            let needle = arg(args, 0);
            Ok(Value::Bool(items(this).contains(&needle)))
        },
        (Value::Seq(_), "join") => seq_join,
        (Value::Seq(_), "reverse") => |this, _| {
            if let Value::Seq(items) = this {
                items.borrow_mut().reverse();
            }
            Ok(this.clone())
        },
        (Value::Seq(_), "concat") => |this, args| {
            let mut result = items(this);
            for value in args {
                match value {
                    Value::Seq(more) => result.extend(more.borrow().iter().cloned()),
                    other => result.push(other.clone()),
                }
            }
            Ok(Value::seq(result))
        },

        (Value::Record(_), "hasOwnProperty") => {
            |this, args| Ok(Value::Bool(this.has_key(&arg(args, 0))))
        }

        _ => return None,
    };
    Some(method)
}

/// Finds the utility function `name`.
#[must_use]
pub fn utility(name: &str) -> Option<Utility> {
    let utility: Utility = match name {
        "size" => |args| Ok(Value::from(collection(&arg(args, 0)).len())),
        "keys" => util_keys,
        "values" => |args| Ok(Value::seq(collection(&arg(args, 0)))),
        "toArray" => |args| Ok(Value::seq(collection(&arg(args, 0)))),
        "first" => |args| Ok(collection(&arg(args, 0)).first().cloned().unwrap_or_default()),
        "last" => |args| Ok(collection(&arg(args, 0)).last().cloned().unwrap_or_default()),
        "contains" | "includes" => |args| {
            let needle = arg(args, 1);
            Ok(Value::Bool(match arg(args, 0) {
                Value::Str(text) => text.contains(&needle.to_string()),
                other => collection(&other).contains(&needle),
            }))
        },
        "has" => |args| Ok(Value::Bool(arg(args, 0).has_key(&arg(args, 1)))),
        "max" => |args| Ok(extreme(&arg(args, 0), |a, b| a > b)),
        "min" => |args| Ok(extreme(&arg(args, 0), |a, b| a < b)),
        "sum" => |args| {
            Ok(Value::Number(
                collection(&arg(args, 0)).iter().map(Value::to_number).sum(),
            ))
        },
        "uniq" => |args| {
            let mut unique: Vec<Value> = Vec::new();
            for item in collection(&arg(args, 0)) {
                if !unique.contains(&item) {
                    unique.push(item);
                }
            }
            Ok(Value::seq(unique))
        },
        "isEmpty" => |args| Ok(Value::Bool(collection(&arg(args, 0)).is_empty())),
        "clone" => |args| Ok(arg(args, 0).shallow_copy()),
        "cloneDeep" => |args| Ok(arg(args, 0).deep_copy()),
        _ => return None,
    };
    Some(utility)
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn text(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

fn items(value: &Value) -> Vec<Value> {
    value.seq_items().unwrap_or_default()
}

fn map_text(this: &Value, f: impl Fn(&str) -> String) -> Result<Value, SynthsError> {
    Ok(Value::Str(f(text(this))))
}

/// The elements of a collection-like value: sequence items, record values, the characters of
/// text. Anything else is empty.
fn collection(value: &Value) -> Vec<Value> {
    match value {
        Value::Seq(items) => items.borrow().clone(),
        Value::Record(map) => map.borrow().values().cloned().collect(),
        Value::Str(text) => text.chars().map(|c| Value::Str(c.to_string())).collect(),
        _ => Vec::new(),
    }
}

fn extreme(value: &Value, better: fn(f64, f64) -> bool) -> Value {
    let mut best: Option<Value> = None;
    for item in collection(value) {
        let n = item.to_number();
        if n.is_nan() {
            continue;
        }
        if best.as_ref().is_none_or(|current| better(n, current.to_number())) {
            best = Some(item);
        }
    }
    best.unwrap_or_default()
}

/// Resolves a relative position against `len`: negative counts from the end, the result is
/// clamped to `0..=len`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn relative(position: &Value, len: usize, default: usize) -> usize {
    if position.is_undefined() {
        return default;
    }
    let n = position.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn text_char_at(this: &Value, args: &[Value]) -> Result<Value, SynthsError> {
    let chars: Vec<char> = text(this).chars().collect();
    let index = arg(args, 0).to_number();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let c = if index >= 0.0 {
        chars.get(index as usize)
    } else {
        None
    };
    Ok(Value::Str(c.map(char::to_string).unwrap_or_default()))
}

fn text_index_of(this: &Value, args: &[Value]) -> Result<Value, SynthsError> {
    let haystack = text(this);
    let needle = arg(args, 0).to_string();
    Ok(haystack.find(&needle).map_or(Value::from(-1), |byte| {
        Value::from(haystack[..byte].chars().count())
    }))
}

fn text_slice(this: &Value, args: &[Value]) -> Result<Value, SynthsError> {
    let chars: Vec<char> = text(this).chars().collect();
    let start = relative(&arg(args, 0), chars.len(), 0);
    let end = relative(&arg(args, 1), chars.len(), chars.len());
    Ok(Value::Str(if start < end {
        chars[start..end].iter().collect()
    } else {
        String::new()
    }))
}

fn text_repeat(this: &Value, args: &[Value]) -> Result<Value, SynthsError> {
    let count = arg(args, 0).to_number();
    if !(0.0..=f64::from(u32::MAX)).contains(&count) {
        return Err(SynthsError::InvalidArguments(format!(
            "invalid repeat count {}",
            format_number(count)
        )));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = count as usize;
    Ok(Value::Str(text(this).repeat(count)))
}

fn text_split(this: &Value, args: &[Value]) -> Result<Value, SynthsError> {
    let source = text(this);
    let parts = match arg(args, 0) {
        Value::Undefined => vec![Value::from(source)],
        separator => {
            let separator = separator.to_string();
            if separator.is_empty() {
                source.chars().map(|c| Value::Str(c.to_string())).collect()
            } else {
                source.split(separator.as_str()).map(Value::from).collect()
            }
        }
    };
    Ok(Value::seq(parts))
}

fn number_to_fixed(this: &Value, args: &[Value]) -> Result<Value, SynthsError> {
    let digits = match arg(args, 0) {
        Value::Undefined => 0.0,
        digits => digits.to_number(),
    };
    if !(0.0..=100.0).contains(&digits) {
        return Err(SynthsError::InvalidArguments(format!(
            "toFixed digits out of range: {}",
            format_number(digits)
        )));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let digits = digits as usize;
    Ok(Value::Str(format!("{:.*}", digits, this.to_number())))
}

/// Appends the arguments in place and returns the new length.
fn seq_push(this: &Value, args: &[Value]) -> Result<Value, SynthsError> {
    let Value::Seq(items) = this else {
        return Ok(Value::Undefined);
    };
    let mut items = items.borrow_mut();
    items.extend_from_slice(args);
    Ok(Value::from(items.len()))
}

fn seq_pop(this: &Value, _args: &[Value]) -> Result<Value, SynthsError> {
    let Value::Seq(items) = this else {
        return Ok(Value::Undefined);
    };
    let popped = items.borrow_mut().pop();
    Ok(popped.unwrap_or_default())
}

fn seq_slice(this: &Value, args: &[Value]) -> Result<Value, SynthsError> {
    let items = items(this);
    let start = relative(&arg(args, 0), items.len(), 0);
    let end = relative(&arg(args, 1), items.len(), items.len());
    Ok(Value::seq(if start < end {
        items[start..end].to_vec()
    } else {
        Vec::new()
    }))
}

fn seq_join(this: &Value, args: &[Value]) -> Result<Value, SynthsError> {
    let separator = match arg(args, 0) {
        Value::Undefined => ",".to_string(),
        separator => separator.to_string(),
    };
    let joined = items(this)
        .iter()
        .map(|item| {
            if item.is_nullish() {
                String::new()
            } else {
                item.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(&separator);
    Ok(Value::Str(joined))
}

fn util_keys(args: &[Value]) -> Result<Value, SynthsError> {
    let keys = match arg(args, 0) {
        Value::Record(map) => map.borrow().keys().map(|key| Value::from(key.as_str())).collect(),
        Value::Seq(items) => (0..items.borrow().len())
            .map(|index| Value::from(index.to_string()))
            .collect(),
        Value::Str(text) => (0..text.chars().count())
            .map(|index| Value::from(index.to_string()))
            .collect(),
        _ => Vec::new(),
    };
    Ok(Value::seq(keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{record, vals};

    fn call(receiver: &Value, name: &str, args: &[Value]) -> Value {
        builtin(receiver, name).expect("builtin exists")(receiver, args).unwrap()
    }

    fn util(name: &str, args: &[Value]) -> Value {
        utility(name).expect("utility exists")(args).unwrap()
    }

    #[test]
    fn text_methods() {
        let text = Value::from("Hello");
        assert_eq!(call(&text, "toUpperCase", &[]), Value::from("HELLO"));
        assert_eq!(call(&text, "slice", &vals![-3]), Value::from("llo"));
        assert_eq!(call(&text, "slice", &vals![1, 3]), Value::from("el"));
        assert_eq!(call(&text, "charAt", &vals![1]), Value::from("e"));
        assert_eq!(call(&text, "indexOf", &vals!["l"]), Value::from(2));
        assert_eq!(call(&text, "repeat", &vals![2]), Value::from("HelloHello"));
        assert_eq!(
            call(&Value::from("a,b"), "split", &vals![","]),
            Value::seq(vals!["a", "b"])
        );
        assert!(builtin(&text, "push").is_none());
    }

    #[test]
    fn number_methods() {
        assert_eq!(
            call(&Value::from(1.005), "toFixed", &vals![1]),
            Value::from("1.0")
        );
        assert_eq!(call(&Value::from(4), "toString", &[]), Value::from("4"));
    }

    #[test]
    fn sequence_methods_mutate_in_place() {
        let items = Value::seq(vals![1, 2]);
        assert_eq!(call(&items, "push", &vals![3]), Value::from(3));
        assert_eq!(call(&items, "pop", &[]), Value::from(3));
        assert_eq!(call(&items, "join", &vals!["-"]), Value::from("1-2"));
        call(&items, "reverse", &[]);
        assert_eq!(items, Value::seq(vals![2, 1]));
        assert_eq!(call(&items, "indexOf", &vals![1]), Value::from(1));
    }

    #[test]
    fn utilities() {
        let items = Value::seq(vals![3, 1, 3, 2]);
        assert_eq!(util("size", &[items.clone()]), Value::from(4));
        assert_eq!(util("max", &[items.clone()]), Value::from(3));
        assert_eq!(util("min", &[items.clone()]), Value::from(1));
        assert_eq!(util("sum", &[items.clone()]), Value::from(9));
        assert_eq!(util("uniq", &[items.clone()]), Value::seq(vals![3, 1, 2]));
        assert_eq!(util("first", &[items.clone()]), Value::from(3));
        assert_eq!(util("last", &[items.clone()]), Value::from(2));
        assert_eq!(util("contains", &[items, Value::from(2)]), Value::from(true));
        assert_eq!(util("isEmpty", &[Value::seq(vec![])]), Value::from(true));
        assert_eq!(util("max", &[Value::seq(vec![])]), Value::Undefined);
    }

    #[test]
    fn record_utilities() {
        let point = record! { "x" => 1, "y" => 2 };
        assert_eq!(util("keys", &[point.clone()]), Value::seq(vals!["x", "y"]));
        assert_eq!(util("values", &[point.clone()]), Value::seq(vals![1, 2]));
        assert_eq!(util("has", &[point.clone(), Value::from("y")]), Value::from(true));
        let copy = util("cloneDeep", &[point.clone()]);
        assert_eq!(copy, point);
        assert!(!copy.same(&point));
        assert!(utility("explode").is_none());
    }
}
