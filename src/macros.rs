/// Builds a `Vec<Value>` from a list of expressions, converting each with `Value::from`.
///
/// ```rust
/// use synths::{vals, Value};
/// let args = vals!["+=", 3];
/// assert_eq!(args, vec![Value::from("+="), Value::from(3)]);
/// ```
#[macro_export]
macro_rules! vals {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}

/// Builds a `Value::Record` from `key => value` pairs, keeping their order.
///
/// ```rust
/// use synths::record;
/// let point = record! { "x" => 1, "y" => 2 };
/// assert_eq!(point.to_string(), "[object Object]");
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Value::record($crate::value::RecordMap::new())
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::value::RecordMap::new();
        $(
            map.insert(::std::string::String::from($key), $crate::Value::from($value));
        )+
        $crate::Value::record(map)
    }};
}
