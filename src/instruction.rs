/*!

An accessor called with arguments treats its first argument as an *instruction key*. Text keys
carry a small grammar:

| key              | meaning                                                    |
|------------------|------------------------------------------------------------|
| `#name`          | call method `name` (camel-cased) and read the result       |
| `#name=`         | call method `name` and write the result                    |
| `##text`         | write the literal text `#text`                             |
| `+`, `**`, ...   | fold a binary operator over the remaining arguments, read  |
| `+=`, `**=`, ... | the same, then write the result                            |
| anything else    | a property, key or index of the current value              |

[`Instruction::parse`] turns a key into one of these shapes once, so the evaluator only
matches on the result. Whether an operator really applies (it needs at least one operand), and
whether a plain key is a property or a keyed access, depends on the call and is decided by the
[evaluator](crate::evaluate).

*/

use crate::operator::BinOp;

const METHOD_MARKER: char = '#';
const ASSIGNMENT_SUFFIX: char = '=';

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// `#name` or `#name=`. The name is camel-cased and stripped of the suffix.
    Method { name: String, assign: bool },
    /// `##text`: the literal `#text`.
    Literal(String),
    /// An operator symbol, optionally followed by `=`.
    Operator { op: BinOp, assign: bool },
    /// Anything else.
    Key(String),
}

impl Instruction {
    #[must_use]
    pub fn parse(key: &str) -> Instruction {
        if let Some(rest) = key.strip_prefix(METHOD_MARKER) {
            if rest.starts_with(METHOD_MARKER) {
                return Instruction::Literal(rest.to_string());
            }
            let name = camel(rest);
            let (name, assign) = strip_assignment(&name);
            return Instruction::Method {
                name: name.to_string(),
                assign,
            };
        }
        let (symbol, assign) = strip_assignment(key);
        if let Some(op) = BinOp::from_symbol(symbol) {
            return Instruction::Operator { op, assign };
        }
        Instruction::Key(key.to_string())
    }
}

fn strip_assignment(key: &str) -> (&str, bool) {
    match key.strip_suffix(ASSIGNMENT_SUFFIX) {
        Some(stripped) => (stripped, true),
        None => (key, false),
    }
}

/// Camel-cases a name: every `_`, `-` or space followed by a word character is replaced by
/// that character upper-cased (`plain-object` → `plainObject`).
#[must_use]
pub fn camel(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if matches!(c, ' ' | '_' | '-') {
            if let Some(&next) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    chars.next();
                    result.extend(next.to_uppercase());
                    continue;
                }
            }
        }
        result.push(c);
    }
    result
}
