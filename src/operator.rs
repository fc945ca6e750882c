//! The built-in binary operators an accessor instruction can name.

use std::fmt::{self, Display};

use crate::value::Value;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    /// `+`: numeric addition, or concatenation when either side is text.
    Add,
    /// `r+`: `+` with the operands swapped.
    ReverseAdd,
    Sub,
    Mul,
    /// `**`
    Pow,
    Div,
    /// `//`: division rounded down.
    FloorDiv,
    /// `%`: remainder with the sign of the dividend.
    Rem,
    /// `||`: the left operand if truthy, else the right one.
    Or,
    /// `&&`: the left operand if falsy, else the right one.
    And,
}

impl BinOp {
    pub const ALL: [BinOp; 10] = [
        BinOp::Add,
        BinOp::ReverseAdd,
        BinOp::Sub,
        BinOp::Mul,
        BinOp::Pow,
        BinOp::Div,
        BinOp::FloorDiv,
        BinOp::Rem,
        BinOp::Or,
        BinOp::And,
    ];

    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<BinOp> {
        BinOp::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::ReverseAdd => "r+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Pow => "**",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Rem => "%",
            BinOp::Or => "||",
            BinOp::And => "&&",
        }
    }

    /// Applies the built-in definition of the operator.
    #[must_use]
    pub fn apply(self, lhs: &Value, rhs: &Value) -> Value {
        match self {
            BinOp::Add => add(lhs, rhs),
            BinOp::ReverseAdd => add(rhs, lhs),
            BinOp::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
            BinOp::Mul => Value::Number(lhs.to_number() * rhs.to_number()),
            BinOp::Pow => Value::Number(lhs.to_number().powf(rhs.to_number())),
            BinOp::Div => Value::Number(lhs.to_number() / rhs.to_number()),
            BinOp::FloorDiv => Value::Number((lhs.to_number() / rhs.to_number()).floor()),
            BinOp::Rem => Value::Number(lhs.to_number() % rhs.to_number()),
            BinOp::Or => {
                if lhs.is_truthy() {
                    lhs.clone()
                } else {
                    rhs.clone()
                }
            }
            BinOp::And => {
                if lhs.is_truthy() {
                    rhs.clone()
                } else {
                    lhs.clone()
                }
            }
        }
    }
}

impl Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

fn is_textual(value: &Value) -> bool {
    matches!(
        value,
        Value::Str(_) | Value::Seq(_) | Value::Record(_) | Value::Date(_) | Value::Entity(_)
    )
}

fn add(lhs: &Value, rhs: &Value) -> Value {
    if is_textual(lhs) || is_textual(rhs) {
        Value::Str(format!("{lhs}{rhs}"))
    } else {
        Value::Number(lhs.to_number() + rhs.to_number())
    }
}
