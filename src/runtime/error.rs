use core::fmt;

use crate::{ir::PrintConfig, runtime::Cost, value::Value};

/// How many operands an operator accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
}

impl Arity {
    pub fn is_satisfied(&self, len: usize) -> bool {
        match self {
            Self::Exact(n) => len == *n,
            Self::Range(min, max) => (*min..=*max).contains(&len),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(1) => write!(f, "exactly 1 argument"),
            Self::Exact(n) => write!(f, "exactly {n} arguments"),
            Self::Range(min, max) if *max == min + 1 => write!(f, "{min} or {max} arguments"),
            Self::Range(min, max) => write!(f, "{min} to {max} arguments"),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Clone)]
pub enum EvalErrorKind {
    #[error("path into atom")]
    PathIntoAtom,
    #[error("in ((X)...) syntax X must be lone atom")]
    InvalidInjectedOperator,
    #[error("unknown op 0x{}", hex::encode(.0))]
    UnknownOperator(Vec<u8>),
    #[error("{op} takes {expected}, got {got}")]
    WrongArgumentCount {
        op: &'static str,
        expected: Arity,
        got: usize,
    },
    #[error("{op} on list")]
    NotAnAtom { op: &'static str },
    #[error("{op} of non-cons")]
    NotAPair { op: &'static str },
    #[error("list is malformed at index {index}")]
    MalformedList { index: usize },
    #[error("int{bits} requires {max_bytes} bytes at most, got {len}")]
    IntegerTooLong {
        bits: u32,
        max_bytes: usize,
        len: usize,
    },
    #[error("atom does not fit into {target}")]
    OutOfRange { target: &'static str },
    #[error("expected an atom of {expected} bytes, got {got}")]
    WrongAtomLength { expected: usize, got: usize },
    #[error("{op} with 0")]
    DivisionByZero { op: &'static str },
    #[error("invalid indices for substr")]
    InvalidIndices,
    #[error("{op} shift amount must fit in 4 bytes")]
    ShiftArgumentTooLong { op: &'static str },
    #[error("{op} shift of {amount} is too large")]
    ShiftTooLarge { op: &'static str, amount: i32 },
    #[error("clvm raise")]
    Raise,
    #[error("cost exceeded: spent {spent} of {limit}")]
    CostExceeded { limit: Cost, spent: Cost },
    #[error("unexpected value stack shape")]
    UnexpectedShape,
}

/// An evaluation failure together with the values that explain it
#[derive(thiserror::Error, Debug, PartialEq, Clone)]
#[error("{kind}{}", render_values(.values))]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub values: Vec<(&'static str, Value)>,
}

fn render_values(values: &[(&'static str, Value)]) -> String {
    let config = PrintConfig::errors();
    values
        .iter()
        .map(|(name, value)| format!(", {name}: {}", value.display(&config)))
        .collect()
}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> Self {
        Self {
            kind,
            values: Vec::new(),
        }
    }

    pub fn with(mut self, name: &'static str, value: Value) -> Self {
        self.values.push((name, value));
        self
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, value)| value)
    }
}

impl From<EvalErrorKind> for EvalError {
    fn from(kind: EvalErrorKind) -> Self {
        Self::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::{Arity, EvalError, EvalErrorKind};
    use crate::value::Value;

    #[test]
    fn arity_text() {
        check!(Arity::Exact(1).to_string() == "exactly 1 argument");
        check!(Arity::Exact(3).to_string() == "exactly 3 arguments");
        check!(Arity::Range(2, 3).to_string() == "2 or 3 arguments");
        check!(Arity::Range(1, 4).to_string() == "1 to 4 arguments");
        check!(Arity::Range(2, 3).is_satisfied(3));
        check!(!Arity::Range(2, 3).is_satisfied(1));
    }

    #[test]
    fn message_carries_values() {
        let err = EvalError::new(EvalErrorKind::WrongArgumentCount {
            op: "f",
            expected: Arity::Exact(1),
            got: 2,
        })
        .with("args", Value::list([Value::int(70), Value::int(80)]));
        check!(err.to_string() == "f takes exactly 1 argument, got 2, args: (70 80)");
        check!(
            EvalError::new(EvalErrorKind::UnknownOperator(vec![0x1f])).to_string()
                == "unknown op 0x1f"
        );
    }
}
