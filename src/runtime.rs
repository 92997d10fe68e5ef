//! The evaluator
//!
//! Programs run on an explicit machine: a stack of pending operations and a
//! stack of values. Nothing recurses natively, so program depth is bounded
//! by memory and cost rather than by the native stack.
//!
//! Running `program` against `args`:
//! - an atom program is a path into `args` (see [`traverse_path`])
//! - `(q . x)` yields `x` unevaluated
//! - `((X) . operands)` applies the lone atom `X` to the unevaluated operands
//! - `(op arg...)` evaluates every `arg` against `args` and applies `op`
use tracing::{debug, trace};

use crate::value::{Atom, Value};

pub mod cost;
mod error;
pub mod opcodes;
mod ops;

pub use cost::{Cost, CostMeter};
pub use error::{Arity, EvalError, EvalErrorKind};

use cost::{
    APPLY_COST, PATH_LOOKUP_BASE_COST, PATH_LOOKUP_COST_PER_LEG, PATH_LOOKUP_COST_PER_ZERO_BYTE,
    QUOTE_COST,
};

/// A finished computation and what it cost
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub cost: Cost,
    pub value: Value,
}

pub type Response = Result<Reduction, EvalError>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Evaluation fails as soon as the running total passes this
    pub max_cost: Option<Cost>,
}

impl RunConfig {
    pub fn with_max_cost(max_cost: Cost) -> Self {
        Self {
            max_cost: Some(max_cost),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Eval,
    Apply,
    Cons,
    Swap,
}

struct Machine {
    op_stack: Vec<Operation>,
    value_stack: Vec<Value>,
    meter: CostMeter,
}

fn unexpected_shape(name: &'static str, value: Value) -> EvalError {
    EvalError::new(EvalErrorKind::UnexpectedShape).with(name, value)
}

impl Machine {
    fn new(program: &Value, args: &Value, config: &RunConfig) -> Self {
        Self {
            op_stack: vec![Operation::Eval],
            value_stack: vec![Value::pair(program.clone(), args.clone())],
            meter: CostMeter::with_limit(config.max_cost),
        }
    }

    fn pop(&mut self) -> Result<Value, EvalError> {
        self.value_stack
            .pop()
            .ok_or_else(|| EvalError::new(EvalErrorKind::UnexpectedShape))
    }

    fn run(mut self) -> Response {
        debug!(limit = ?self.meter.remaining(), "program started");
        while let Some(operation) = self.op_stack.pop() {
            let cost = match operation {
                Operation::Eval => self.eval()?,
                Operation::Apply => self.apply()?,
                Operation::Cons => self.cons()?,
                Operation::Swap => self.swap()?,
            };
            if let Err(err) = self.meter.charge(cost) {
                debug!(spent = self.meter.spent(), "cost limit exceeded");
                return Err(err);
            }
        }
        let value = self.pop()?;
        debug!(cost = self.meter.spent(), "program finished");
        Ok(Reduction {
            cost: self.meter.spent(),
            value,
        })
    }

    fn swap(&mut self) -> Result<Cost, EvalError> {
        let top = self.pop()?;
        let below = self.pop()?;
        self.value_stack.push(top);
        self.value_stack.push(below);
        Ok(0)
    }

    fn cons(&mut self) -> Result<Cost, EvalError> {
        let first = self.pop()?;
        let rest = self.pop()?;
        self.value_stack.push(Value::pair(first, rest));
        Ok(0)
    }

    fn eval(&mut self) -> Result<Cost, EvalError> {
        let Value::Pair(pair) = self.pop()? else {
            return Err(EvalError::new(EvalErrorKind::UnexpectedShape));
        };
        let (program, args) = (pair.first(), pair.rest());

        let form = match program {
            Value::Atom(path) => {
                let Reduction { cost, value } = traverse_path(path, args)?;
                self.value_stack.push(value);
                return Ok(cost);
            }
            Value::Pair(form) => form,
        };

        let operands = form.rest();
        match form.first() {
            Value::Pair(inner) => {
                // ((X) . operands): X is applied without evaluating anything
                let operator = inner.first();
                if operator.is_pair() || !inner.rest().is_nil() {
                    return Err(EvalError::new(EvalErrorKind::InvalidInjectedOperator)
                        .with("operator", form.first().clone()));
                }
                self.value_stack.push(operator.clone());
                self.value_stack.push(operands.clone());
                self.op_stack.push(Operation::Apply);
                Ok(APPLY_COST)
            }
            Value::Atom(operator) if operator.as_bytes() == [opcodes::QUOTE] => {
                self.value_stack.push(operands.clone());
                Ok(QUOTE_COST)
            }
            operator => {
                self.op_stack.push(Operation::Apply);
                self.value_stack.push(operator.clone());
                for operand in operands.iter() {
                    self.value_stack
                        .push(Value::pair(operand?.clone(), args.clone()));
                    self.op_stack
                        .extend([Operation::Cons, Operation::Eval, Operation::Swap]);
                }
                self.value_stack.push(Value::NIL);
                Ok(1)
            }
        }
    }

    fn apply(&mut self) -> Result<Cost, EvalError> {
        let operands = self.pop()?;
        let operator = self.pop()?;
        let Value::Atom(opcode) = &operator else {
            return Err(unexpected_shape("operator", operator.clone()));
        };

        if opcode.as_bytes() == [opcodes::APPLY] {
            let [program, args] = ops::args_exact("apply", &operands)?;
            self.value_stack
                .push(Value::pair(program.clone(), args.clone()));
            self.op_stack.push(Operation::Eval);
            return Ok(APPLY_COST);
        }

        let native = match opcode.as_bytes() {
            [byte] => opcodes::operator(*byte)
                .and_then(|operator| Some((operator.name, operator.native?))),
            _ => None,
        };
        let Some((name, native)) = native else {
            return Err(EvalError::new(EvalErrorKind::UnknownOperator(
                opcode.as_bytes().to_vec(),
            ))
            .with("args", operands));
        };
        let Reduction { cost, value } = native(&operands)?;
        trace!(op = name, cost, "applied operator");
        self.value_stack.push(value);
        Ok(cost)
    }
}

// Smallest power of two covering the highest set bit
fn msb_mask(byte: u8) -> u32 {
    let mut b = u32::from(byte);
    b |= b >> 1;
    b |= b >> 2;
    b |= b >> 4;
    (b + 1) >> 1
}

/// Walks `env` along the path encoded by `path`.
///
/// Read from the least significant bit, each bit below the highest set one
/// picks `first` (0) or `rest` (1). Leading zero bytes are ignored but still
/// charged. An all-zero or empty path yields nil.
pub fn traverse_path(path: &Atom, env: &Value) -> Response {
    let bytes = path.as_bytes();
    let mut cost = PATH_LOOKUP_BASE_COST + PATH_LOOKUP_COST_PER_LEG;

    let mut end_byte_cursor = 0;
    while end_byte_cursor < bytes.len() && bytes[end_byte_cursor] == 0 {
        end_byte_cursor += 1;
        cost += PATH_LOOKUP_COST_PER_ZERO_BYTE;
    }
    if end_byte_cursor == bytes.len() {
        return Ok(Reduction {
            cost,
            value: Value::NIL,
        });
    }

    let end_bitmask = msb_mask(bytes[end_byte_cursor]);
    let mut env = env;
    let mut byte_cursor = bytes.len() - 1;
    let mut bitmask = 0x01;
    while byte_cursor > end_byte_cursor || bitmask < end_bitmask {
        let Value::Pair(pair) = env else {
            return Err(EvalError::new(EvalErrorKind::PathIntoAtom)
                .with("path", Value::Atom(path.clone()))
                .with("env", env.clone()));
        };
        env = if u32::from(bytes[byte_cursor]) & bitmask != 0 {
            pair.rest()
        } else {
            pair.first()
        };
        cost += PATH_LOOKUP_COST_PER_LEG;
        bitmask <<= 1;
        if bitmask == 0x100 {
            byte_cursor -= 1;
            bitmask = 0x01;
        }
    }
    Ok(Reduction {
        cost,
        value: env.clone(),
    })
}

/// Runs `program` against `args`, returning the result and the total cost
pub fn run_program(program: &Value, args: &Value, config: &RunConfig) -> Response {
    Machine::new(program, args, config).run()
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;
    use crate::ir::{parse, parse_one_or_two};

    fn run(source: &str) -> Response {
        let (program, args) = parse_one_or_two(source).unwrap();
        run_program(&program, &args, &RunConfig::default())
    }

    fn result(source: &str) -> (Cost, String) {
        let Reduction { cost, value } = run(source).unwrap();
        (cost, value.to_string())
    }

    #[test]
    fn masks() {
        check!(msb_mask(0x01) == 0x01);
        check!(msb_mask(0x02) == 0x02);
        check!(msb_mask(0x03) == 0x02);
        check!(msb_mask(0x7f) == 0x40);
        check!(msb_mask(0x80) == 0x80);
        check!(msb_mask(0xff) == 0x80);
    }

    #[test]
    fn paths() {
        let env = parse("((1 . 2) . (3 . 4))").unwrap();
        let walk = |path: &[u8]| traverse_path(&Atom::from_slice(path), &env).unwrap();
        check!(walk(&[0x01]) == Reduction { cost: 44, value: env.clone() });
        check!(walk(&[0x02]).value == parse("(1 . 2)").unwrap());
        check!(walk(&[0x03]).value == parse("(3 . 4)").unwrap());
        check!(walk(&[0x04]) == Reduction { cost: 52, value: Value::int(1) });
        check!(walk(&[0x05]).value == Value::int(3));
        check!(walk(&[0x06]).value == Value::int(2));
        check!(walk(&[0x07]).value == Value::int(4));
        check!(walk(&[0x00, 0x07]) == Reduction { cost: 56, value: Value::int(4) });
        check!(walk(&[]) == Reduction { cost: 44, value: Value::NIL });
        check!(walk(&[0x00, 0x00]) == Reduction { cost: 52, value: Value::NIL });
    }

    #[test]
    fn long_paths_cross_bytes() {
        // 0x0100 walks eight legs of `first`
        let mut env = Value::int(9);
        for _ in 0..8 {
            env = Value::pair(env, Value::NIL);
        }
        let found = traverse_path(&Atom::from([0x01, 0x00]), &env).unwrap();
        check!(found.value == Value::int(9));
        check!(found.cost == 44 + 8 * 4);
    }

    #[test]
    fn path_into_atom() {
        let_assert!(Err(err) = traverse_path(&Atom::from([0x04]), &Value::int(5)));
        check!(err.kind == EvalErrorKind::PathIntoAtom);
    }

    #[test]
    fn quote_and_paths() {
        check!(result("(q . 5)") == (20, "5".to_string()));
        check!(result("(q . (1 2))") == (20, "(q 2)".to_string()));
        check!(result("1 (70 80)") == (44, "(70 80)".to_string()));
        check!(result("5 (70 80)") == (52, "80".to_string()));
    }

    #[test]
    fn operator_application() {
        // 1 + two quotes + cons
        check!(result("(c (q . 100) (q . 200))") == (91, "(100 . 200)".to_string()));
        check!(result("(f 1) (7 8)").1 == "7");
        check!(result("(f 1) (7 8)").0 == 1 + 44 + 30);
        check!(result("(i 2 (q . 10) (q . 20)) (() . 1)").1 == "20");
        check!(result("(+ 2 5) (1 2)").1 == "3");
    }

    #[test]
    fn apply_runs_a_new_program() {
        // (a (q . (f 1)) (q . (9 8))): evaluates (f 1) against (9 8)
        let (cost, value) = result("(a (q . (f 1)) (q . (9 8)))");
        check!(value == "9");
        check!(cost == 1 + 20 + 20 + 90 + 1 + 44 + 30);
    }

    #[test]
    fn lone_operator_form() {
        // The operands are handed to cons without being evaluated
        let (cost, value) = result("((c) 100 200)");
        check!(value == "(100 . 200)");
        check!(cost == 90 + 50);

        let_assert!(Err(err) = run("((c . 1) 1 2)"));
        check!(err.kind == EvalErrorKind::InvalidInjectedOperator);
        let_assert!(Err(err) = run("(((c)) 1 2)"));
        check!(err.kind == EvalErrorKind::InvalidInjectedOperator);
    }

    #[test]
    fn apply_arity() {
        let_assert!(Err(err) = run("(a (q . 1))"));
        check!(
            err.kind
                == EvalErrorKind::WrongArgumentCount {
                    op: "apply",
                    expected: Arity::Exact(2),
                    got: 1
                }
        );
        let_assert!(Err(_) = run("(a (q . 1) (q . 2) (q . 3))"));
    }

    #[test]
    fn unknown_operators() {
        let_assert!(Err(err) = run("(0x1d (q . 1))"));
        check!(err.kind == EvalErrorKind::UnknownOperator(vec![0x1d]));
        let_assert!(Err(err) = run("(0x0100 (q . 1))"));
        check!(err.to_string().starts_with("unknown op 0x0100"));
        let_assert!(Err(err) = run("(() (q . 1))"));
        check!(err.kind == EvalErrorKind::UnknownOperator(vec![]));
    }

    #[test]
    fn cost_limit() {
        let (program, args) = parse_one_or_two("(c (q . 1) (q . 2))").unwrap();
        let exact = run_program(&program, &args, &RunConfig::with_max_cost(91));
        check!(exact.is_ok());
        let_assert!(Err(err) = run_program(&program, &args, &RunConfig::with_max_cost(90)));
        let_assert!(EvalErrorKind::CostExceeded { limit: 90, .. } = err.kind);
    }

    #[test]
    fn evaluation_is_deterministic() {
        for source in [
            "(a (q . (+ 2 5)) (q . (40 2)))",
            "(sha256 (q . \"abc\") (concat (q . 1) (q . 2)))",
            "(i (= 2 5) (q . 70) (divmod 2 (q . 3))) (-7 -7)",
        ] {
            let (program, args) = parse_one_or_two(source).unwrap();
            let first = run_program(&program, &args, &RunConfig::default()).unwrap();
            let second = run_program(&program, &args, &RunConfig::default()).unwrap();
            check!(first == second, "{source}");
        }
    }

    #[test]
    fn raise_surfaces_arguments() {
        let_assert!(Err(err) = run("(x (q . 7))"));
        check!(err.kind == EvalErrorKind::Raise);
        check!(err.value("args") == Some(&Value::list([Value::int(7)])));
    }

    #[test]
    fn deep_programs_do_not_overflow() {
        // (f (f (f ... (q . deep) ...)))
        let mut data = Value::int(1);
        for _ in 0..50_000 {
            data = Value::pair(data, Value::NIL);
        }
        let mut program = Value::pair(Value::atom([opcodes::QUOTE]), data);
        for _ in 0..50_000 {
            program = Value::list([Value::atom([0x05]), program]);
        }
        let Reduction { value, .. } =
            run_program(&program, &Value::NIL, &RunConfig::default()).unwrap();
        check!(value == Value::int(1));
    }
}
