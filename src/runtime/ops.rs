//! Native operators
//!
//! Each takes its already evaluated argument list and returns the result
//! along with the cost of producing it.
use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Zero};
use sha2::{Digest, Sha256};

use crate::{
    num::limbs_for_int,
    runtime::{cost::*, Arity, EvalError, EvalErrorKind, Reduction, Response},
    value::{Atom, Pair, Value},
};

fn wrong_count(op: &'static str, expected: Arity, got: usize, args: &Value) -> EvalError {
    EvalError::new(EvalErrorKind::WrongArgumentCount { op, expected, got })
        .with("args", args.clone())
}

fn collect_args<'a>(args: &'a Value) -> Result<Vec<&'a Value>, EvalError> {
    args.iter().collect()
}

pub(super) fn args_exact<'a, const N: usize>(
    op: &'static str,
    args: &'a Value,
) -> Result<[&'a Value; N], EvalError> {
    let items = collect_args(args)?;
    let got = items.len();
    <[&Value; N]>::try_from(items).map_err(|_| wrong_count(op, Arity::Exact(N), got, args))
}

fn atom_arg<'a>(op: &'static str, value: &'a Value) -> Result<&'a Atom, EvalError> {
    named_atom_arg(op, "arg", value)
}

fn named_atom_arg<'a>(
    op: &'static str,
    name: &'static str,
    value: &'a Value,
) -> Result<&'a Atom, EvalError> {
    value
        .as_atom()
        .ok_or_else(|| EvalError::new(EvalErrorKind::NotAnAtom { op }).with(name, value.clone()))
}

fn atom_pair<'a>(op: &'static str, args: &'a Value) -> Result<(&'a Atom, &'a Atom), EvalError> {
    let [left, right] = args_exact(op, args)?;
    Ok((named_atom_arg(op, "arg0", left)?, named_atom_arg(op, "arg1", right)?))
}

fn atom_args<'a>(op: &'static str, args: &'a Value) -> Result<Vec<&'a Atom>, EvalError> {
    args.iter().map(|arg| atom_arg(op, arg?)).collect()
}

fn int_arg(op: &'static str, value: &Value) -> Result<(BigInt, usize), EvalError> {
    let atom = atom_arg(op, value)?;
    Ok((atom.as_int(), atom.len()))
}

fn pair_arg<'a>(op: &'static str, value: &'a Value) -> Result<&'a Pair, EvalError> {
    value.as_pair().ok_or_else(|| {
        EvalError::new(EvalErrorKind::NotAPair { op }).with("arg", value.clone())
    })
}

pub(crate) fn op_if(args: &Value) -> Response {
    let [condition, then, otherwise] = args_exact("i", args)?;
    let value = if condition.is_nil() { otherwise } else { then };
    Ok(Reduction {
        cost: IF_COST,
        value: value.clone(),
    })
}

pub(crate) fn op_cons(args: &Value) -> Response {
    let [first, rest] = args_exact("c", args)?;
    Ok(Reduction {
        cost: CONS_COST,
        value: Value::pair(first.clone(), rest.clone()),
    })
}

pub(crate) fn op_first(args: &Value) -> Response {
    let [list] = args_exact("f", args)?;
    Ok(Reduction {
        cost: FIRST_COST,
        value: pair_arg("first", list)?.first().clone(),
    })
}

pub(crate) fn op_rest(args: &Value) -> Response {
    let [list] = args_exact("r", args)?;
    Ok(Reduction {
        cost: REST_COST,
        value: pair_arg("rest", list)?.rest().clone(),
    })
}

pub(crate) fn op_listp(args: &Value) -> Response {
    let [value] = args_exact("l", args)?;
    Ok(Reduction {
        cost: LISTP_COST,
        value: Value::bool(value.is_pair()),
    })
}

pub(crate) fn op_raise(args: &Value) -> Response {
    Err(EvalError::new(EvalErrorKind::Raise).with("args", args.clone()))
}

pub(crate) fn op_eq(args: &Value) -> Response {
    let (left, right) = atom_pair("=", args)?;
    let cost = EQ_BASE_COST + count_cost(EQ_COST_PER_BYTE, left.len() + right.len());
    Ok(Reduction {
        cost,
        value: Value::bool(left == right),
    })
}

pub(crate) fn op_gr_bytes(args: &Value) -> Response {
    let (left, right) = atom_pair(">s", args)?;
    let cost = GRS_BASE_COST + count_cost(GRS_COST_PER_BYTE, left.len() + right.len());
    Ok(Reduction {
        cost,
        value: Value::bool(left.as_bytes() > right.as_bytes()),
    })
}

pub(crate) fn op_sha256(args: &Value) -> Response {
    let mut cost = SHA256_BASE_COST;
    let mut arg_size = 0;
    let mut hasher = Sha256::new();
    for atom in atom_args("sha256", args)? {
        hasher.update(atom.as_bytes());
        arg_size += atom.len();
        cost += SHA256_COST_PER_ARG;
    }
    cost += count_cost(SHA256_COST_PER_BYTE, arg_size);
    Ok(malloc_cost(cost, Atom::from_slice(&hasher.finalize())))
}

pub(crate) fn op_substr(args: &Value) -> Response {
    const ARITY: Arity = Arity::Range(2, 3);
    let items = collect_args(args)?;
    if !ARITY.is_satisfied(items.len()) {
        return Err(wrong_count("substr", ARITY, items.len(), args));
    }
    let atom = atom_arg("substr", items[0])?;
    let size = i64::try_from(atom.len()).unwrap_or(i64::MAX);
    let start = i64::from(atom_arg("substr", items[1])?.as_i32()?);
    let end = match items.get(2) {
        Some(end) => i64::from(atom_arg("substr", end)?.as_i32()?),
        None => size,
    };
    if end > size || end < start || end < 0 || start < 0 {
        return Err(EvalError::new(EvalErrorKind::InvalidIndices).with("args", args.clone()));
    }
    // Both bounds are checked against the atom length above
    let range = start as usize..end as usize;
    Ok(Reduction {
        cost: 1,
        value: Value::Atom(atom.slice(range)),
    })
}

pub(crate) fn op_strlen(args: &Value) -> Response {
    let [value] = args_exact("strlen", args)?;
    let size = atom_arg("strlen", value)?.len();
    let cost = STRLEN_BASE_COST + count_cost(STRLEN_COST_PER_BYTE, size);
    Ok(malloc_cost(cost, Atom::from_int(&BigInt::from(size))))
}

pub(crate) fn op_concat(args: &Value) -> Response {
    let atoms = atom_args("concat", args)?;
    let total = atoms.iter().map(|atom| atom.len()).sum::<usize>();
    let mut bytes = Vec::with_capacity(total);
    for atom in &atoms {
        bytes.extend_from_slice(atom.as_bytes());
    }
    let cost = CONCAT_BASE_COST
        + count_cost(CONCAT_COST_PER_ARG, atoms.len())
        + count_cost(CONCAT_COST_PER_BYTE, total);
    Ok(malloc_cost(cost, Atom::from(bytes)))
}

pub(crate) fn op_add(args: &Value) -> Response {
    let mut total = BigInt::zero();
    let mut cost = ARITH_BASE_COST;
    let mut arg_size = 0;
    for atom in atom_args("+", args)? {
        total += atom.as_int();
        arg_size += atom.len();
        cost += ARITH_COST_PER_ARG;
    }
    cost += count_cost(ARITH_COST_PER_BYTE, arg_size);
    Ok(malloc_cost(cost, Atom::from_int(&total)))
}

pub(crate) fn op_subtract(args: &Value) -> Response {
    let mut total = BigInt::zero();
    let mut cost = ARITH_BASE_COST;
    let mut arg_size = 0;
    for (index, atom) in atom_args("-", args)?.into_iter().enumerate() {
        if index == 0 {
            total += atom.as_int();
        } else {
            total -= atom.as_int();
        }
        arg_size += atom.len();
        cost += ARITH_COST_PER_ARG;
    }
    cost += count_cost(ARITH_COST_PER_BYTE, arg_size);
    Ok(malloc_cost(cost, Atom::from_int(&total)))
}

pub(crate) fn op_multiply(args: &Value) -> Response {
    let atoms = atom_args("*", args)?;
    let mut cost = MUL_BASE_COST;
    let Some((first, rest)) = atoms.split_first() else {
        return Ok(malloc_cost(cost, Atom::from_i64(1)));
    };
    let mut product = first.as_int();
    let mut product_size = count_cost(1, first.len());
    for atom in rest {
        let size = count_cost(1, atom.len());
        cost += MUL_COST_PER_OP;
        cost += (size + product_size) * MUL_LINEAR_COST_PER_BYTE;
        cost += (size * product_size) / MUL_SQUARE_COST_PER_BYTE_DIVIDER;
        product *= atom.as_int();
        product_size = count_cost(1, limbs_for_int(&product));
    }
    Ok(malloc_cost(cost, Atom::from_int(&product)))
}

fn divisor_pair(op: &'static str, args: &Value) -> Result<(BigInt, BigInt, usize), EvalError> {
    let [numerator, divisor] = args_exact(op, args)?;
    let (numerator, l0) = int_arg(op, numerator)?;
    let (divisor, l1) = int_arg(op, divisor)?;
    if divisor.is_zero() {
        return Err(EvalError::new(EvalErrorKind::DivisionByZero { op }).with("args", args.clone()));
    }
    Ok((numerator, divisor, l0 + l1))
}

pub(crate) fn op_div(args: &Value) -> Response {
    let (numerator, divisor, arg_size) = divisor_pair("div", args)?;
    let cost = DIV_BASE_COST + count_cost(DIV_COST_PER_BYTE, arg_size);
    let (mut quotient, remainder) = numerator.div_mod_floor(&divisor);
    // Negative quotients of inexact divisions round toward zero when they land on -1
    if quotient == -BigInt::one() && !remainder.is_zero() {
        quotient += 1;
    }
    Ok(malloc_cost(cost, Atom::from_int(&quotient)))
}

pub(crate) fn op_divmod(args: &Value) -> Response {
    let (numerator, divisor, arg_size) = divisor_pair("divmod", args)?;
    let (quotient, remainder) = numerator.div_mod_floor(&divisor);
    let quotient = Atom::from_int(&quotient);
    let remainder = Atom::from_int(&remainder);
    let cost = DIVMOD_BASE_COST
        + count_cost(DIVMOD_COST_PER_BYTE, arg_size)
        + count_cost(MALLOC_COST_PER_BYTE, quotient.len() + remainder.len());
    Ok(Reduction {
        cost,
        value: Value::pair(Value::Atom(quotient), Value::Atom(remainder)),
    })
}

pub(crate) fn op_gr(args: &Value) -> Response {
    let [left, right] = args_exact(">", args)?;
    let (left, l0) = int_arg(">", left)?;
    let (right, l1) = int_arg(">", right)?;
    Ok(Reduction {
        cost: GR_BASE_COST + count_cost(GR_COST_PER_BYTE, l0 + l1),
        value: Value::bool(left > right),
    })
}

const MAX_SHIFT: u32 = 65535;

fn shift_amount(op: &'static str, value: &Value) -> Result<i32, EvalError> {
    let atom = atom_arg(op, value)?;
    if atom.len() > 4 {
        return Err(
            EvalError::new(EvalErrorKind::ShiftArgumentTooLong { op }).with("arg", value.clone())
        );
    }
    let amount = atom.as_i32()?;
    if amount.unsigned_abs() > MAX_SHIFT {
        return Err(EvalError::new(EvalErrorKind::ShiftTooLarge { op, amount })
            .with("arg", value.clone()));
    }
    Ok(amount)
}

fn shift(value: BigInt, amount: i32) -> BigInt {
    if amount >= 0 {
        value << amount.unsigned_abs()
    } else {
        value >> amount.unsigned_abs()
    }
}

pub(crate) fn op_ash(args: &Value) -> Response {
    let [value, amount] = args_exact("ash", args)?;
    let (value, l0) = int_arg("ash", value)?;
    let amount = shift_amount("ash", amount)?;
    let result = shift(value, amount);
    let cost = ASHIFT_BASE_COST + count_cost(ASHIFT_COST_PER_BYTE, l0 + limbs_for_int(&result));
    Ok(malloc_cost(cost, Atom::from_int(&result)))
}

pub(crate) fn op_lsh(args: &Value) -> Response {
    let [value, amount] = args_exact("lsh", args)?;
    let atom = atom_arg("lsh", value)?;
    // The shifted operand is read as unsigned
    let value = BigInt::from(BigUint::from_bytes_be(atom.as_bytes()));
    let amount = shift_amount("lsh", amount)?;
    let result = shift(value, amount);
    let cost =
        LSHIFT_BASE_COST + count_cost(LSHIFT_COST_PER_BYTE, atom.len() + limbs_for_int(&result));
    Ok(malloc_cost(cost, Atom::from_int(&result)))
}

fn binop_reduction(
    op: &'static str,
    initial: BigInt,
    args: &Value,
    combine: impl Fn(BigInt, &BigInt) -> BigInt,
) -> Response {
    let mut total = initial;
    let mut cost = LOG_BASE_COST;
    let mut arg_size = 0;
    for atom in atom_args(op, args)? {
        total = combine(total, &atom.as_int());
        arg_size += atom.len();
        cost += LOG_COST_PER_ARG;
    }
    cost += count_cost(LOG_COST_PER_BYTE, arg_size);
    Ok(malloc_cost(cost, Atom::from_int(&total)))
}

pub(crate) fn op_logand(args: &Value) -> Response {
    binop_reduction("logand", -BigInt::one(), args, |total, value| total & value)
}

pub(crate) fn op_logior(args: &Value) -> Response {
    binop_reduction("logior", BigInt::zero(), args, |total, value| total | value)
}

pub(crate) fn op_logxor(args: &Value) -> Response {
    binop_reduction("logxor", BigInt::zero(), args, |total, value| total ^ value)
}

pub(crate) fn op_lognot(args: &Value) -> Response {
    let [value] = args_exact("lognot", args)?;
    let (value, l0) = int_arg("lognot", value)?;
    let cost = LOGNOT_BASE_COST + count_cost(LOGNOT_COST_PER_BYTE, l0);
    Ok(malloc_cost(cost, Atom::from_int(&-(value + BigInt::one()))))
}

pub(crate) fn op_not(args: &Value) -> Response {
    let [value] = args_exact("not", args)?;
    Ok(Reduction {
        cost: BOOL_BASE_COST,
        value: Value::bool(value.is_nil()),
    })
}

pub(crate) fn op_any(args: &Value) -> Response {
    let items = collect_args(args)?;
    Ok(Reduction {
        cost: BOOL_BASE_COST + count_cost(BOOL_COST_PER_ARG, items.len()),
        value: Value::bool(items.iter().any(|item| !item.is_nil())),
    })
}

pub(crate) fn op_all(args: &Value) -> Response {
    let items = collect_args(args)?;
    Ok(Reduction {
        cost: BOOL_BASE_COST + count_cost(BOOL_COST_PER_ARG, items.len()),
        value: Value::bool(items.iter().all(|item| !item.is_nil())),
    })
}
