//! The operator table: one byte opcodes, their keywords and native implementations
use std::{collections::HashMap, sync::LazyLock};

use crate::runtime::{ops, Response};
use crate::value::Value;

pub type NativeOp = fn(&Value) -> Response;

pub const QUOTE: u8 = 0x01;
pub const APPLY: u8 = 0x02;

#[derive(Debug, Clone, Copy)]
pub struct Operator {
    pub opcode: u8,
    /// Spelling in the textual IR
    pub keyword: &'static str,
    pub name: &'static str,
    /// `None` for operators the evaluator handles itself or does not support
    pub native: Option<NativeOp>,
}

const fn entry(
    opcode: u8,
    keyword: &'static str,
    name: &'static str,
    native: Option<NativeOp>,
) -> Operator {
    Operator {
        opcode,
        keyword,
        name,
        native,
    }
}

static OPERATORS: [Operator; 32] = [
    entry(QUOTE, "q", "quote", None),
    entry(APPLY, "a", "apply", None),
    entry(0x03, "i", "if", Some(ops::op_if)),
    entry(0x04, "c", "cons", Some(ops::op_cons)),
    entry(0x05, "f", "first", Some(ops::op_first)),
    entry(0x06, "r", "rest", Some(ops::op_rest)),
    entry(0x07, "l", "listp", Some(ops::op_listp)),
    entry(0x08, "x", "raise", Some(ops::op_raise)),
    entry(0x09, "=", "eq", Some(ops::op_eq)),
    entry(0x0a, ">s", "gr_bytes", Some(ops::op_gr_bytes)),
    entry(0x0b, "sha256", "sha256", Some(ops::op_sha256)),
    entry(0x0c, "substr", "substr", Some(ops::op_substr)),
    entry(0x0d, "strlen", "strlen", Some(ops::op_strlen)),
    entry(0x0e, "concat", "concat", Some(ops::op_concat)),
    entry(0x10, "+", "add", Some(ops::op_add)),
    entry(0x11, "-", "subtract", Some(ops::op_subtract)),
    entry(0x12, "*", "multiply", Some(ops::op_multiply)),
    entry(0x13, "/", "div", Some(ops::op_div)),
    entry(0x14, "divmod", "divmod", Some(ops::op_divmod)),
    entry(0x15, ">", "gr", Some(ops::op_gr)),
    entry(0x16, "ash", "ash", Some(ops::op_ash)),
    entry(0x17, "lsh", "lsh", Some(ops::op_lsh)),
    entry(0x18, "logand", "logand", Some(ops::op_logand)),
    entry(0x19, "logior", "logior", Some(ops::op_logior)),
    entry(0x1a, "logxor", "logxor", Some(ops::op_logxor)),
    entry(0x1b, "lognot", "lognot", Some(ops::op_lognot)),
    // Curve arithmetic is not implemented, these stay unknown to the evaluator
    entry(0x1d, "point_add", "point_add", None),
    entry(0x1e, "pubkey_for_exp", "pubkey_for_exp", None),
    entry(0x20, "not", "not", Some(ops::op_not)),
    entry(0x21, "any", "any", Some(ops::op_any)),
    entry(0x22, "all", "all", Some(ops::op_all)),
    entry(0x24, "softfork", "softfork", None),
];

static BY_OPCODE: LazyLock<[Option<&'static Operator>; 256]> = LazyLock::new(|| {
    let mut table = [None; 256];
    for operator in &OPERATORS {
        table[usize::from(operator.opcode)] = Some(operator);
    }
    table
});

static BY_KEYWORD: LazyLock<HashMap<&'static str, u8>> = LazyLock::new(|| {
    OPERATORS
        .iter()
        .map(|operator| (operator.keyword, operator.opcode))
        .collect()
});

pub fn operator(opcode: u8) -> Option<&'static Operator> {
    BY_OPCODE[usize::from(opcode)]
}

pub fn opcode_for_keyword(keyword: &str) -> Option<u8> {
    BY_KEYWORD.get(keyword).copied()
}
