//! Block generators
//!
//! A block's transactions are produced by running its generator program
//! through a fixed bootstrap program, the generator ROM. The ROM receives
//! `(generator (ref ...))` and its result's first element lists the spent
//! coins as `(parent_coin_id puzzle_hash amount ...)`.
use std::sync::LazyLock;

use bytes::Bytes;
use tracing::debug;

use crate::{
    codec::SerializedProgram,
    runtime::{run_program, EvalError, EvalErrorKind, Response, RunConfig},
    value::{Atom, Value},
};

static ROM_HEX: &str = include_str!("generator/rom_bootstrap_generator.hex");

/// The generator ROM, decoded on first use
pub static ROM_BOOTSTRAP_GENERATOR: LazyLock<SerializedProgram> = LazyLock::new(|| {
    let rom = SerializedProgram::from_hex(ROM_HEX).expect("embedded generator ROM must decode");
    debug!(len = rom.as_bytes().len(), "loaded generator ROM");
    rom
});

/// Runs `generator` through the ROM with the referenced generators' bytes
pub fn run_generator(
    generator: &SerializedProgram,
    refs: &[Bytes],
    config: &RunConfig,
) -> Response {
    let refs = Value::list(refs.iter().cloned().map(Value::atom));
    let args = Value::list([generator.root().clone(), refs]);
    run_program(ROM_BOOTSTRAP_GENERATOR.root(), &args, config)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpentCoin {
    pub parent_coin_id: [u8; 32],
    pub puzzle_hash: [u8; 32],
    pub amount: u64,
}

fn field<'a>(spend: &'a Value, index: usize) -> Result<&'a Value, EvalError> {
    spend.iter().nth(index).transpose()?.ok_or_else(|| {
        EvalError::new(EvalErrorKind::NotAPair { op: "spend" }).with("spend", spend.clone())
    })
}

fn atom_field(spend: &Value, index: usize) -> Result<&Atom, EvalError> {
    let value = field(spend, index)?;
    value.as_atom().ok_or_else(|| {
        EvalError::new(EvalErrorKind::NotAnAtom { op: "spend" }).with("arg", value.clone())
    })
}

/// Extracts the coins spent by a generator from the ROM's result
pub fn spent_coins(result: &Value) -> Result<Vec<SpentCoin>, EvalError> {
    let spends = result.as_pair().map(|pair| pair.first()).ok_or_else(|| {
        EvalError::new(EvalErrorKind::NotAPair { op: "first" }).with("result", result.clone())
    })?;
    spends
        .iter()
        .map(|spend| {
            let spend = spend?;
            Ok(SpentCoin {
                parent_coin_id: atom_field(spend, 0)?.as_bytes32()?,
                puzzle_hash: atom_field(spend, 1)?.as_bytes32()?,
                amount: atom_field(spend, 2)?.as_u64()?,
            })
        })
        .collect()
}
