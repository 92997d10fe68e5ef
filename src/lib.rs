pub mod codec;
pub mod generator;
pub mod ir;
pub mod lexer;
mod num;
pub mod runtime;
pub mod value;

pub use codec::{decode, decode_exact, encode, DecodeError, EncodeError, SerializedProgram};
pub use ir::{parse, IrError, PrintConfig};
pub use runtime::{run_program, Cost, EvalError, EvalErrorKind, Reduction, RunConfig};
pub use value::{Atom, Pair, Value};
