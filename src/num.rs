//! Atoms read as big-endian two's complement integers
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;

use crate::{
    runtime::{EvalError, EvalErrorKind},
    value::{Atom, Value},
};

impl Atom {
    /// Shortest two's complement encoding; zero is the empty atom
    pub fn from_int(value: &BigInt) -> Self {
        if value.sign() == Sign::NoSign {
            Self::NIL
        } else {
            Self::new(value.to_signed_bytes_be())
        }
    }

    pub fn from_i64(value: i64) -> Self {
        Self::from_int(&BigInt::from(value))
    }

    pub fn as_int(&self) -> BigInt {
        BigInt::from_signed_bytes_be(self.as_bytes())
    }

    fn too_long(&self, bits: u32, max_bytes: usize) -> EvalError {
        EvalError::new(EvalErrorKind::IntegerTooLong {
            bits,
            max_bytes,
            len: self.len(),
        })
        .with("atom", Value::Atom(self.clone()))
    }

    pub fn as_i32(&self) -> Result<i32, EvalError> {
        let bytes = self.as_bytes();
        if bytes.len() > 4 {
            return Err(self.too_long(32, 4));
        }
        let mut value: i32 = if bytes.first().is_some_and(|b| b & 0x80 != 0) {
            -1
        } else {
            0
        };
        for byte in bytes {
            value = (value << 8) | i32::from(*byte);
        }
        Ok(value)
    }

    pub fn as_i64(&self) -> Result<i64, EvalError> {
        let bytes = self.as_bytes();
        if bytes.len() > 8 {
            return Err(self.too_long(64, 8));
        }
        let mut value: i64 = if bytes.first().is_some_and(|b| b & 0x80 != 0) {
            -1
        } else {
            0
        };
        for byte in bytes {
            value = (value << 8) | i64::from(*byte);
        }
        Ok(value)
    }

    /// Reads the atom as a signed integer that must land in `u64`
    pub fn as_u64(&self) -> Result<u64, EvalError> {
        self.as_int().to_u64().ok_or_else(|| {
            EvalError::new(EvalErrorKind::OutOfRange { target: "u64" })
                .with("atom", Value::Atom(self.clone()))
        })
    }

    pub fn as_bytes32(&self) -> Result<[u8; 32], EvalError> {
        <[u8; 32]>::try_from(self.as_bytes()).map_err(|_| {
            EvalError::new(EvalErrorKind::WrongAtomLength {
                expected: 32,
                got: self.len(),
            })
            .with("atom", Value::Atom(self.clone()))
        })
    }
}

impl Value {
    pub fn int(value: i64) -> Self {
        Self::Atom(Atom::from_i64(value))
    }
}

/// Bytes needed to hold the magnitude of `value`, zero for zero
pub(crate) fn limbs_for_int(value: &BigInt) -> usize {
    usize::try_from((value.bits() + 7) >> 3).unwrap_or(usize::MAX)
}
