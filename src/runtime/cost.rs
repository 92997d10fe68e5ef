//! Consensus costs and the meter that enforces them
use crate::{
    runtime::{EvalError, EvalErrorKind, Reduction},
    value::{Atom, Value},
};

pub type Cost = u64;

pub const IF_COST: Cost = 33;
pub const CONS_COST: Cost = 50;
pub const FIRST_COST: Cost = 30;
pub const REST_COST: Cost = 30;
pub const LISTP_COST: Cost = 19;

pub const MALLOC_COST_PER_BYTE: Cost = 10;

pub const ARITH_BASE_COST: Cost = 99;
pub const ARITH_COST_PER_BYTE: Cost = 3;
pub const ARITH_COST_PER_ARG: Cost = 320;

pub const LOG_BASE_COST: Cost = 100;
pub const LOG_COST_PER_BYTE: Cost = 3;
pub const LOG_COST_PER_ARG: Cost = 264;

pub const GRS_BASE_COST: Cost = 117;
pub const GRS_COST_PER_BYTE: Cost = 1;

pub const EQ_BASE_COST: Cost = 117;
pub const EQ_COST_PER_BYTE: Cost = 1;

pub const GR_BASE_COST: Cost = 498;
pub const GR_COST_PER_BYTE: Cost = 2;

pub const DIVMOD_BASE_COST: Cost = 1116;
pub const DIVMOD_COST_PER_BYTE: Cost = 6;

pub const DIV_BASE_COST: Cost = 988;
pub const DIV_COST_PER_BYTE: Cost = 4;

pub const SHA256_BASE_COST: Cost = 87;
pub const SHA256_COST_PER_ARG: Cost = 134;
pub const SHA256_COST_PER_BYTE: Cost = 2;

pub const MUL_BASE_COST: Cost = 92;
pub const MUL_COST_PER_OP: Cost = 885;
pub const MUL_LINEAR_COST_PER_BYTE: Cost = 6;
pub const MUL_SQUARE_COST_PER_BYTE_DIVIDER: Cost = 128;

pub const STRLEN_BASE_COST: Cost = 173;
pub const STRLEN_COST_PER_BYTE: Cost = 1;

pub const PATH_LOOKUP_BASE_COST: Cost = 40;
pub const PATH_LOOKUP_COST_PER_LEG: Cost = 4;
pub const PATH_LOOKUP_COST_PER_ZERO_BYTE: Cost = 4;

pub const CONCAT_BASE_COST: Cost = 142;
pub const CONCAT_COST_PER_ARG: Cost = 135;
pub const CONCAT_COST_PER_BYTE: Cost = 3;

pub const BOOL_BASE_COST: Cost = 200;
pub const BOOL_COST_PER_ARG: Cost = 300;

pub const ASHIFT_BASE_COST: Cost = 596;
pub const ASHIFT_COST_PER_BYTE: Cost = 3;

pub const LSHIFT_BASE_COST: Cost = 277;
pub const LSHIFT_COST_PER_BYTE: Cost = 3;

pub const LOGNOT_BASE_COST: Cost = 331;
pub const LOGNOT_COST_PER_BYTE: Cost = 3;

pub const APPLY_COST: Cost = 90;
pub const QUOTE_COST: Cost = 20;

/// Running total of the cost spent by one evaluation
#[derive(Debug, Clone)]
pub struct CostMeter {
    spent: Cost,
    limit: Option<Cost>,
}

impl CostMeter {
    pub fn with_limit(limit: Option<Cost>) -> Self {
        Self { spent: 0, limit }
    }

    /// Adds `cost` to the total, failing once the total passes the limit
    pub fn charge(&mut self, cost: Cost) -> Result<(), EvalError> {
        self.spent = self.spent.saturating_add(cost);
        match self.limit {
            Some(limit) if self.spent > limit => Err(EvalError::new(EvalErrorKind::CostExceeded {
                limit,
                spent: self.spent,
            })),
            _ => Ok(()),
        }
    }

    pub fn spent(&self) -> Cost {
        self.spent
    }

    pub fn remaining(&self) -> Option<Cost> {
        self.limit.map(|limit| limit.saturating_sub(self.spent))
    }
}

pub(crate) fn count_cost(per_item: Cost, count: usize) -> Cost {
    Cost::try_from(count)
        .unwrap_or(Cost::MAX)
        .saturating_mul(per_item)
}

/// Charges for the bytes of a freshly allocated atom
pub(crate) fn malloc_cost(cost: Cost, atom: Atom) -> Reduction {
    Reduction {
        cost: cost.saturating_add(count_cost(MALLOC_COST_PER_BYTE, atom.len())),
        value: Value::Atom(atom),
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::{malloc_cost, CostMeter};
    use crate::{runtime::EvalErrorKind, value::Atom};

    #[test]
    fn meter_limits() {
        let mut meter = CostMeter::with_limit(Some(100));
        check!(meter.charge(60).is_ok());
        check!(meter.charge(40).is_ok());
        check!(meter.remaining() == Some(0));
        let_assert!(Err(err) = meter.charge(1));
        check!(err.kind == EvalErrorKind::CostExceeded { limit: 100, spent: 101 });
    }

    #[test]
    fn unlimited_meter_saturates() {
        let mut meter = CostMeter::with_limit(None);
        check!(meter.charge(u64::MAX).is_ok());
        check!(meter.charge(5).is_ok());
        check!(meter.spent() == u64::MAX);
        check!(meter.remaining() == None);
    }

    #[test]
    fn malloc_charges_per_byte() {
        check!(malloc_cost(7, Atom::from([1, 2, 3])).cost == 37);
        check!(malloc_cost(7, Atom::NIL).cost == 7);
    }
}
