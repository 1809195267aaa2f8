//! Range and equality predicates evaluated plane by plane.
//!
//! For every identifier the planes are scanned from the most significant bit
//! down, the same way two numbers are compared digit by digit. The scan stops
//! as soon as the outcome is known, so the value itself is never rebuilt.

use std::{borrow::Cow, fmt};

use ahash::AHashSet;
use bsi_common::{Result, error::Error};
use roaring::RoaringTreemap;

use crate::{
    Bsi,
    bsi::bit_len,
    executor::BatchTask,
};

/// Query operation.
///
/// `Lt` through `Range` are comparisons accepted by
/// [`Bsi::compare_value`]; `Min` and `Max` select the extremum in
/// [`Bsi::min_max`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    /// Inclusive `[start, end]`.
    Range,
    Min,
    Max,
}

impl Operation {
    #[inline]
    pub fn is_comparison(self) -> bool {
        !matches!(self, Operation::Min | Operation::Max)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Lt => "<",
            Operation::Le => "<=",
            Operation::Eq => "=",
            Operation::Ge => ">=",
            Operation::Gt => ">",
            Operation::Range => "between",
            Operation::Min => "min",
            Operation::Max => "max",
        };
        f.write_str(name)
    }
}

/// A comparison bound to its operands.
#[derive(Debug, Clone)]
pub(crate) struct CompareTask {
    op: Operation,
    start: u64,
    end: u64,
    /// Planes to scan. Operands wider than the index are compared against
    /// implicit zero planes.
    width: usize,
}

impl CompareTask {
    pub(crate) fn new(op: Operation, start: i64, end: i64, bit_count: usize) -> Result<Self> {
        if !op.is_comparison() {
            return Err(Error::invalid_arg(
                "op",
                format!("'{op}' is not a comparison"),
            ));
        }
        let start = start as u64;
        let end = if op == Operation::Range { end as u64 } else { 0 };
        let width = bit_count.max(bit_len(start)).max(bit_len(end));
        Ok(CompareTask {
            op,
            start,
            end,
            width,
        })
    }

    /// Classifies `id` against the operands.
    pub(crate) fn matches(&self, planes: &[RoaringTreemap], id: u64) -> bool {
        let range = self.op == Operation::Range;
        let (mut eq1, mut lt1, mut gt1) = (true, false, false);
        let (mut eq2, mut lt2) = (true, false);

        for j in (0..self.width).rev() {
            let bit = planes.get(j).is_some_and(|plane| plane.contains(id));
            let mask = 1u64 << j;

            if eq1 {
                if self.start & mask != 0 {
                    if !bit {
                        lt1 = true;
                        eq1 = false;
                    }
                } else if bit {
                    gt1 = true;
                    eq1 = false;
                }
            }

            if !range {
                if !eq1 {
                    break;
                }
                continue;
            }

            if eq2 {
                if self.end & mask != 0 {
                    if !bit {
                        lt2 = true;
                        eq2 = false;
                    }
                } else if bit {
                    eq2 = false;
                }
            }
            // Below start, above end, or strictly inside: nothing left to learn.
            if lt1 || (!eq2 && !lt2) || (gt1 && lt2) {
                break;
            }
        }

        match self.op {
            Operation::Lt => lt1,
            Operation::Le => eq1 || lt1,
            Operation::Eq => eq1,
            Operation::Ge => eq1 || gt1,
            Operation::Gt => gt1,
            Operation::Range => (eq1 || gt1) && (eq2 || lt2),
            // Rejected by `CompareTask::new`.
            Operation::Min | Operation::Max => false,
        }
    }
}

impl Bsi {
    /// Returns the identifiers whose value satisfies `op`.
    ///
    /// `end` is only read for [`Operation::Range`], where both bounds are
    /// inclusive. `found_set` restricts the candidates and defaults to every
    /// identifier holding a value; identifiers without a value never match.
    ///
    /// Values compare as unsigned `bit_count()`-bit patterns.
    pub fn compare_value(
        &self,
        parallelism: usize,
        op: Operation,
        start: i64,
        end: i64,
        found_set: Option<&RoaringTreemap>,
    ) -> Result<RoaringTreemap> {
        let task = CompareTask::new(op, start, end, self.bit_count())?;
        let found_set = self.restrict_to_existing(found_set);
        Ok(BatchTask::Compare(task).execute(self, parallelism, &found_set))
    }

    /// Returns the identifiers whose value is one of `values`.
    ///
    /// Each value is decoded once per identifier, which beats a union of
    /// `Eq` comparisons when `values` is large.
    pub fn batch_equal(&self, parallelism: usize, values: &[i64]) -> RoaringTreemap {
        let values = values.iter().copied().collect::<AHashSet<i64>>();
        if values.is_empty() {
            return RoaringTreemap::new();
        }
        BatchTask::BatchEqual(&values).execute(self, parallelism, &self.existence)
    }

    /// `found_set ∩ existence`, or the existence set itself.
    pub(crate) fn restrict_to_existing<'a>(
        &'a self,
        found_set: Option<&RoaringTreemap>,
    ) -> Cow<'a, RoaringTreemap> {
        match found_set {
            Some(found_set) => Cow::Owned(found_set & &self.existence),
            None => Cow::Borrowed(&self.existence),
        }
    }
}
