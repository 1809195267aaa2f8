use bsi_common::{Result, error::Error};
use rayon::prelude::*;
use roaring::RoaringTreemap;

use crate::{Bsi, Operation, executor};

impl Bsi {
    /// Sums the values of `found_set` without decoding them.
    ///
    /// Returns `(sum, count)` where `count` is the cardinality of `found_set`
    /// and `sum` is `Σ |found_set ∩ plane_j| << j`, wrapping on overflow.
    /// Identifiers of `found_set` without a value contribute nothing to the sum
    /// but are still counted, so callers wanting a mean should restrict
    /// `found_set` to [`existence`](Bsi::existence) first.
    pub fn sum(&self, found_set: &RoaringTreemap) -> (i64, u64) {
        let count = found_set.len();
        let sum = self
            .planes
            .par_iter()
            .enumerate()
            .map(|(j, plane)| ((found_set & plane).len() as i64).wrapping_shl(j as u32))
            .reduce(|| 0, i64::wrapping_add);
        (sum, count)
    }

    /// Returns the smallest ([`Operation::Min`]) or largest
    /// ([`Operation::Max`]) value among the identifiers of `found_set`, or
    /// `None` when none of them holds a value.
    ///
    /// Each batch narrows its candidates plane by plane from the most
    /// significant bit, keeping the identifiers whose bit matches the wanted
    /// extremum whenever at least one does. The survivors of the last plane all
    /// hold the batch extremum. Values order as unsigned bit patterns.
    pub fn min_max(
        &self,
        parallelism: usize,
        op: Operation,
        found_set: &RoaringTreemap,
    ) -> Result<Option<i64>> {
        if !matches!(op, Operation::Min | Operation::Max) {
            return Err(Error::invalid_arg(
                "op",
                format!("'{op}' does not select an extremum"),
            ));
        }

        let found_set = self.restrict_to_existing(Some(found_set));
        let extremum = executor::map(parallelism, &found_set, |batch| {
            self.batch_extremum(op, batch)
        })
        .into_iter()
        .flatten()
        .reduce(|a, b| if op == Operation::Max { a.max(b) } else { a.min(b) });
        Ok(extremum.map(|value| value as i64))
    }

    fn batch_extremum(&self, op: Operation, batch: &[u64]) -> Option<u64> {
        let mut candidates = batch.iter().copied().collect::<RoaringTreemap>();
        for plane in self.planes.iter().rev() {
            if candidates.len() <= 1 {
                break;
            }
            let narrowed = if op == Operation::Max {
                &candidates & plane
            } else {
                &candidates - plane
            };
            if !narrowed.is_empty() {
                candidates = narrowed;
            }
        }
        candidates.min().map(|id| self.decode(id))
    }
}
