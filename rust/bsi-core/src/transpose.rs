//! Row-to-value inversion.

use log::debug;
use roaring::RoaringTreemap;

use crate::{Bsi, executor, executor::BatchTask};

impl Bsi {
    /// Returns the distinct values held by the identifiers of `found_set`
    /// (every identifier with a value when `None`), each value used as an
    /// identifier of the result.
    pub fn transpose(
        &self,
        parallelism: usize,
        found_set: Option<&RoaringTreemap>,
    ) -> RoaringTreemap {
        let found_set = self.restrict_to_existing(found_set);
        BatchTask::Transpose.execute(self, parallelism, &found_set)
    }

    /// Builds a histogram of the values held by `found_set`: the result maps
    /// each value (as an identifier) to the number of identifiers holding it.
    ///
    /// Values absent from `filter_set`, when given, are skipped. Each batch
    /// counts into a private index; the batch histograms are then summed.
    pub fn transpose_with_counts(
        &self,
        parallelism: usize,
        found_set: Option<&RoaringTreemap>,
        filter_set: Option<&RoaringTreemap>,
    ) -> Bsi {
        let found_set = self.restrict_to_existing(found_set);
        let partials = executor::map(parallelism, &found_set, |batch| {
            let mut counts = Bsi::new_default();
            for &id in batch {
                let value = self.decode(id);
                if filter_set.is_some_and(|filter| !filter.contains(value)) {
                    continue;
                }
                counts.increment_id(value);
            }
            counts
        });

        debug!(
            "transpose_with_counts: merging {} partial histograms",
            partials.len()
        );
        let mut partials = partials.into_iter();
        let mut histogram = partials.next().unwrap_or_default();
        for partial in partials {
            histogram.add(&partial);
        }
        histogram.config = self.config.clone();
        histogram
    }
}
