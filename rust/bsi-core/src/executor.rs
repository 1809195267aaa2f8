//! Fan-out/fan-in over batches of a found-set.
//!
//! The found-set is split into `parallelism` contiguous batches of
//! `len / parallelism` identifiers, the remainder going to the last batch.
//! Each non-empty batch is handed to its own worker, which builds a private
//! result. Results are merged only after every worker has finished.

use ahash::AHashSet;
use log::trace;
use rayon::prelude::*;
use roaring::RoaringTreemap;

use crate::{Bsi, compare::CompareTask};

/// Resolves a requested degree of parallelism, `0` meaning every worker thread.
#[inline]
pub(crate) fn resolve_parallelism(parallelism: usize) -> usize {
    if parallelism == 0 {
        rayon::current_num_threads().max(1)
    } else {
        parallelism
    }
}

/// Splits `found_set` into at most `parallelism` batches.
///
/// Every batch is drained from a single shared iterator, advancing it by
/// exactly the batch length. Empty batches are dropped.
///
/// When `parallelism` exceeds the cardinality every batch but the last would
/// be empty, so the whole set becomes a single batch.
pub(crate) fn partition(found_set: &RoaringTreemap, parallelism: usize) -> Vec<Vec<u64>> {
    let cardinality = found_set.len();
    let requested = resolve_parallelism(parallelism) as u64;
    let batch_count = if requested > cardinality { 1 } else { requested };
    let batch_len = cardinality / batch_count;
    let remainder = cardinality - batch_len * batch_count;

    let mut ids = found_set.iter();
    let mut batches = Vec::with_capacity(batch_count as usize);
    for i in 0..batch_count {
        let len = if i == batch_count - 1 {
            (batch_len + remainder) as usize
        } else {
            batch_len as usize
        };
        if len == 0 {
            continue;
        }
        let mut batch = Vec::with_capacity(len);
        batch.extend(ids.by_ref().take(len));
        batches.push(batch);
    }
    batches
}

/// Runs `worker` over every batch of `found_set` and returns the partial
/// results in batch order.
///
/// A single batch runs on the calling thread.
pub(crate) fn map<R, F>(parallelism: usize, found_set: &RoaringTreemap, worker: F) -> Vec<R>
where
    F: Fn(&[u64]) -> R + Send + Sync,
    R: Send,
{
    let batches = partition(found_set, parallelism);
    trace!(
        "dispatching {} ids in {} batches",
        found_set.len(),
        batches.len()
    );
    if batches.len() <= 1 {
        batches.iter().map(|batch| worker(batch)).collect()
    } else {
        batches.par_iter().map(|batch| worker(batch)).collect()
    }
}

/// Per-batch work producing a set of identifiers (or values used as
/// identifiers). Every case carries its own immutable context.
pub(crate) enum BatchTask<'a> {
    /// Identifiers satisfying a comparison.
    Compare(CompareTask),
    /// Values of the batch identifiers, inserted as identifiers.
    Transpose,
    /// Identifiers whose value is in the set.
    BatchEqual(&'a AHashSet<i64>),
}

impl BatchTask<'_> {
    /// Evaluates one batch. Every identifier of `batch` must hold a value.
    fn run(&self, bsi: &Bsi, batch: &[u64]) -> RoaringTreemap {
        match self {
            BatchTask::Compare(task) => batch
                .iter()
                .copied()
                .filter(|&id| task.matches(&bsi.planes, id))
                .collect(),
            BatchTask::Transpose => batch.iter().map(|&id| bsi.decode(id)).collect(),
            BatchTask::BatchEqual(values) => batch
                .iter()
                .copied()
                .filter(|&id| values.contains(&(bsi.decode(id) as i64)))
                .collect(),
        }
    }

    /// Runs the task over `found_set` and unions the partial results.
    ///
    /// `found_set` must be a subset of the existence set of `bsi`.
    pub(crate) fn execute(
        &self,
        bsi: &Bsi,
        parallelism: usize,
        found_set: &RoaringTreemap,
    ) -> RoaringTreemap {
        map(parallelism, found_set, |batch| self.run(bsi, batch))
            .into_iter()
            .fold(RoaringTreemap::new(), |mut result, partial| {
                result |= partial;
                result
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{map, partition};
    use roaring::RoaringTreemap;

    #[test]
    fn test_partition_remainder_goes_last() {
        let found_set: RoaringTreemap = (0..10u64).collect();
        let batches = partition(&found_set, 3);
        assert_eq!(
            batches,
            vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8, 9]]
        );
    }

    #[test]
    fn test_partition_more_workers_than_ids() {
        let found_set: RoaringTreemap = [5u64, 1000, 1 << 40].into_iter().collect();
        let batches = partition(&found_set, 8);
        assert_eq!(batches, vec![vec![5, 1000, 1 << 40]]);

        let batches = partition(&RoaringTreemap::new(), 4);
        assert!(batches.is_empty());
    }

    #[test]
    fn test_partition_huge_parallelism() {
        let found_set: RoaringTreemap = (0..100u64).collect();
        for parallelism in [usize::MAX, 1 << 40, 101] {
            let batches = partition(&found_set, parallelism);
            assert_eq!(batches, vec![(0..100u64).collect::<Vec<_>>()]);
        }
        assert!(partition(&RoaringTreemap::new(), usize::MAX).is_empty());

        let batches = partition(&found_set, 100);
        assert_eq!(batches.len(), 100);
        assert!(batches.iter().all(|batch| batch.len() == 1));
    }

    #[test]
    fn test_partition_all_threads() {
        let found_set: RoaringTreemap = (0..100_000u64).step_by(3).collect();
        let batches = partition(&found_set, 0);
        let flattened = batches.into_iter().flatten().collect::<Vec<_>>();
        assert_eq!(flattened, found_set.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_map_preserves_batch_order() {
        let found_set: RoaringTreemap = (0..1000u64).collect();
        let firsts = map(7, &found_set, |batch| batch[0]);
        assert_eq!(firsts.len(), 7);
        assert!(firsts.windows(2).all(|w| w[0] < w[1]));
        let total = map(7, &found_set, |batch| batch.len()).into_iter().sum::<usize>();
        assert_eq!(total, 1000);
    }
}
