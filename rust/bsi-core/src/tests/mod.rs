
use std::collections::BTreeMap;

use crate::{Bsi, BsiConfig};

/// Index bounded to `count`, where identifier `i` holds `i`.
pub(crate) fn sequential_bsi(count: u64) -> Bsi {
    let mut bsi = Bsi::new(count as i64, 0);
    for id in 0..count {
        bsi.set_value(id, id as i64);
    }
    bsi
}

/// Auto-sized index with `count` random identifiers spread over `id_span`,
/// holding values in `0..max_value`. Also returns the expected contents.
pub(crate) fn random_bsi(
    seed: u64,
    count: usize,
    id_span: u64,
    max_value: i64,
) -> (Bsi, BTreeMap<u64, i64>) {
    fastrand::seed(seed);
    let mut bsi = Bsi::new_default();
    let mut expected = BTreeMap::new();
    for _ in 0..count {
        let id = fastrand::u64(0..id_span);
        let value = fastrand::i64(0..max_value);
        bsi.set_value(id, value);
        expected.insert(id, value);
    }
    (bsi, expected)
}

/// Configuration forcing every per-plane mutation onto the thread pool.
pub(crate) fn fan_out_config() -> BsiConfig {
    BsiConfig::with_all_parameters(0, 2).unwrap()
}
