use std::io::Cursor;

use bsi_core::{Bsi, BsiConfig, Operation, RoaringTreemap};

fn create_bounded_bsi(count: u64) -> Bsi {
    let mut bsi = Bsi::new(count as i64, 0);
    for id in 0..count {
        bsi.set_value(id, id as i64);
    }
    bsi
}

#[test]
fn test_bounded_compare_and_sum() {
    let bsi = create_bounded_bsi(100);

    let eq = bsi.compare_value(0, Operation::Eq, 50, 0, None).unwrap();
    assert_eq!(eq.len(), 1);
    let lt = bsi.compare_value(0, Operation::Lt, 50, 0, None).unwrap();
    assert_eq!(lt.len(), 50);

    let range = bsi
        .compare_value(0, Operation::Range, 45, 55, None)
        .unwrap();
    assert_eq!(range.len(), 11);
    assert_eq!(bsi.sum(&range), (550, 11));
}

#[test]
fn test_merge_disjoint_indexes() {
    let mut first = Bsi::new(200, 0);
    let mut second = Bsi::new(200, 0);
    for id in 0..100u64 {
        first.set_value(id, id as i64);
        second.set_value(id + 100, id as i64 + 100);
    }

    let mut merged = Bsi::new(200, 0);
    merged.par_or(0, &[&first, &second]);
    assert_eq!(merged.cardinality(), 200);
    for id in 0..200u64 {
        assert_eq!(merged.get_value(id), Some(id as i64));
    }
}

#[test]
fn test_retain_single_id() {
    let bsi = create_bounded_bsi(100);
    let retained = bsi.new_bsi_retain_set(&[50u64].into_iter().collect::<RoaringTreemap>());
    assert_eq!(retained.cardinality(), 1);
    assert_eq!(retained.get_value(50), Some(50));
}

#[test]
fn test_query_pipeline() {
    fastrand::seed(2985745485);
    let mut bsi = Bsi::new_default()
        .with_config(BsiConfig::with_all_parameters(4, 8).unwrap());
    let mut values = Vec::new();
    for _ in 0..50_000 {
        let id = fastrand::u64(..);
        let value = fastrand::i64(0..1000);
        bsi.set_value(id, value);
        values.push((id, value));
    }
    let unique_ids = values
        .iter()
        .map(|&(id, _)| id)
        .collect::<RoaringTreemap>();
    assert_eq!(bsi.cardinality(), unique_ids.len());

    let found_set = bsi
        .compare_value(0, Operation::Range, 100, 199, None)
        .unwrap();
    let histogram = bsi.transpose_with_counts(0, Some(&found_set), None);
    assert_eq!(
        histogram.sum(histogram.existence()).0,
        found_set.len() as i64
    );
    assert_eq!(bsi.transpose(0, Some(&found_set)), *histogram.existence());
    assert!(histogram.existence().iter().all(|v| (100..200).contains(&v)));

    let min = bsi.min_max(0, Operation::Min, &found_set).unwrap().unwrap();
    let max = bsi.min_max(0, Operation::Max, &found_set).unwrap().unwrap();
    assert!(min >= 100 && max <= 199 && min <= max);

    let mut bytes = Vec::new();
    bsi.write_to(&mut bytes).unwrap();
    let restored = Bsi::read_from(&mut Cursor::new(&bytes)).unwrap();
    assert_eq!(restored, bsi);
    assert_eq!(
        restored
            .compare_value(3, Operation::Range, 100, 199, None)
            .unwrap(),
        found_set
    );
}

#[test]
fn test_concurrent_readers() {
    let bsi = create_bounded_bsi(10_000);
    std::thread::scope(|scope| {
        let handles = (0..4i64)
            .map(|t| {
                let bsi = &bsi;
                scope.spawn(move || {
                    let start = t * 1000;
                    let found_set = bsi
                        .compare_value(0, Operation::Range, start, start + 999, None)
                        .unwrap();
                    bsi.sum(&found_set)
                })
            })
            .collect::<Vec<_>>();
        for (t, handle) in handles.into_iter().enumerate() {
            let start = t as i64 * 1000;
            let expected = (start..start + 1000).sum::<i64>();
            assert_eq!(handle.join().unwrap(), (expected, 1000));
        }
    });
}

#[test]
fn test_histogram_of_counts() {
    let mut counts = Bsi::new_default();
    let events = [7u64, 7, 3, 7, 9, 3];
    for &id in &events {
        counts.increment(&[id].into_iter().collect::<RoaringTreemap>());
    }
    assert_eq!(counts.get_value(7), Some(3));
    assert_eq!(counts.get_value(3), Some(2));
    assert_eq!(counts.get_value(9), Some(1));

    let frequent = counts
        .compare_value(0, Operation::Ge, 2, 0, None)
        .unwrap();
    assert_eq!(frequent.iter().collect::<Vec<_>>(), vec![3, 7]);

    counts.clear_values(&frequent);
    assert_eq!(counts.cardinality(), 1);
    assert_eq!(counts.batch_equal(0, &[1, 2, 3]).len(), 1);
}
