use adr_rom::io::read_ascii_matrix;
use adr_rom::nalgebra::{dvector, DMatrix, DVector};
use adr_rom::observer::SnapshotCollector;

use crate::test_output_dir;

#[test]
fn frequency_must_divide_number_of_steps() {
    assert!(SnapshotCollector::new(10, 2, DVector::zeros(2), 0).is_err());
    assert!(SnapshotCollector::new(10, 2, DVector::zeros(2), 3).is_err());
    assert!(SnapshotCollector::new(10, 2, DVector::zeros(3), 5).is_err());
    assert!(SnapshotCollector::new(10, 2, DVector::zeros(2), 5).is_ok());
}

#[test]
fn stores_every_nth_state_except_the_initial_one() {
    let mut collector = SnapshotCollector::new(4, 2, DVector::zeros(2), 2).unwrap();
    for step in 0..=4 {
        collector.observe(step, 0.1 * step as f64, &dvector![step as f64, -(step as f64)]);
    }
    assert_eq!(collector.num_collected(), 2);
    assert_eq!(collector.snapshots(), &DMatrix::from_column_slice(2, 2, &[2.0, -2.0, 4.0, -4.0]));
}

#[test]
fn subtracts_reference_state() {
    let mut collector = SnapshotCollector::new(2, 2, dvector![1.0, 2.0], 1)
        .unwrap()
        .subtract_reference();
    collector.observe(1, 0.1, &dvector![1.5, 2.5]);
    collector.observe(2, 0.2, &dvector![3.0, 2.0]);
    assert_eq!(collector.snapshots(), &DMatrix::from_column_slice(2, 2, &[0.5, 0.5, 2.0, 0.0]));
}

#[test]
#[should_panic]
fn observing_too_many_snapshots_panics() {
    let mut collector = SnapshotCollector::new(1, 1, DVector::zeros(1), 1).unwrap();
    collector.observe(1, 0.0, &dvector![1.0]);
    collector.observe(2, 0.0, &dvector![1.0]);
}

#[test]
fn saved_snapshots_can_be_read_back() {
    let mut collector = SnapshotCollector::new(3, 3, DVector::zeros(3), 1).unwrap();
    for step in 1..=3 {
        collector.observe(step, 0.0, &DVector::from_fn(3, |i, _| 0.25 * (i + step) as f64));
    }
    let path = test_output_dir("observer").join("snapshots.txt");
    collector.save_snapshots(&path).unwrap();
    assert_eq!(&read_ascii_matrix(&path, 3).unwrap(), collector.snapshots());
}
