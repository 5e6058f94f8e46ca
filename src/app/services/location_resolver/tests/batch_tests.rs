//! Tests for batch location resolution

use super::*;
use crate::app::services::location_resolver::{resolve_batch, update_location};

#[test]
fn test_unlocated_batch_uses_current_location() {
    let mut sense_box = create_test_box();
    let batch = vec![measurement_at(1, 1.0), measurement_at(2, 2.0)];

    let resolved = resolve_batch(&mut sense_box, batch).unwrap();

    assert!(resolved.iter().all(|m| m.location == Some(home())));
    assert_eq!(sense_box.locations.len(), 1);
}

#[test]
fn test_declared_position_creates_event_for_following_measurements() {
    let mut sense_box = create_test_box();
    let batch = vec![
        measurement_at(1, 1.0),
        located_measurement_at(2, 2.0, office()),
        measurement_at(3, 3.0),
        located_measurement_at(4, 4.0, office()),
    ];

    let resolved = resolve_batch(&mut sense_box, batch).unwrap();

    let points: Vec<_> = resolved.iter().map(|m| m.location.clone().unwrap()).collect();
    assert_eq!(points, vec![home(), office(), office(), office()]);
    assert_eq!(sense_box.locations.len(), 2);
    assert_eq!(sense_box.current_location.point, office());
    assert_eq!(sense_box.current_location.timestamp, hours(2));
}

#[test]
fn test_unsorted_batch_is_resolved_in_time_order() {
    let mut sense_box = create_test_box();
    let batch = vec![
        measurement_at(5, 5.0),
        located_measurement_at(3, 3.0, park()),
        measurement_at(1, 1.0),
    ];

    let resolved = resolve_batch(&mut sense_box, batch).unwrap();

    let times: Vec<_> = resolved.iter().map(|m| m.created_at).collect();
    assert_eq!(times, vec![hours(1), hours(3), hours(5)]);
    assert_eq!(resolved[0].location, Some(home()));
    assert_eq!(resolved[1].location, Some(park()));
    assert_eq!(resolved[2].location, Some(park()));
}

#[test]
fn test_existing_later_event_bounds_reuse() {
    let mut sense_box = create_test_box();
    update_location(&mut sense_box, Some(&office()), hours(10)).unwrap();

    let batch = vec![measurement_at(9, 9.0), measurement_at(11, 11.0)];
    let resolved = resolve_batch(&mut sense_box, batch).unwrap();

    assert_eq!(resolved[0].location, Some(home()));
    assert_eq!(resolved[1].location, Some(office()));
}

#[test]
fn test_back_dated_position_keeps_current_location() {
    let mut sense_box = create_test_box();
    update_location(&mut sense_box, Some(&office()), hours(10)).unwrap();
    let current = sense_box.current_location.clone();

    let batch = vec![located_measurement_at(5, 5.0, park())];
    resolve_batch(&mut sense_box, batch).unwrap();

    assert_eq!(sense_box.locations.len(), 3);
    assert_eq!(sense_box.locations[1].point, park());
    assert_eq!(sense_box.current_location, current);
}

#[test]
fn test_measurement_before_registration_redates_first_event() {
    let mut sense_box = create_test_box();

    let resolved = resolve_batch(&mut sense_box, vec![measurement_at(-3, 1.0)]).unwrap();

    assert_eq!(resolved[0].location, Some(home()));
    assert_eq!(sense_box.locations[0].timestamp, hours(-3));
    assert_eq!(sense_box.current_location.timestamp, hours(-3));
}

#[test]
fn test_registration_position_before_registration_redates_first_event() {
    let mut sense_box = create_test_box();
    let batch = vec![
        located_measurement_at(-5, 1.0, home()),
        measurement_at(-4, 2.0),
        located_measurement_at(1, 3.0, home()),
    ];

    let resolved = resolve_batch(&mut sense_box, batch).unwrap();

    assert!(resolved.iter().all(|m| m.location == Some(home())));
    assert_eq!(sense_box.locations.len(), 1);
    assert_eq!(sense_box.locations[0].timestamp, hours(-5));
    assert_eq!(sense_box.current_location.timestamp, hours(-5));
    assert!(sense_box.timeline_is_consistent());
}

#[test]
fn test_conflicting_positions_at_same_time_resolve_to_first() {
    let mut sense_box = create_test_box();
    let batch = vec![
        located_measurement_at(2, 1.0, office()),
        located_measurement_at(2, 2.0, park()),
    ];

    let resolved = resolve_batch(&mut sense_box, batch).unwrap();

    assert_eq!(resolved[0].location, Some(office()));
    assert_eq!(resolved[1].location, Some(office()));
    assert_eq!(sense_box.locations.len(), 2);
}

#[test]
fn test_timeline_stays_consistent_for_mixed_batches() {
    let points = [home(), office(), park()];

    for seed in 0..20i64 {
        let mut sense_box = create_test_box();
        let batch: Vec<_> = (0..12i64)
            .map(|i| {
                let offset = (i * 7 + seed * 5) % 17 - 4;
                let measurement = measurement_at(offset, i as f64);
                if (i + seed) % 3 == 0 {
                    measurement.with_location(points[((i / 3 + seed) % 3) as usize].clone())
                } else {
                    measurement
                }
            })
            .collect();

        let resolved = resolve_batch(&mut sense_box, batch).unwrap();

        assert_eq!(resolved.len(), 12);
        assert!(resolved.iter().all(|m| m.location.is_some()));
        assert!(
            sense_box.timeline_is_consistent(),
            "inconsistent timeline for seed {seed}: {:?}",
            sense_box.locations
        );
    }
}

#[test]
fn test_invalid_declared_position_is_rejected() {
    let mut sense_box = create_test_box();
    let batch = vec![located_measurement_at(1, 1.0, Point::new(0.0, 100.0))];

    assert!(resolve_batch(&mut sense_box, batch).is_err());
}

#[test]
fn test_empty_batch() {
    let mut sense_box = create_test_box();
    assert!(resolve_batch(&mut sense_box, Vec::new()).unwrap().is_empty());
}
