//! Tests for the location resolver
//!
//! Fixtures build a box registered at a known position and measurements at
//! whole-hour offsets from a fixed base time.

pub mod batch_tests;

use crate::app::models::{Measurement, Point, SenseBox, Sensor};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub const SENSOR_ID: &str = "5a0c2cc89fd3c200111118f0";
pub const OTHER_SENSOR_ID: &str = "5a0c2cc89fd3c200111118f1";

/// Base time of every fixture (box registration)
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Base time shifted by whole hours
pub fn hours(offset: i64) -> DateTime<Utc> {
    base_time() + Duration::hours(offset)
}

pub fn home() -> Point {
    Point::new(7.6261, 51.9607)
}

pub fn office() -> Point {
    Point::new(7.5953, 51.9692)
}

pub fn park() -> Point {
    Point::new(7.6114, 51.9482)
}

/// Box with two sensors registered at `home` at the base time
pub fn create_test_box() -> SenseBox {
    SenseBox::new(
        "5a0c2cc89fd3c200111118ef",
        vec![
            Sensor::new(SENSOR_ID, "Temperatur", "°C", "HDC1080"),
            Sensor::new(OTHER_SENSOR_ID, "rel. Luftfeuchte", "%", "HDC1080"),
        ],
        home(),
        base_time(),
    )
    .unwrap()
}

/// Measurement of the default sensor at an hour offset
pub fn measurement_at(offset: i64, value: f64) -> Measurement {
    Measurement::new(SENSOR_ID, value, hours(offset))
}

/// Measurement declaring a position
pub fn located_measurement_at(offset: i64, value: f64, point: Point) -> Measurement {
    measurement_at(offset, value).with_location(point)
}
