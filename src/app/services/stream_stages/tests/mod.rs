//! Tests for the stream stages
//!
//! Fixtures produce measurement series at fixed offsets from a base day.


use crate::app::models::{Measurement, Point};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Midnight of the base day
pub fn day_zero() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
}

pub fn at_day(day: i64) -> DateTime<Utc> {
    day_zero() + Duration::days(day)
}

pub fn at_hour(hour: i64) -> DateTime<Utc> {
    day_zero() + Duration::hours(hour)
}

/// One value per minute for `sensor_id`, starting at the base day
pub fn minute_series(sensor_id: &str, values: &[f64]) -> Vec<Measurement> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            Measurement::new(sensor_id, *value, day_zero() + Duration::minutes(i as i64))
        })
        .collect()
}

/// Located measurement at an hour offset
pub fn located(sensor_id: &str, hour: i64, value: f64, lng: f64, lat: f64) -> Measurement {
    Measurement::new(sensor_id, value, at_hour(hour)).with_location(Point::new(lng, lat))
}
