//! Data models for the senseBox pipeline
//!
//! This module contains the canonical value types shared by every stage:
//! measurements, points, sensors, and boxes with their location timeline.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a sensor (24 hex characters for stored sensors)
pub type SensorId = String;

// =============================================================================
// Geometry
// =============================================================================

/// WGS84 position with optional height above ground in metres
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lng: f64,
    pub lat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl Point {
    /// Create a point without height
    pub fn new(lng: f64, lat: f64) -> Self {
        Self {
            lng,
            lat,
            height: None,
        }
    }

    /// Set the height above ground
    pub fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    /// Validate coordinate ranges
    pub fn validate(&self) -> Result<()> {
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(Error::validation(format!(
                "Invalid longitude {}: must be between -180 and 180 degrees",
                self.lng
            )));
        }

        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(Error::validation(format!(
                "Invalid latitude {}: must be between -90 and 90 degrees",
                self.lat
            )));
        }

        if let Some(height) = self.height {
            if !height.is_finite() {
                return Err(Error::validation(format!("Invalid height {height}")));
            }
        }

        Ok(())
    }

    /// Whether both points describe the same fix (height included)
    pub fn same_position(&self, other: &Point) -> bool {
        self.lng == other.lng && self.lat == other.lat && self.height == other.height
    }

    /// GeoJSON-style coordinate array
    pub fn coordinates(&self) -> Vec<f64> {
        match self.height {
            Some(height) => vec![self.lng, self.lat, height],
            None => vec![self.lng, self.lat],
        }
    }
}

// =============================================================================
// Measurements
// =============================================================================

/// Loosely typed measurement value.
///
/// Textual payloads keep their original text so it can be written back
/// unchanged; binary payloads carry the decoded float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Number(f64),
    Text(String),
}

impl MeasurementValue {
    /// Parse the value as a finite float
    pub fn as_f64(&self) -> Result<f64> {
        let parsed = match self {
            MeasurementValue::Number(value) => *value,
            MeasurementValue::Text(text) => text.trim().parse::<f64>().map_err(|e| {
                Error::validation(format!("Value '{text}' is not numeric ({e})"))
            })?,
        };

        if !parsed.is_finite() {
            return Err(Error::validation(format!("Value {parsed} is not finite")));
        }

        Ok(parsed)
    }
}

impl fmt::Display for MeasurementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementValue::Number(value) => write!(f, "{value}"),
            MeasurementValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<f64> for MeasurementValue {
    fn from(value: f64) -> Self {
        MeasurementValue::Number(value)
    }
}

impl From<&str> for MeasurementValue {
    fn from(value: &str) -> Self {
        MeasurementValue::Text(value.to_string())
    }
}

/// Canonical measurement produced by every decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub sensor_id: SensorId,
    pub value: MeasurementValue,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Point>,
}

impl Measurement {
    /// Create a measurement without location
    pub fn new(
        sensor_id: impl Into<SensorId>,
        value: impl Into<MeasurementValue>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            value: value.into(),
            created_at,
            location: None,
        }
    }

    /// Attach a location
    pub fn with_location(mut self, location: Point) -> Self {
        self.location = Some(location);
        self
    }
}

// =============================================================================
// Sensors and Boxes
// =============================================================================

/// Sensor owned by a box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub id: SensorId,
    pub title: String,
    pub unit: String,
    pub sensor_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_measurement: Option<Measurement>,
}

impl Sensor {
    pub fn new(
        id: impl Into<SensorId>,
        title: impl Into<String>,
        unit: impl Into<String>,
        sensor_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            unit: unit.into(),
            sensor_type: sensor_type.into(),
            last_measurement: None,
        }
    }
}

/// One entry of a box's location timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEvent {
    pub point: Point,
    pub timestamp: DateTime<Utc>,
}

impl LocationEvent {
    pub fn new(point: Point, timestamp: DateTime<Utc>) -> Self {
        Self { point, timestamp }
    }
}

/// A sensor box: owner of its sensors and its location timeline
///
/// `locations` is strictly increasing by timestamp and `current_location`
/// always equals its last element. Only the location resolver mutates the
/// timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenseBox {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub sensors: Vec<Sensor>,
    pub locations: Vec<LocationEvent>,
    pub current_location: LocationEvent,
}

impl SenseBox {
    /// Register a box at `location`, effective from `registered_at`
    pub fn new(
        id: impl Into<String>,
        sensors: Vec<Sensor>,
        location: Point,
        registered_at: DateTime<Utc>,
    ) -> Result<Self> {
        location.validate()?;
        let event = LocationEvent::new(location, registered_at);

        Ok(Self {
            id: id.into(),
            name: String::new(),
            sensors,
            locations: vec![event.clone()],
            current_location: event,
        })
    }

    /// Set a display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Look up a sensor by id
    pub fn sensor(&self, sensor_id: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|sensor| sensor.id == sensor_id)
    }

    /// Whether the box owns the given sensor
    pub fn has_sensor(&self, sensor_id: &str) -> bool {
        self.sensor(sensor_id).is_some()
    }

    /// Check the timeline invariants: strictly increasing timestamps and
    /// `current_location` equal to the last entry.
    pub fn timeline_is_consistent(&self) -> bool {
        let increasing = self
            .locations
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp);

        let current_is_last = self
            .locations
            .last()
            .is_some_and(|last| *last == self.current_location);

        increasing && current_is_last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_point_validation() {
        assert!(Point::new(7.6, 51.9).validate().is_ok());
        assert!(Point::new(-180.0, 90.0).validate().is_ok());
        assert!(Point::new(180.1, 0.0).validate().is_err());
        assert!(Point::new(0.0, -90.5).validate().is_err());
        assert!(Point::new(f64::NAN, 0.0).validate().is_err());
    }

    #[test]
    fn test_same_position_includes_height() {
        let a = Point::new(7.0, 51.0);
        let b = Point::new(7.0, 51.0).with_height(3.0);
        assert!(a.same_position(&a.clone()));
        assert!(!a.same_position(&b));
    }

    #[test]
    fn test_measurement_value_parsing() {
        assert_eq!(MeasurementValue::from("12.3").as_f64().unwrap(), 12.3);
        assert_eq!(MeasurementValue::from(4.5).as_f64().unwrap(), 4.5);
        assert!(MeasurementValue::from("abc").as_f64().is_err());
        assert!(MeasurementValue::from("NaN").as_f64().is_err());
        assert_eq!(MeasurementValue::from("5.380").to_string(), "5.380");
    }

    #[test]
    fn test_measurement_serializes_camel_case() {
        let created_at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let measurement = Measurement::new("s1", "1.5", created_at);
        let json = serde_json::to_value(&measurement).unwrap();

        assert_eq!(json["sensorId"], "s1");
        assert_eq!(json["value"], "1.5");
        assert!(json.get("location").is_none());
    }

    #[test]
    fn test_new_box_timeline_is_consistent() {
        let registered = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let sense_box = SenseBox::new("box", vec![], Point::new(7.0, 51.0), registered).unwrap();

        assert_eq!(sense_box.locations.len(), 1);
        assert!(sense_box.timeline_is_consistent());
        assert!(SenseBox::new("box", vec![], Point::new(200.0, 0.0), registered).is_err());
    }
}
