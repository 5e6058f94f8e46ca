//! Tests for the multi-format decoder
//!
//! Fixtures provide a box with a typical sensor catalog and a fixed
//! reception time so timestamp checks are deterministic.

pub mod json_tests;
pub mod registry_tests;

use crate::app::models::Sensor;
use crate::app::services::decoder::DecodeContext;
use chrono::{DateTime, TimeZone, Utc};

pub const BOX_ID: &str = "5a0c2cc89fd3c200111118ef";
pub const TEMPERATURE_ID: &str = "5a0c2cc89fd3c200111118f0";
pub const HUMIDITY_ID: &str = "5a0c2cc89fd3c200111118f1";
pub const PM10_ID: &str = "5a0c2cc89fd3c200111118f2";
pub const PM25_ID: &str = "5a0c2cc89fd3c200111118f3";

/// Fixed reception time used by every test context
pub fn reception_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// Sensor catalog of a senseBox:home with an SDS011 and a DHT22
pub fn create_test_sensors() -> Vec<Sensor> {
    vec![
        Sensor::new(TEMPERATURE_ID, "Temperatur", "°C", "DHT22"),
        Sensor::new(HUMIDITY_ID, "rel. Luftfeuchte", "%", "DHT22"),
        Sensor::new(PM10_ID, "PM10", "µg/m³", "SDS 011"),
        Sensor::new(PM25_ID, "PM2.5", "µg/m³", "SDS 011"),
    ]
}

/// Decode context bound to the test box with a fixed reception time
pub fn create_test_context(sensors: &[Sensor]) -> DecodeContext<'_> {
    DecodeContext::new(BOX_ID, sensors).with_now(reception_time())
}

/// Encode one byte tuple, optionally with a timestamp
pub fn encode_tuple(sensor_id: &str, value: f32, timestamp: Option<u32>) -> Vec<u8> {
    let mut tuple = crate::app::services::decoder::bytes::id_bytes(sensor_id)
        .unwrap()
        .to_vec();
    tuple.extend_from_slice(&value.to_le_bytes());
    if let Some(timestamp) = timestamp {
        tuple.extend_from_slice(&timestamp.to_le_bytes());
    }
    tuple
}
