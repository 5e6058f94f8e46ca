//! Tests for the JSON decoder

use super::*;
use crate::Error;
use crate::app::models::{MeasurementValue, Point};
use crate::app::services::decoder::{Decode, JsonDecoder};

#[test]
fn test_object_shape_variants() {
    let sensors = create_test_sensors();
    let ctx = create_test_context(&sensors);
    let payload = format!(
        r#"{{
            "{TEMPERATURE_ID}": 21.4,
            "{HUMIDITY_ID}": ["48.1"],
            "{PM10_ID}": [5.2, "2024-03-01T11:00:00Z"],
            "{PM25_ID}": [4.1, "2024-03-01T11:30:00.250Z", [7.64, 51.96, 60]]
        }}"#
    );

    let measurements = JsonDecoder.decode(payload.as_bytes(), &ctx).unwrap();
    assert_eq!(measurements.len(), 4);

    let find = |id: &str| measurements.iter().find(|m| m.sensor_id == id).unwrap();

    assert_eq!(find(TEMPERATURE_ID).value, MeasurementValue::Number(21.4));
    assert_eq!(find(TEMPERATURE_ID).created_at, reception_time());
    assert_eq!(find(HUMIDITY_ID).value, MeasurementValue::from("48.1"));
    assert_eq!(
        find(PM10_ID).created_at,
        Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap()
    );

    let located = find(PM25_ID);
    assert_eq!(located.created_at.timestamp_subsec_millis(), 250);
    assert_eq!(
        located.location,
        Some(Point::new(7.64, 51.96).with_height(60.0))
    );
}

#[test]
fn test_object_shape_is_ordered_by_sensor_id() {
    let sensors = create_test_sensors();
    let ctx = create_test_context(&sensors);
    let payload = format!(r#"{{"{PM25_ID}": 4.1, "{TEMPERATURE_ID}": 21.4, "{PM10_ID}": 5.2}}"#);

    let measurements = JsonDecoder.decode(payload.as_bytes(), &ctx).unwrap();

    let ids: Vec<_> = measurements.iter().map(|m| m.sensor_id.as_str()).collect();
    assert_eq!(ids, vec![TEMPERATURE_ID, PM10_ID, PM25_ID]);
}

#[test]
fn test_object_shape_rejects_long_arrays() {
    let sensors = create_test_sensors();
    let ctx = create_test_context(&sensors);
    let payload = format!(r#"{{"{PM10_ID}": [1, "2024-03-01T11:00:00Z", [7, 51], 4]}}"#);

    let error = JsonDecoder.decode(payload.as_bytes(), &ctx).unwrap_err();
    assert!(matches!(error, Error::Decode { format: "json", .. }));
}

#[test]
fn test_array_shape() {
    let sensors = create_test_sensors();
    let ctx = create_test_context(&sensors);
    let payload = format!(
        r#"[
            {{"sensor": "{PM10_ID}", "value": "5.0"}},
            {{"sensor": "{PM10_ID}", "value": 6, "createdAt": "2024-03-01T10:00:00Z",
              "location": {{"lng": 7.1, "lat": 51.2}}}}
        ]"#
    );

    let measurements = JsonDecoder.decode(payload.as_bytes(), &ctx).unwrap();

    assert_eq!(measurements.len(), 2);
    assert_eq!(measurements[0].created_at, reception_time());
    assert!(measurements[0].location.is_none());
    assert_eq!(measurements[1].location, Some(Point::new(7.1, 51.2)));
}

#[test]
fn test_array_location_requires_created_at() {
    let sensors = create_test_sensors();
    let ctx = create_test_context(&sensors);
    let payload = format!(r#"[{{"sensor": "{PM10_ID}", "value": 1, "location": [7, 51]}}]"#);

    let error = JsonDecoder.decode(payload.as_bytes(), &ctx).unwrap_err();
    assert!(matches!(error, Error::Decode { .. }));
}

#[test]
fn test_array_element_without_sensor_is_rejected() {
    let sensors = create_test_sensors();
    let ctx = create_test_context(&sensors);

    assert!(JsonDecoder.decode(br#"[{"value": 1}]"#, &ctx).is_err());
    assert!(JsonDecoder.decode(br#"[42]"#, &ctx).is_err());
}

#[test]
fn test_malformed_and_scalar_documents() {
    let sensors = create_test_sensors();
    let ctx = create_test_context(&sensors);

    assert!(matches!(
        JsonDecoder.decode(b"{not json", &ctx).unwrap_err(),
        Error::Decode { .. }
    ));
    assert!(JsonDecoder.decode(b"12", &ctx).is_err());
}

#[test]
fn test_future_timestamp_is_rejected() {
    let sensors = create_test_sensors();
    let ctx = create_test_context(&sensors);
    let payload = format!(r#"{{"{PM10_ID}": [1, "2024-03-01T12:05:00Z"]}}"#);

    let error = JsonDecoder.decode(payload.as_bytes(), &ctx).unwrap_err();
    assert!(matches!(error, Error::Validation { .. }));
}
