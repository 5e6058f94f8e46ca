//! Tests for content-type selection and the decode entrypoint

use super::*;
use crate::Error;
use crate::app::services::decoder::{ContentType, decode, decoder_for};
use crate::config::DecoderConfig;

#[test]
fn test_content_type_parsing() {
    assert_eq!("json".parse::<ContentType>().unwrap(), ContentType::Json);
    assert_eq!(
        "application/json; charset=utf-8".parse::<ContentType>().unwrap(),
        ContentType::Json
    );
    assert_eq!("TEXT/CSV".parse::<ContentType>().unwrap(), ContentType::Csv);
    assert_eq!("csv".parse::<ContentType>().unwrap(), ContentType::Csv);
    assert_eq!("luftdaten".parse::<ContentType>().unwrap(), ContentType::Luftdaten);
    assert_eq!("hackair".parse::<ContentType>().unwrap(), ContentType::HackAir);
    assert_eq!(
        "application/sbx-bytes".parse::<ContentType>().unwrap(),
        ContentType::Bytes
    );
    assert_eq!(
        "application/sbx-bytes-ts".parse::<ContentType>().unwrap(),
        ContentType::BytesTimestamped
    );

    let error = "application/xml".parse::<ContentType>().unwrap_err();
    assert!(matches!(error, Error::UnsupportedContentType { .. }));
}

#[test]
fn test_decoder_for_names_formats() {
    assert_eq!(decoder_for(ContentType::Json).format(), "json");
    assert_eq!(decoder_for(ContentType::Csv).format(), "csv");
    assert_eq!(decoder_for(ContentType::Bytes).format(), "sbx-bytes");
    assert_eq!(decoder_for(ContentType::BytesTimestamped).format(), "sbx-bytes-ts");
}

#[test]
fn test_foreign_sensor_is_rejected() {
    let sensors = create_test_sensors();
    let ctx = create_test_context(&sensors);
    let payload = format!("{PM10_ID},1\n5a0c2cc89fd3c20011111899,2");

    match decode(ContentType::Csv, payload.as_bytes(), &ctx).unwrap_err() {
        Error::SensorMismatch { sensor_id, box_id } => {
            assert_eq!(sensor_id, "5a0c2cc89fd3c20011111899");
            assert_eq!(box_id, BOX_ID);
        }
        other => panic!("expected sensor mismatch, got {other:?}"),
    }
}

#[test]
fn test_owned_sensors_pass() {
    let sensors = create_test_sensors();
    let ctx = create_test_context(&sensors);
    let payload = encode_tuple(PM25_ID, 3.0, None);

    let measurements = decode(ContentType::Bytes, &payload, &ctx).unwrap();
    assert_eq!(measurements.len(), 1);
    assert_eq!(measurements[0].sensor_id, PM25_ID);
}

#[test]
fn test_byte_tuple_cap() {
    let sensors = create_test_sensors();
    let ctx = create_test_context(&sensors)
        .with_config(DecoderConfig::default().with_max_byte_tuples(2));

    let payload: Vec<u8> = (0..3)
        .flat_map(|_| encode_tuple(PM10_ID, 1.0, None))
        .collect();

    let error = decode(ContentType::Bytes, &payload, &ctx).unwrap_err();
    assert!(matches!(error, Error::Decode { .. }));
    assert!(decode(ContentType::Bytes, &payload[..32], &ctx).is_ok());
}
