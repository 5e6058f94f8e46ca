//! JSON payload decoder
//!
//! Two shapes are accepted and told apart by the payload itself:
//!
//! - object: `{"<sensorId>": value | [value] | [value, createdAt] | [value, createdAt, location]}`
//! - array: `[{"sensor": "<sensorId>", "value": v, "createdAt"?: t, "location"?: l}]`
//!
//! In the array shape a `location` without `createdAt` is rejected. The object
//! shape yields its measurements ordered by sensor id, not by key position.

use super::validation::{build_measurement, created_at_from_json, location_from_json, value_from_json};
use super::{Decode, DecodeContext};
use crate::app::models::Measurement;
use crate::{Error, Result};
use serde_json::{Map, Value};

const FORMAT: &str = "json";

/// Decoder for `application/json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decode for JsonDecoder {
    fn format(&self) -> &'static str {
        FORMAT
    }

    fn decode(&self, payload: &[u8], ctx: &DecodeContext<'_>) -> Result<Vec<Measurement>> {
        let document: Value = serde_json::from_slice(payload)
            .map_err(|e| Error::decode(FORMAT, format!("Malformed JSON: {e}")))?;

        match document {
            Value::Array(items) => decode_array(items, ctx),
            Value::Object(entries) => decode_object(entries, ctx),
            other => Err(Error::decode(
                FORMAT,
                format!("Expected an object or array of measurements, got {other}"),
            )),
        }
    }
}

/// Decode the `[{sensor, value, createdAt?, location?}]` shape
fn decode_array(items: Vec<Value>, ctx: &DecodeContext<'_>) -> Result<Vec<Measurement>> {
    let mut measurements = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(fields) = item else {
            return Err(Error::decode(
                FORMAT,
                format!("Element {index} is not an object"),
            ));
        };

        let sensor_id = ["sensor", "sensor_id", "sensorId"]
            .iter()
            .find_map(|key| fields.get(*key))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::decode(FORMAT, format!("Element {index} has no sensor id"))
            })?;

        let raw_value = fields
            .get("value")
            .ok_or_else(|| Error::decode(FORMAT, format!("Element {index} has no value")))?;
        let value = value_from_json(raw_value)?;

        let created_at = fields
            .get("createdAt")
            .map(|raw| created_at_from_json(raw, ctx))
            .transpose()?;

        let location = fields.get("location").map(location_from_json).transpose()?;

        if location.is_some() && created_at.is_none() {
            return Err(Error::decode(
                FORMAT,
                format!("Element {index} has a location but no createdAt"),
            ));
        }

        measurements.push(build_measurement(sensor_id, value, created_at, location, ctx));
    }

    Ok(measurements)
}

/// Decode the `{sensorId: value | [value, createdAt?, location?]}` shape
fn decode_object(entries: Map<String, Value>, ctx: &DecodeContext<'_>) -> Result<Vec<Measurement>> {
    let mut measurements = Vec::with_capacity(entries.len());

    for (sensor_id, entry) in entries {
        let measurement = match entry {
            Value::Array(parts) => match parts.as_slice() {
                [value] => build_measurement(sensor_id, value_from_json(value)?, None, None, ctx),
                [value, created_at] => build_measurement(
                    sensor_id,
                    value_from_json(value)?,
                    Some(created_at_from_json(created_at, ctx)?),
                    None,
                    ctx,
                ),
                [value, created_at, location] => build_measurement(
                    sensor_id,
                    value_from_json(value)?,
                    Some(created_at_from_json(created_at, ctx)?),
                    Some(location_from_json(location)?),
                    ctx,
                ),
                _ => {
                    return Err(Error::decode(
                        FORMAT,
                        format!(
                            "Sensor {sensor_id}: expected [value], [value, createdAt] or \
                             [value, createdAt, location], got {} elements",
                            parts.len()
                        ),
                    ));
                }
            },
            scalar => build_measurement(sensor_id, value_from_json(&scalar)?, None, None, ctx),
        };

        measurements.push(measurement);
    }

    // Key order depends on serde_json features
    measurements.sort_by(|a, b| a.sensor_id.cmp(&b.sensor_id));
    Ok(measurements)
}
