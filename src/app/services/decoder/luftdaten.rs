//! Luftdaten (sensor.community) payload decoder
//!
//! Firmware posts `{"sensordatavalues": [{"value_type": "SDS_P1", "value": "5.38"}, ...]}`.
//! The `value_type` is lower-cased and split on the first `_` into a
//! sensor-type prefix and a phenomenon token. A box sensor matches when its
//! lower-cased title is an alias of the phenomenon and its sensor type starts
//! with the prefix. Values without a matching sensor are dropped; a payload
//! without any match is an error.

use super::validation::{build_measurement, value_from_json};
use super::{Decode, DecodeContext};
use crate::app::models::{Measurement, Sensor};
use crate::constants::luftdaten::{PHENOMENA, PREFIXLESS_SENSOR_TYPES, Phenomenon};
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const FORMAT: &str = "luftdaten";

#[derive(Debug, Deserialize)]
struct LuftdatenPayload {
    sensordatavalues: Vec<LuftdatenValue>,
}

#[derive(Debug, Deserialize)]
struct LuftdatenValue {
    value_type: String,
    value: Value,
}

/// Decoder for Luftdaten firmware payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct LuftdatenDecoder;

impl Decode for LuftdatenDecoder {
    fn format(&self) -> &'static str {
        FORMAT
    }

    fn decode(&self, payload: &[u8], ctx: &DecodeContext<'_>) -> Result<Vec<Measurement>> {
        let payload: LuftdatenPayload = serde_json::from_slice(payload)
            .map_err(|e| Error::decode(FORMAT, format!("Malformed Luftdaten payload: {e}")))?;

        let mut measurements = Vec::new();

        for entry in &payload.sensordatavalues {
            let Some(sensor) = match_value_type(&entry.value_type, ctx.sensors) else {
                debug!(
                    "No sensor of box {} matches Luftdaten value_type '{}', dropping value",
                    ctx.box_id, entry.value_type
                );
                continue;
            };

            let value = value_from_json(&entry.value)?;
            measurements.push(build_measurement(&sensor.id, value, None, None, ctx));
        }

        if measurements.is_empty() {
            return Err(Error::decode(
                FORMAT,
                "No applicable values found for the sensors of this box",
            ));
        }

        Ok(measurements)
    }
}

/// Split a `value_type` into (sensor-type prefix, phenomenon)
///
/// Bare phenomena such as `temperature` get the prefix of the sensor family
/// that sends them without one.
pub fn parse_value_type(value_type: &str) -> Option<(String, &'static Phenomenon)> {
    let lowered = value_type.trim().to_lowercase();

    let (prefix, token) = match lowered.split_once('_') {
        Some((prefix, token)) => (prefix.to_string(), token.to_string()),
        None => {
            let (_, prefix) = PREFIXLESS_SENSOR_TYPES
                .iter()
                .find(|(token, _)| *token == lowered)?;
            (prefix.to_string(), lowered.clone())
        }
    };

    let phenomenon = PHENOMENA
        .iter()
        .find(|phenomenon| phenomenon.tokens.contains(&token.as_str()))?;

    Some((prefix, phenomenon))
}

/// Find the first sensor matching a Luftdaten `value_type`
pub fn match_value_type<'a>(value_type: &str, sensors: &'a [Sensor]) -> Option<&'a Sensor> {
    let (prefix, phenomenon) = parse_value_type(value_type)?;

    sensors.iter().find(|sensor| {
        let title = sensor.title.trim().to_lowercase();
        let sensor_type = sensor.sensor_type.trim().to_lowercase();
        phenomenon.title_aliases.contains(&title.as_str()) && sensor_type.starts_with(&prefix)
    })
}
