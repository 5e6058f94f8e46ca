//! hackAir payload decoder
//!
//! hackAir devices post `{"reading": {"PM2.5_AirPollutantValue": "7.63", ...}}`.
//! Reading keys are matched against an alias table by substring, and the
//! phenomenon is then matched against sensor titles only; the sensor type is
//! not consulted.

use super::validation::{build_measurement, value_from_json};
use super::{Decode, DecodeContext};
use crate::app::models::{Measurement, Sensor};
use crate::constants::hackair::ALIASES;
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

const FORMAT: &str = "hackair";

#[derive(Debug, Deserialize)]
struct HackAirPayload {
    reading: Map<String, Value>,
}

/// Decoder for hackAir payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct HackAirDecoder;

impl Decode for HackAirDecoder {
    fn format(&self) -> &'static str {
        FORMAT
    }

    fn decode(&self, payload: &[u8], ctx: &DecodeContext<'_>) -> Result<Vec<Measurement>> {
        let payload: HackAirPayload = serde_json::from_slice(payload)
            .map_err(|e| Error::decode(FORMAT, format!("Malformed hackAir payload: {e}")))?;

        let mut measurements = Vec::new();

        for (key, raw_value) in &payload.reading {
            let Some(sensor) = match_reading_key(key, ctx.sensors) else {
                debug!(
                    "No sensor of box {} matches hackAir reading '{}', dropping value",
                    ctx.box_id, key
                );
                continue;
            };

            let value = value_from_json(raw_value)?;
            measurements.push(build_measurement(&sensor.id, value, None, None, ctx));
        }

        if measurements.is_empty() {
            return Err(Error::decode(
                FORMAT,
                "No applicable readings found for the sensors of this box",
            ));
        }

        Ok(measurements)
    }
}

/// Find the first sensor whose title matches a hackAir reading key
pub fn match_reading_key<'a>(key: &str, sensors: &'a [Sensor]) -> Option<&'a Sensor> {
    let lowered = key.to_lowercase();

    let (_, aliases) = ALIASES
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|alias| lowered.contains(alias)))?;

    sensors.iter().find(|sensor| {
        let title = sensor.title.trim().to_lowercase();
        aliases.iter().any(|alias| title.contains(alias))
    })
}
