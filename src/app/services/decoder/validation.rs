//! Field validation shared by all decoders
//!
//! Values must be numeric (the original text is kept), timestamps must be
//! strict RFC 3339 UTC and not in the future, and locations must carry two or
//! three numeric components within WGS84 ranges.

use super::DecodeContext;
use crate::app::models::{Measurement, MeasurementValue, Point, Sensor};
use crate::constants::CREATED_AT_FORMAT;
use crate::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

/// Validate a JSON scalar as a measurement value
pub fn value_from_json(raw: &Value) -> Result<MeasurementValue> {
    let value = match raw {
        Value::Number(number) => MeasurementValue::Number(number.as_f64().ok_or_else(|| {
            Error::validation(format!("Value {number} cannot be represented as a float"))
        })?),
        Value::String(text) => MeasurementValue::Text(text.trim().to_string()),
        other => {
            return Err(Error::validation(format!(
                "Value must be a number or numeric string, got {other}"
            )));
        }
    };

    value.as_f64()?;
    Ok(value)
}

/// Validate a textual measurement value, keeping its text
pub fn value_from_text(raw: &str) -> Result<MeasurementValue> {
    let value = MeasurementValue::Text(raw.trim().to_string());
    value.as_f64()?;
    Ok(value)
}

/// Parse a strict RFC 3339 UTC timestamp (`YYYY-MM-DDTHH:MM:SS[.fff]Z`)
pub fn parse_created_at(raw: &str, ctx: &DecodeContext<'_>) -> Result<DateTime<Utc>> {
    let created_at = NaiveDateTime::parse_from_str(raw.trim(), CREATED_AT_FORMAT)
        .map_err(|e| {
            Error::validation(format!(
                "Invalid createdAt '{raw}': expected RFC 3339 UTC such as 2020-01-01T00:00:00Z ({e})"
            ))
        })?
        .and_utc();

    check_not_in_future(created_at, ctx)
}

/// Reject timestamps beyond the reception time plus the allowed clock skew
pub fn check_not_in_future(
    created_at: DateTime<Utc>,
    ctx: &DecodeContext<'_>,
) -> Result<DateTime<Utc>> {
    if created_at > ctx.latest_allowed() {
        return Err(Error::validation(format!(
            "createdAt {} lies in the future (received at {})",
            created_at.to_rfc3339(),
            ctx.now.to_rfc3339()
        )));
    }

    Ok(created_at)
}

/// Parse a JSON `createdAt` field
pub fn created_at_from_json(raw: &Value, ctx: &DecodeContext<'_>) -> Result<DateTime<Utc>> {
    match raw {
        Value::String(text) => parse_created_at(text, ctx),
        other => Err(Error::validation(format!(
            "createdAt must be a string, got {other}"
        ))),
    }
}

/// Parse a JSON location: `[lng, lat, height?]` or `{lng, lat, height?}`
pub fn location_from_json(raw: &Value) -> Result<Point> {
    let component = |value: &Value, name: &str| -> Result<f64> {
        value.as_f64().ok_or_else(|| {
            Error::validation(format!("Location {name} must be numeric, got {value}"))
        })
    };

    let point = match raw {
        Value::Array(parts) => match parts.as_slice() {
            [lng, lat] => Point::new(component(lng, "longitude")?, component(lat, "latitude")?),
            [lng, lat, height] => Point::new(component(lng, "longitude")?, component(lat, "latitude")?)
                .with_height(component(height, "height")?),
            _ => {
                return Err(Error::validation(format!(
                    "Location must have 2 or 3 components, got {}",
                    parts.len()
                )));
            }
        },
        Value::Object(fields) => {
            let lng = ["lng", "lon", "longitude"]
                .iter()
                .find_map(|key| fields.get(*key))
                .ok_or_else(|| Error::validation("Location is missing its longitude"))?;
            let lat = ["lat", "latitude"]
                .iter()
                .find_map(|key| fields.get(*key))
                .ok_or_else(|| Error::validation("Location is missing its latitude"))?;

            let mut point = Point::new(component(lng, "longitude")?, component(lat, "latitude")?);
            if let Some(height) = fields.get("height") {
                point = point.with_height(component(height, "height")?);
            }
            point
        }
        other => {
            return Err(Error::validation(format!(
                "Location must be an array or object, got {other}"
            )));
        }
    };

    point.validate()?;
    Ok(point)
}

/// Parse a location from textual components (CSV)
pub fn location_from_parts(lng: &str, lat: &str, height: Option<&str>) -> Result<Point> {
    let number = |raw: &str, name: &str| -> Result<f64> {
        raw.trim()
            .parse::<f64>()
            .map_err(|e| Error::validation(format!("Location {name} '{raw}' is not numeric ({e})")))
    };

    let mut point = Point::new(number(lng, "longitude")?, number(lat, "latitude")?);
    if let Some(height) = height.filter(|h| !h.trim().is_empty()) {
        point = point.with_height(number(height, "height")?);
    }

    point.validate()?;
    Ok(point)
}

/// Assemble a measurement, stamping it with the reception time when the
/// payload carried no `createdAt`
pub fn build_measurement(
    sensor_id: impl Into<String>,
    value: MeasurementValue,
    created_at: Option<DateTime<Utc>>,
    location: Option<Point>,
    ctx: &DecodeContext<'_>,
) -> Measurement {
    Measurement {
        sensor_id: sensor_id.into(),
        value,
        created_at: created_at.unwrap_or(ctx.now),
        location,
    }
}

/// Check that every measurement addresses a sensor of the box
pub fn ensure_sensors_belong(
    box_id: &str,
    sensors: &[Sensor],
    measurements: &[Measurement],
) -> Result<()> {
    match measurements
        .iter()
        .find(|measurement| !sensors.iter().any(|sensor| sensor.id == measurement.sensor_id))
    {
        Some(foreign) => Err(Error::sensor_mismatch(&foreign.sensor_id, box_id)),
        None => Ok(()),
    }
}
