//! CSV payload decoder
//!
//! Each line is `sensorId,value[,createdAt[,lng,lat[,height]]]`. Leading empty
//! fields are skipped; a line with fewer than 2 or more than 6 remaining fields
//! fails the whole payload with an error naming the line.

use super::validation::{build_measurement, location_from_parts, parse_created_at, value_from_text};
use super::{Decode, DecodeContext};
use crate::app::models::Measurement;
use crate::constants::{CSV_MAX_FIELDS, CSV_MIN_FIELDS};
use crate::{Error, Result};
use csv::{ReaderBuilder, StringRecord, Trim};

const FORMAT: &str = "csv";

/// Decoder for `text/csv`
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvDecoder;

impl Decode for CsvDecoder {
    fn format(&self) -> &'static str {
        FORMAT
    }

    fn decode(&self, payload: &[u8], ctx: &DecodeContext<'_>) -> Result<Vec<Measurement>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(payload);

        let mut measurements = Vec::new();

        for record in reader.records() {
            let record = record.map_err(|e| Error::decode(FORMAT, format!("Unreadable CSV: {e}")))?;
            let line = record.position().map(|position| position.line()).unwrap_or_default();

            if let Some(measurement) = parse_line(&record, line, ctx)? {
                measurements.push(measurement);
            }
        }

        Ok(measurements)
    }
}

/// Parse one CSV record; blank lines yield `None`
fn parse_line(
    record: &StringRecord,
    line: u64,
    ctx: &DecodeContext<'_>,
) -> Result<Option<Measurement>> {
    let fields: Vec<&str> = record.iter().skip_while(|field| field.is_empty()).collect();

    if fields.is_empty() {
        return Ok(None);
    }

    if !(CSV_MIN_FIELDS..=CSV_MAX_FIELDS).contains(&fields.len()) {
        return Err(Error::decode(
            FORMAT,
            format!(
                "Line {line} has {} fields, expected {CSV_MIN_FIELDS} to {CSV_MAX_FIELDS}: '{}'",
                fields.len(),
                fields.join(",")
            ),
        ));
    }

    let at_line = |error: Error| match error {
        Error::Validation { message } => Error::validation(format!("Line {line}: {message}")),
        other => other,
    };

    let value = value_from_text(fields[1]).map_err(at_line)?;

    let created_at = fields
        .get(2)
        .filter(|raw| !raw.is_empty())
        .map(|raw| parse_created_at(raw, ctx))
        .transpose()
        .map_err(at_line)?;

    let location = match fields.len() {
        4 => {
            return Err(Error::validation(format!(
                "Line {line}: a location needs both longitude and latitude"
            )));
        }
        5 | 6 => Some(location_from_parts(fields[3], fields[4], fields.get(5).copied()).map_err(at_line)?),
        _ => None,
    };

    if location.is_some() && created_at.is_none() {
        return Err(Error::decode(
            FORMAT,
            format!("Line {line} has a location but no createdAt"),
        ));
    }

    Ok(Some(build_measurement(
        fields[0],
        value,
        created_at,
        location,
        ctx,
    )))
}
