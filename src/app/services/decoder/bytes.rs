//! Fixed-width binary decoder
//!
//! Payloads are a concatenation of tuples, each made of a 12-byte sensor id,
//! a little-endian `f32` value and, for the timestamped variant, a
//! little-endian `u32` of seconds since the Unix epoch. Sensor ids are
//! rendered as 24 lower-case hex characters.

use super::validation::{build_measurement, check_not_in_future};
use super::{ContentType, Decode, DecodeContext};
use crate::app::models::{Measurement, MeasurementValue};
use crate::constants::{
    BYTES_SENSOR_ID_LEN, BYTES_TIMESTAMP_LEN, BYTES_TS_TUPLE_LEN, BYTES_TUPLE_LEN, BYTES_VALUE_LEN,
};
use crate::{Error, Result};
use chrono::DateTime;
use std::fmt::Write;

/// Decoder for `application/sbx-bytes` and `application/sbx-bytes-ts`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BytesDecoder {
    with_timestamp: bool,
}

impl BytesDecoder {
    /// `sensorId(12) value(4)` tuples
    pub const PLAIN: BytesDecoder = BytesDecoder {
        with_timestamp: false,
    };

    /// `sensorId(12) value(4) timestamp(4)` tuples
    pub const TIMESTAMPED: BytesDecoder = BytesDecoder {
        with_timestamp: true,
    };

    /// Width of one tuple in bytes
    pub fn tuple_len(&self) -> usize {
        if self.with_timestamp {
            BYTES_TS_TUPLE_LEN
        } else {
            BYTES_TUPLE_LEN
        }
    }

    /// Tuple width for byte content types, `None` for textual formats
    pub fn tuple_len_for(content_type: ContentType) -> Option<usize> {
        match content_type {
            ContentType::Bytes => Some(BytesDecoder::PLAIN.tuple_len()),
            ContentType::BytesTimestamped => Some(BytesDecoder::TIMESTAMPED.tuple_len()),
            _ => None,
        }
    }

    fn decode_tuple(
        &self,
        index: usize,
        tuple: &[u8],
        ctx: &DecodeContext<'_>,
    ) -> Result<Measurement> {
        let (id_bytes, rest) = tuple.split_at(BYTES_SENSOR_ID_LEN);
        let (value_bytes, rest) = rest.split_at(BYTES_VALUE_LEN);

        let value = f32::from_le_bytes(to_array(value_bytes)?);
        if !value.is_finite() {
            return Err(Error::validation(format!(
                "Tuple {index} carries non-finite value {value}"
            )));
        }

        let created_at = if self.with_timestamp {
            let seconds = u32::from_le_bytes(to_array(&rest[..BYTES_TIMESTAMP_LEN])?);
            let timestamp = DateTime::from_timestamp(i64::from(seconds), 0).ok_or_else(|| {
                Error::validation(format!("Tuple {index} carries invalid timestamp {seconds}"))
            })?;
            Some(check_not_in_future(timestamp, ctx)?)
        } else {
            None
        };

        Ok(build_measurement(
            hex_id(id_bytes),
            MeasurementValue::Number(f64::from(value)),
            created_at,
            None,
            ctx,
        ))
    }
}

impl Decode for BytesDecoder {
    fn format(&self) -> &'static str {
        if self.with_timestamp {
            "sbx-bytes-ts"
        } else {
            "sbx-bytes"
        }
    }

    fn decode(&self, payload: &[u8], ctx: &DecodeContext<'_>) -> Result<Vec<Measurement>> {
        let tuple_len = self.tuple_len();

        if payload.len() % tuple_len != 0 {
            return Err(Error::decode(
                self.format(),
                format!(
                    "Payload length {} is not a multiple of the {tuple_len}-byte tuple size",
                    payload.len()
                ),
            ));
        }

        payload
            .chunks_exact(tuple_len)
            .enumerate()
            .map(|(index, tuple)| self.decode_tuple(index, tuple, ctx))
            .collect()
    }
}

/// Render sensor id bytes as lower-case hex
pub fn hex_id(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}

/// Parse a 24-character hex sensor id back into its 12 bytes
pub fn id_bytes(sensor_id: &str) -> Result<[u8; BYTES_SENSOR_ID_LEN]> {
    if sensor_id.len() != BYTES_SENSOR_ID_LEN * 2 || !sensor_id.is_ascii() {
        return Err(Error::validation(format!(
            "Sensor id '{sensor_id}' is not {} hex characters",
            BYTES_SENSOR_ID_LEN * 2
        )));
    }

    let mut bytes = [0u8; BYTES_SENSOR_ID_LEN];
    for (index, byte) in bytes.iter_mut().enumerate() {
        let pair = &sensor_id[index * 2..index * 2 + 2];
        *byte = u8::from_str_radix(pair, 16).map_err(|e| {
            Error::validation(format!("Sensor id '{sensor_id}' is not hex ({e})"))
        })?;
    }

    Ok(bytes)
}

fn to_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| Error::internal(format!("Expected {N} bytes, got {}", bytes.len())))
}
